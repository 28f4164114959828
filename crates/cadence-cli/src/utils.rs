//! Utility functions for the Cadence CLI

use anyhow::{Context, Result};
use cadence_core::prelude::*;
use console::style;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

use crate::config::CliConfig;

/// Build the voice model cache described by `config`.
///
/// Evicted models are released through [`VoiceModel::release`]. When the
/// config enables a sweep interval the background sweeper is started too.
pub fn build_cache<L>(config: &CliConfig, loader: L) -> Result<Arc<VoiceModelCache>>
where
    L: ResourceLoader<u64, VoiceModelConfig, VoiceModel> + 'static,
{
    let cache = VoiceModelCache::new(config.cache.clone(), loader)
        .context("Failed to create model cache")?
        .with_eviction_hook(|_, model: &VoiceModel| model.release());
    let cache = Arc::new(cache);

    if let Some(interval) = config.cache.sweep_interval() {
        info!(interval_ms = interval.as_millis() as u64, "Starting expiry sweeper");
        cache.spawn_sweeper(interval);
    }

    Ok(cache)
}

/// Encode samples as raw little-endian f32 PCM
pub fn pcm_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Write samples to `path` as raw little-endian f32 PCM
pub async fn write_pcm(path: &Path, samples: &[f32]) -> Result<()> {
    tokio::fs::write(path, pcm_bytes(samples))
        .await
        .with_context(|| format!("Failed to write audio to {}", path.display()))
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, duration.subsec_millis())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[derive(Tabled)]
struct StatRow {
    metric: &'static str,
    value: String,
}

fn stat_rows(stats: &CacheStats<u64>) -> Vec<StatRow> {
    let keys = stats
        .keys
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let row = |metric, value: String| StatRow { metric, value };
    vec![
        row("entries", format!("{}/{}", stats.entries, stats.max_size)),
        row("keys", if keys.is_empty() { "-".to_string() } else { keys }),
        row("ttl", format_duration(stats.ttl)),
        row("oldest age", format_duration(stats.oldest_age)),
        row("hits", stats.hits.to_string()),
        row("misses", stats.misses.to_string()),
        row("coalesced", stats.coalesced.to_string()),
        row("loads", stats.loads.to_string()),
        row("load failures", stats.load_failures.to_string()),
        row("evictions", stats.evictions.to_string()),
        row("expirations", stats.expirations.to_string()),
        row("invalidations", stats.invalidations.to_string()),
        row("hit rate", format!("{:.1}%", stats.hit_rate() * 100.0)),
    ]
}

/// Render a stats snapshot as a table
pub fn stats_table(stats: &CacheStats<u64>) -> String {
    Table::new(stat_rows(stats)).with(Style::modern()).to_string()
}

/// Print formatted output (JSON or `key: value` lines)
pub fn print_output(data: &Value, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(data)?);
        return Ok(());
    }

    match data {
        Value::Object(map) => {
            for (key, value) in map {
                match value {
                    Value::String(s) => println!("{}: {}", style(key).bold(), s),
                    Value::Null => println!("{}: -", style(key).bold()),
                    other => println!("{}: {}", style(key).bold(), other),
                }
            }
        }
        other => println!("{}", other),
    }
    Ok(())
}

/// Print success message with styling
pub fn print_success(message: &str) {
    println!("{} {}", style("Success:").green().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_bytes_are_little_endian() {
        let bytes = pcm_bytes(&[1.0, -0.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..], &(-0.5f32).to_le_bytes());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(30)), "30.000s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "60m 0s");
    }

    #[tokio::test]
    async fn test_build_cache_releases_on_clear() {
        let cache = build_cache(&CliConfig::default(), VoiceModelLoader::in_memory()).unwrap();
        cache.get(&1, &VoiceModelConfig::default()).await.unwrap();
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[tokio::test]
    async fn test_stats_table_lists_keys() {
        let cache = build_cache(&CliConfig::default(), VoiceModelLoader::in_memory()).unwrap();
        let voice = VoiceModelConfig::default();
        cache.get(&3, &voice).await.unwrap();
        cache.get(&1, &voice).await.unwrap();

        let table = stats_table(&cache.stats());
        assert!(table.contains("1, 3"));
        assert!(table.contains("2/4"));
    }
}
