//! Fire a burst of concurrent requests at the model cache and report its stats

use anyhow::{Context, Result};
use async_trait::async_trait;
use cadence_core::prelude::*;
use clap::Args;
use futures::future::join_all;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::commands::Command;
use crate::config::CliConfig;
use crate::utils::{build_cache, format_duration, print_output, stats_table};

#[derive(Args, Debug)]
pub struct SimulateCommand {
    /// Number of requests to issue
    #[arg(short, long, default_value_t = 64)]
    pub requests: usize,

    /// Number of distinct model ids the requests are spread over
    #[arg(short, long, default_value_t = 8, value_parser = clap::value_parser!(u64).range(1..))]
    pub models: u64,

    /// Number of waves; requests within a wave run concurrently
    #[arg(short, long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    pub waves: u32,

    /// Extra latency added to every model load, in milliseconds
    #[arg(long, default_value_t = 50)]
    pub load_delay_ms: u64,

    /// Text each request synthesizes
    #[arg(long, default_value = "hello")]
    pub text: String,
}

/// Loader wrapper that sleeps before delegating, standing in for slow storage
struct DelayedLoader<L> {
    inner: L,
    delay: Duration,
}

#[async_trait]
impl<L> ResourceLoader<u64, VoiceModelConfig, VoiceModel> for DelayedLoader<L>
where
    L: ResourceLoader<u64, VoiceModelConfig, VoiceModel>,
{
    async fn load(&self, model_id: &u64, config: &VoiceModelConfig) -> anyhow::Result<VoiceModel> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.load(model_id, config).await
    }
}

impl SimulateCommand {
    /// Model id requested by the `index`-th request.
    ///
    /// Requests cycle through every model in turn, so once the number of
    /// models exceeds the cache capacity each wave forces evictions.
    fn model_for(&self, index: usize) -> u64 {
        index as u64 % self.models
    }

    fn wave_sizes(&self) -> Vec<usize> {
        let waves = self.waves as usize;
        (0..waves)
            .map(|w| self.requests / waves + usize::from(w < self.requests % waves))
            .collect()
    }
}

#[async_trait]
impl Command for SimulateCommand {
    async fn execute(&self, config: &CliConfig, json_output: bool) -> Result<()> {
        debug!("Executing simulate command: {:?}", self);
        let loader = DelayedLoader {
            inner: config.loader(),
            delay: Duration::from_millis(self.load_delay_ms),
        };
        let cache = build_cache(config, loader)?;

        let started = Instant::now();
        let mut failures = 0usize;
        let mut index = 0usize;
        for (wave, size) in self.wave_sizes().into_iter().enumerate() {
            let handles: Vec<_> = (index..index + size)
                .map(|i| {
                    let cache = cache.clone();
                    let voice = config.voice.clone();
                    let text = self.text.clone();
                    let model_id = self.model_for(i);
                    tokio::spawn(async move {
                        let model = cache.get(&model_id, &voice).await?;
                        model.synthesize(&text).map(|samples| samples.len())
                    })
                })
                .collect();
            index += size;

            for joined in join_all(handles).await {
                match joined.context("Simulated request panicked")? {
                    Ok(_) => {}
                    Err(err) => {
                        failures += 1;
                        warn!(wave, "Simulated request failed: {}", err);
                    }
                }
            }
            debug!(wave, requests = size, "Wave complete");
        }
        let elapsed = started.elapsed();

        let stats = cache.stats();
        info!(
            requests = self.requests,
            loads = stats.loads,
            elapsed_ms = elapsed.as_millis() as u64,
            "Simulation finished"
        );

        if json_output {
            print_output(
                &json!({
                    "requests": self.requests,
                    "models": self.models,
                    "waves": self.waves,
                    "failures": failures,
                    "elapsed_ms": elapsed.as_millis() as u64,
                    "cache": stats,
                }),
                true,
            )?;
        } else {
            print_output(
                &json!({
                    "requests": self.requests,
                    "models": self.models,
                    "failures": failures,
                    "elapsed": format_duration(elapsed),
                }),
                false,
            )?;
            println!("{}", stats_table(&stats));
        }

        cache.clear();
        Ok(())
    }
}
