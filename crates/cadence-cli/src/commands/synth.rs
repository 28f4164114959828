//! Synthesize text through the model cache

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Args;
use serde_json::json;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

use crate::commands::Command;
use crate::config::CliConfig;
use crate::utils::{build_cache, format_duration, print_output, stats_table, write_pcm};

#[derive(Args, Debug)]
pub struct SynthCommand {
    /// Voice model to synthesize with
    #[arg(short, long)]
    pub model_id: u64,

    /// Text to synthesize
    #[arg(short, long)]
    pub text: String,

    /// Write raw little-endian f32 PCM here
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Synthesize the text this many times, reusing the cached model
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub repeat: u32,
}

#[async_trait]
impl Command for SynthCommand {
    async fn execute(&self, config: &CliConfig, json_output: bool) -> Result<()> {
        debug!("Executing synth command: {:?}", self);
        let cache = build_cache(config, config.loader())?;

        let mut first_request = None;
        let mut last = None;
        for _ in 0..self.repeat {
            let started = Instant::now();
            let model = cache
                .get(&self.model_id, &config.voice)
                .await
                .with_context(|| format!("Failed to get voice model {}", self.model_id))?;
            let samples = model.synthesize(&self.text)?;
            first_request.get_or_insert(started.elapsed());
            last = Some((model, samples));
        }
        let (model, samples) = last.context("No synthesis requests were made")?;

        let duration = model.duration(&samples);
        info!(
            model_id = self.model_id,
            samples = samples.len(),
            "Synthesis finished"
        );

        if let Some(path) = &self.output {
            write_pcm(path, &samples).await?;
        }

        let stats = cache.stats();
        if json_output {
            print_output(
                &json!({
                    "model_id": self.model_id,
                    "samples": samples.len(),
                    "sample_rate": model.config().sample_rate,
                    "duration_ms": duration.as_millis() as u64,
                    "output": self.output,
                    "cache": stats,
                }),
                true,
            )?;
        } else {
            print_output(
                &json!({
                    "model": self.model_id,
                    "samples": samples.len(),
                    "audio": format_duration(duration),
                    "first request": format_duration(first_request.unwrap_or_default()),
                    "output": self.output.as_ref().map(|p| p.display().to_string()),
                }),
                false,
            )?;
            println!("{}", stats_table(&stats));
        }

        drop(model);
        cache.clear();
        Ok(())
    }
}
