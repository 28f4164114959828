//! Validate a configuration file

use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use serde_json::json;
use std::path::PathBuf;

use crate::commands::Command;
use crate::config::CliConfig;
use crate::utils::{print_output, print_success};

#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// Configuration file to check
    pub file: PathBuf,
}

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, _config: &CliConfig, json_output: bool) -> Result<()> {
        let checked = CliConfig::load(Some(&self.file))?;

        if json_output {
            print_output(&json!({ "valid": true, "config": checked }), true)?;
        } else {
            print_success(&format!("{} is valid", self.file.display()));
            print_output(
                &json!({
                    "max_size": checked.cache.max_size,
                    "ttl_ms": checked.cache.ttl_ms,
                    "sweep_interval_ms": checked.cache.sweep_interval_ms,
                    "sample_rate": checked.voice.sample_rate,
                    "models_dir": checked.models_dir,
                }),
                false,
            )?;
        }
        Ok(())
    }
}
