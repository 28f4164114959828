//! Write a default configuration file

use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use serde_json::json;
use std::path::PathBuf;

use crate::commands::Command;
use crate::config::CliConfig;
use crate::utils::{print_output, print_success};

#[derive(Args, Debug)]
pub struct ConfigCommand {
    /// Where to write the configuration
    #[arg(short, long, default_value = "cadence.toml")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[async_trait]
impl Command for ConfigCommand {
    async fn execute(&self, _config: &CliConfig, json_output: bool) -> Result<()> {
        if self.output.exists() && !self.force {
            anyhow::bail!(
                "{} already exists. Use --force to overwrite it.",
                self.output.display()
            );
        }

        CliConfig::default().save(&self.output)?;

        if json_output {
            print_output(&json!({ "written": self.output }), true)?;
        } else {
            print_success(&format!("Default configuration written to {}", self.output.display()));
        }
        Ok(())
    }
}
