//! Command implementations for the Cadence CLI

pub mod config;
pub mod simulate;
pub mod synth;
pub mod validate;

use anyhow::Result;
use async_trait::async_trait;

/// Trait for CLI command execution
#[async_trait]
pub trait Command {
    /// Execute the command
    async fn execute(&self, config: &crate::config::CliConfig, json_output: bool) -> Result<()>;
}
