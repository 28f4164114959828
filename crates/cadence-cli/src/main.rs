//! Cadence CLI - drive the synthesis model cache from the command line
//!
//! Synthesizes text through a cached voice model, runs concurrent request
//! simulations against the cache, and writes or checks configuration files.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod utils;

use commands::{
    config::ConfigCommand, simulate::SimulateCommand, synth::SynthCommand,
    validate::ValidateCommand, Command,
};

#[derive(Parser)]
#[command(
    name = "cadence",
    version = env!("CARGO_PKG_VERSION"),
    about = "Cadence synthesis model cache CLI",
    long_about = "Synthesize speech through a TTL-bounded voice model cache, simulate concurrent load against it, and manage its configuration."
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CADENCE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// JSON output format
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize text with a cached voice model
    #[command(name = "synth", alias = "s")]
    Synth(SynthCommand),

    /// Run concurrent requests against the cache and print its stats
    #[command(name = "simulate", alias = "sim")]
    Simulate(SimulateCommand),

    /// Write a default configuration file
    #[command(name = "config")]
    Config(ConfigCommand),

    /// Validate a configuration file
    #[command(name = "validate")]
    Validate(ValidateCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    debug!("Cadence CLI v{} starting", env!("CARGO_PKG_VERSION"));

    let result = run(&cli).await;

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: &Cli) -> Result<()> {
    // `validate` checks its own file, so a broken global config must not stop it
    if let Commands::Validate(cmd) = &cli.command {
        return cmd.execute(&config::CliConfig::default(), cli.json).await;
    }

    let config = config::CliConfig::load(cli.config.as_deref())?;
    debug!("Configuration loaded: {:?}", config);

    match &cli.command {
        Commands::Synth(cmd) => cmd.execute(&config, cli.json).await,
        Commands::Simulate(cmd) => cmd.execute(&config, cli.json).await,
        Commands::Config(cmd) => cmd.execute(&config, cli.json).await,
        Commands::Validate(cmd) => cmd.execute(&config, cli.json).await,
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level = cli
        .log_level
        .parse::<Level>()
        .map_err(|_| anyhow!("Invalid log level: {}", cli.log_level))?;

    let env_filter = EnvFilter::from_default_env()
        .add_directive(format!("cadence={}", level).parse()?)
        .add_directive(format!("cadence_core={}", level).parse()?);

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_synth_arguments() {
        let cli = Cli::try_parse_from([
            "cadence", "synth", "--model-id", "3", "--text", "hello", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Synth(cmd) => {
                assert_eq!(cmd.model_id, 3);
                assert_eq!(cmd.text, "hello");
                assert_eq!(cmd.repeat, 1);
            }
            _ => panic!("expected synth"),
        }
    }

    #[test]
    fn test_simulate_rejects_zero_models() {
        assert!(Cli::try_parse_from(["cadence", "simulate", "--models", "0"]).is_err());
    }
}
