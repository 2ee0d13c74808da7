//! casekit CLI - Main Entry Point
//!
//! Runs declarative UI test cases, lists their metadata and checks which
//! of them are currently skipped by open defects.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use casekit_harness::HarnessConfig;
use commands::{list, run, skips};

/// casekit - metadata and skip guards for UI tests
#[derive(Parser)]
#[command(name = "casekit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "casekit.toml", env = "CASEKIT_CONFIG", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run test cases against a WebDriver session
    Run(run::RunArgs),

    /// List discovered cases and their metadata
    List(list::ListArgs),

    /// Check skip conditions against the defect trackers
    Skips(skips::SkipsArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let config = HarnessConfig::load(&cli.config)?;

    let success = match cli.command {
        Commands::Run(args) => run::execute(args, config, cli.format).await?,
        Commands::List(args) => list::execute(args, &config, cli.format)?,
        Commands::Skips(args) => skips::execute(args, &config, cli.format).await?,
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
