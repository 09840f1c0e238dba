//! Valve CLI
//!
//! Command-line interface for the valve orchestrator.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "valvectl")]
#[command(about = "Remote valve controller CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(
        long = "url",
        env = "VALVE_ORCHESTRATOR_URL",
        default_value = "http://localhost:3000"
    )]
    orchestrator_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
    };

    handle_command(cli.command, &config).await
}
