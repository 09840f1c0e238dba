//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod log;
mod operation;
mod valve;

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start a valve operation
    Operate {
        /// JSON payload for the controller script
        #[arg(required_unless_present = "file")]
        json: Option<String>,

        /// Read the JSON payload from a file instead
        #[arg(long, conflicts_with = "json")]
        file: Option<PathBuf>,

        /// Print the operation's timestamped log once it finishes
        #[arg(long)]
        logs: bool,
    },
    /// Stop the running valve operation
    Stop,
    /// Show the log of an operation
    Logs {
        /// Operation ID
        id: String,

        /// Keep streaming new lines as they arrive
        #[arg(short, long)]
        follow: bool,
    },
    /// List operations started since the orchestrator came up
    List,
    /// Show the status of an operation
    Status {
        /// Operation ID
        id: String,
    },
    /// Check that the orchestrator is reachable
    Health,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        Commands::Operate { json, file, logs } => {
            let payload = valve::read_payload(json.as_deref(), file.as_deref())?;
            valve::operate(&client, &payload, logs).await
        }
        Commands::Stop => valve::stop(&client).await,
        Commands::Logs { id, follow } => log::show_logs(&client, &id, follow).await,
        Commands::List => operation::list_operations(&client).await,
        Commands::Status { id } => operation::show_status(&client, &id).await,
        Commands::Health => valve::health(&client).await,
    }
}
