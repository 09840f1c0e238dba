use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod service;

use config::Config;
use service::{Broadcaster, FileLogStore, SshExecutor};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "valve_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Valve Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Remote controller: {} ({} / {})",
        config.destination(),
        config.start_script_path,
        config.stop_script_path
    );

    let log_store = Arc::new(FileLogStore::new(config.log_dir.clone()));
    log_store
        .ensure_dir()
        .await
        .with_context(|| format!("Failed to create log directory {}", config.log_dir.display()))?;

    tracing::info!("Writing operation logs to {}", log_store.dir().display());

    let state = api::AppState::new(
        Arc::new(SshExecutor::new(&config)),
        log_store,
        Broadcaster::new(),
    );

    // Build router with all API endpoints
    let app = api::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
