//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod log;
pub mod operation;
pub mod valve;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::service::{Broadcaster, FileLogStore, OperationService, RemoteExecutor};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub operations: Arc<OperationService>,
    pub log_store: Arc<FileLogStore>,
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        log_store: Arc<FileLogStore>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        let operations = Arc::new(OperationService::new(
            executor,
            log_store.clone(),
            broadcaster.clone(),
        ));

        Self {
            operations,
            log_store,
            broadcaster,
        }
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Valve endpoints
        .route("/api/valves/operate", post(valve::operate))
        .route("/api/valves/stop", post(valve::stop))
        // Log endpoints
        .route("/api/logs/{operation_id}", get(log::get_logs))
        .route("/api/logs/{operation_id}/stream", get(log::stream_logs))
        // Operation endpoints
        .route("/api/operations", get(operation::list_operations))
        .route(
            "/api/operations/{operation_id}",
            get(operation::get_operation),
        )
        // Add state and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
