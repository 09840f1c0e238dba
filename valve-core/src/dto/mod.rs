//! Data Transfer Objects for the orchestrator HTTP API
//!
//! Field names are camelCase on the wire; the web frontend and `valvectl`
//! both consume these shapes.

pub mod log;
pub mod operation;
pub mod valve;

use serde::{Deserialize, Serialize};

/// Body of every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
