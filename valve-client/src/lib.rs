//! Valve HTTP Client
//!
//! A small, typed HTTP client for the valve orchestrator API, used by
//! `valvectl` and anything else that needs to drive the valves remotely.
//!
//! # Example
//!
//! ```no_run
//! use valve_client::ValveClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ValveClient::new("http://localhost:3000");
//!
//!     let response = client.operate(&serde_json::json!({ "pin": 1 })).await?;
//!     println!("Started operation: {}", response.operation_id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod logs;
mod operations;
mod sse;
mod valves;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use logs::LogStream;

use reqwest::Client;
use serde::de::DeserializeOwned;
use valve_core::dto::ErrorResponse;

/// HTTP client for the valve orchestrator API
#[derive(Debug, Clone)]
pub struct ValveClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:3000")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl ValveClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the orchestrator (e.g., "http://localhost:3000")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// Request timeouts should be left unset when using [`ValveClient::stream_logs`],
    /// since a log stream stays open for as long as the operation runs.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Turn a non-2xx response into [`ClientError::ApiError`]
    ///
    /// The `{ "error": ... }` body is unwrapped when present.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        Err(ClientError::api_error(
            status.as_u16(),
            error_message(&error_text),
        ))
    }
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(response) => response.error,
        Err(_) if body.trim().is_empty() => "Unknown error".to_string(),
        Err(_) => body.to_string(),
    }
}
