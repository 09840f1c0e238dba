//! Configuration module
//!
//! Handles CLI configuration.

use valve_client::ValveClient;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator service
    pub orchestrator_url: String,
}

impl Config {
    /// Client for the configured orchestrator
    pub fn client(&self) -> ValveClient {
        ValveClient::new(&self.orchestrator_url)
    }
}
