//! Valve endpoints

use serde_json::Value;
use valve_core::dto::valve::{OperateResponse, StopResponse};

use crate::ValveClient;
use crate::error::Result;

impl ValveClient {
    /// Start a valve operation
    ///
    /// # Arguments
    /// * `payload` - Any JSON value; it is handed to the remote start script
    ///
    /// # Returns
    /// The script's output and the id of the operation's log
    pub async fn operate(&self, payload: &Value) -> Result<OperateResponse> {
        let response = self
            .client
            .post(self.url("/api/valves/operate"))
            .json(payload)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Stop the running valve operation
    pub async fn stop(&self) -> Result<StopResponse> {
        let response = self
            .client
            .post(self.url("/api/valves/stop"))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Check that the orchestrator is up
    pub async fn health(&self) -> Result<()> {
        let response = self.client.get(self.url("/health")).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }
}
