//! Operation status endpoint

use valve_core::dto::operation::OperationSummary;

use crate::ValveClient;
use crate::error::Result;

impl ValveClient {
    /// Get the status of an operation
    ///
    /// Only operations started since the orchestrator last restarted are
    /// known; older ones come back as a 404 [`crate::ClientError::ApiError`].
    pub async fn get_operation(&self, operation_id: &str) -> Result<OperationSummary> {
        let response = self
            .client
            .get(self.url(&format!("/api/operations/{}", operation_id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List operations known to the orchestrator, newest first
    pub async fn list_operations(&self) -> Result<Vec<OperationSummary>> {
        let response = self.client.get(self.url("/api/operations")).send().await?;

        self.handle_response(response).await
    }
}
