//! Log DTOs

use serde::{Deserialize, Serialize};

use crate::domain::operation::OperationId;

/// Response to `GET /api/logs/{operationId}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsResponse {
    pub operation_id: OperationId,
    pub logs: Vec<String>,
}
