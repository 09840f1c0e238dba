//! Valve DTOs

use serde::{Deserialize, Serialize};

use crate::domain::operation::OperationId;

/// Response to `POST /api/valves/operate`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperateResponse {
    pub success: bool,
    pub output: String,
    pub operation_id: OperationId,
}

/// Response to `POST /api/valves/stop`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponse {
    pub success: bool,
    pub output: String,
}
