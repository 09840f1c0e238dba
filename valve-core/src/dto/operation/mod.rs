//! Operation DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::operation::{
    Operation, OperationId, OperationKind, OperationResult, OperationStatus,
};

/// JSON view of an operation, returned by `GET /api/operations/{operationId}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    pub operation_id: Option<OperationId>,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result: Option<OperationResult>,
    pub error: Option<String>,
}

impl From<Operation> for OperationSummary {
    fn from(op: Operation) -> Self {
        Self {
            operation_id: op.id,
            kind: op.kind,
            status: op.status,
            created_at: op.created_at,
            started_at: op.started_at,
            finished_at: op.finished_at,
            result: op.result,
            error: op.error,
        }
    }
}
