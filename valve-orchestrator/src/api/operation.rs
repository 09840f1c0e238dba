//! Operation API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use valve_core::domain::operation::OperationId;
use valve_core::dto::operation::OperationSummary;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// GET /api/operations/{operationId}
/// Status of an operation started by this process
pub async fn get_operation(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<OperationSummary>> {
    let id = OperationId::parse(&raw_id)?;
    tracing::debug!("Getting operation: {}", id);

    state
        .operations
        .get(&id)
        .map(|operation| Json(operation.into()))
        .ok_or_else(|| ApiError::NotFound(format!("Operation {} not found", id)))
}

/// GET /api/operations
/// Operations started by this process, newest first
pub async fn list_operations(State(state): State<AppState>) -> Json<Vec<OperationSummary>> {
    tracing::debug!("Listing operations");

    let operations = state.operations.list();
    Json(operations.into_iter().map(Into::into).collect())
}
