//! Valve API Handlers
//!
//! Start and stop the remote valve controller.

use axum::{Json, extract::State};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value;
use valve_core::dto::valve::{OperateResponse, StopResponse};

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

// =============================================================================
// Valve Endpoints
// =============================================================================

/// POST /api/valves/operate
/// Run the start script with the request body as its payload
///
/// The body is re-serialised compactly and base64 encoded so it travels to
/// the remote host as one shell-safe argument.
pub async fn operate(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<OperateResponse>> {
    let payload = encode_payload(&body)?;
    tracing::info!("Operating valves, payload {} bytes", payload.len());

    let outcome = state.operations.start(Some(payload)).await?;

    if !outcome.result.success() {
        return Err(ApiError::RemoteFailure(outcome.result.failure_message()));
    }

    Ok(Json(OperateResponse {
        success: true,
        output: outcome.result.stdout,
        operation_id: outcome.operation_id,
    }))
}

/// POST /api/valves/stop
/// Run the stop script
pub async fn stop(State(state): State<AppState>) -> ApiResult<Json<StopResponse>> {
    tracing::info!("Stopping valves");

    let result = state.operations.stop().await?;

    if !result.success() {
        return Err(ApiError::RemoteFailure(result.failure_message()));
    }

    Ok(Json(StopResponse {
        success: true,
        output: result.stdout,
    }))
}

fn encode_payload(body: &Value) -> ApiResult<String> {
    let json = serde_json::to_vec(body)
        .map_err(|e| ApiError::InternalError(format!("Failed to serialise payload: {}", e)))?;
    Ok(STANDARD.encode(json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_payload_is_compact_json() {
        let encoded = encode_payload(&json!({ "pin": 1, "duration": 30 })).unwrap();
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(decoded, br#"{"pin":1,"duration":30}"#);
    }
}
