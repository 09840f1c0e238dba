//! Log API Handlers
//!
//! Persisted log retrieval and live log streaming over SSE.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::stream::{self, Stream, StreamExt};
use valve_core::domain::operation::OperationId;
use valve_core::dto::log::LogsResponse;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::Subscription;

/// GET /api/logs/{operationId}
/// Every persisted line of an operation, oldest first
pub async fn get_logs(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<LogsResponse>> {
    let id = OperationId::parse(&raw_id)?;
    tracing::debug!("Getting logs for operation: {}", id);

    let logs = state.log_store.read_all(&id).await;

    Ok(Json(LogsResponse {
        operation_id: id,
        logs,
    }))
}

/// GET /api/logs/{operationId}/stream
/// Replay persisted lines, then follow live output
///
/// The subscription is taken before history is read, so no line can fall
/// between the two; a line published in that window may be sent twice.
pub async fn stream_logs(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = OperationId::parse(&raw_id)?;
    tracing::debug!("Client streaming logs for operation: {}", id);

    let subscription = state.broadcaster.subscribe(id.as_str());
    let history = state.log_store.read_all(&id).await;

    let stream = replay(history).chain(follow(subscription));

    let sse = Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    );

    Ok(([(header::CACHE_CONTROL, "no-cache")], sse))
}

fn replay(lines: Vec<String>) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::iter(lines.into_iter().map(|line| Ok(Event::default().data(line))))
}

/// Live messages until the subscription closes; dropping the stream unsubscribes
fn follow(subscription: Subscription) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(subscription, |mut subscription| async move {
        let message = subscription.recv().await?;
        Some((Ok(Event::default().data(message)), subscription))
    })
}
