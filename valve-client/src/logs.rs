//! Log endpoints

use futures::stream::{self, BoxStream, StreamExt};
use valve_core::dto::log::LogsResponse;

use crate::ValveClient;
use crate::error::{ClientError, Result};
use crate::sse::SseDecoder;

/// Stream of log lines from `GET /api/logs/{operationId}/stream`
///
/// Persisted lines come first (with their `[timestamp]` prefix), then live
/// lines as the remote script prints them. The stream never ends on its own
/// while the orchestrator is up.
pub type LogStream = BoxStream<'static, Result<String>>;

impl ValveClient {
    /// Get every persisted log line of an operation
    ///
    /// # Arguments
    /// * `operation_id` - Id returned by [`ValveClient::operate`]
    pub async fn get_logs(&self, operation_id: &str) -> Result<LogsResponse> {
        let response = self
            .client
            .get(self.url(&format!("/api/logs/{}", operation_id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Follow the log of an operation
    ///
    /// # Arguments
    /// * `operation_id` - Id returned by [`ValveClient::operate`]
    ///
    /// # Returns
    /// A stream of `data` payloads; keep-alive comments are skipped
    pub async fn stream_logs(&self, operation_id: &str) -> Result<LogStream> {
        let response = self
            .client
            .get(self.url(&format!("/api/logs/{}/stream", operation_id)))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        tracing::debug!("Streaming logs for operation {}", operation_id);

        let bytes = response.bytes_stream().boxed();

        let lines = stream::unfold(
            (bytes, SseDecoder::default(), false),
            |(mut bytes, mut decoder, failed)| async move {
                if failed {
                    return None;
                }
                loop {
                    if let Some(data) = decoder.next_data() {
                        return Some((Ok(data), (bytes, decoder, false)));
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => decoder.push(&chunk),
                        Some(Err(e)) => {
                            return Some((Err(ClientError::from(e)), (bytes, decoder, true)));
                        }
                        None => return None,
                    }
                }
            },
        );

        Ok(lines.boxed())
    }
}
