//! Model interaction: send the prompt, accumulate the streamed answer.
//!
//! Chunks are consumed strictly in arrival order. A chunk that cannot be
//! decoded is skipped and counted; the rest of the response still counts.
//! A transport failure at any point (before the first chunk or mid-stream)
//! aborts the call, and no partial text is returned.

use crate::backend::{InferenceParams, ModelBackend};
use crate::error::CaptureError;
use crate::progress::ProgressCallback;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, warn};

/// Accumulated model output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedResponse {
    /// Concatenated text fragments, in chunk order.
    pub text: String,
    /// Chunks received, including skipped ones.
    pub chunks_received: usize,
    /// Chunks that could not be decoded.
    pub chunks_skipped: usize,
}

/// Call `backend` with `prompt` and concatenate the text of every chunk.
///
/// With `timeout` set, the whole call (request plus stream) must finish in
/// time or [`CaptureError::ModelTimeout`] is returned.
pub async fn collect_response(
    backend: &dyn ModelBackend,
    prompt: &str,
    params: &InferenceParams,
    timeout: Option<Duration>,
    progress: Option<&ProgressCallback>,
) -> Result<CollectedResponse, CaptureError> {
    let call = accumulate(backend, prompt, params, progress);

    match timeout {
        Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
            warn!("{} did not answer within {:?}", backend.name(), limit);
            CaptureError::ModelTimeout {
                provider: backend.name().to_string(),
                secs: limit.as_secs(),
            }
        })?,
        None => call.await,
    }
}

async fn accumulate(
    backend: &dyn ModelBackend,
    prompt: &str,
    params: &InferenceParams,
    progress: Option<&ProgressCallback>,
) -> Result<CollectedResponse, CaptureError> {
    let mut stream = backend.invoke(prompt, params).await?;
    let mut collected = CollectedResponse::default();

    while let Some(item) = stream.next().await {
        let chunk = item?;
        collected.chunks_received += 1;

        match backend.text_delta(&chunk) {
            Ok(Some(fragment)) => {
                collected.text.push_str(&fragment);
                if let Some(cb) = progress {
                    cb.on_chunk(collected.text.chars().count());
                }
            }
            Ok(None) => {}
            Err(e) => {
                collected.chunks_skipped += 1;
                warn!(
                    "{}: skipping chunk {} ({})",
                    backend.name(),
                    collected.chunks_received,
                    e
                );
            }
        }
    }

    debug!(
        "{}: {} chunks, {} skipped, {} chars",
        backend.name(),
        collected.chunks_received,
        collected.chunks_skipped,
        collected.text.len()
    );
    Ok(collected)
}
