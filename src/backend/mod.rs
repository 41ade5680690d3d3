//! Model backends: one outbound call per analysis, answered as chunks.
//!
//! Every backend looks the same to the pipeline. [`ModelBackend::invoke`]
//! returns a [`ChunkStream`] of raw [`ResponseChunk`]s in arrival order,
//! and [`ModelBackend::text_delta`] pulls the text fragment out of one
//! chunk. Streaming backends yield many chunks; single-shot backends yield
//! exactly one holding the whole response body.
//!
//! Keeping decoding separate from transport lets the accumulator in
//! [`crate::pipeline::llm`] treat a bad chunk as skippable while a broken
//! stream stays fatal.
//!
//! | Backend | Transport | Chunk payload |
//! |---------|-----------|---------------|
//! | [`bedrock`] | `invoke-with-response-stream`, AWS event-stream frames | `{"bytes": base64(json)}` |
//! | [`anthropic`] | Messages API, one JSON body | `{"content":[{"text":…}]}` |
//! | [`gateway`] | any `edgequake-llm` provider | completion text |

pub mod anthropic;
pub mod bedrock;
pub mod eventstream;
pub mod gateway;
pub mod sigv4;

use crate::config::{CaptureConfig, ProviderKind};
use crate::error::{CaptureError, ChunkError};
use async_trait::async_trait;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;

/// One unit of model output as received, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseChunk {
    pub payload: Vec<u8>,
}

impl ResponseChunk {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

/// Chunks in arrival order. An `Err` item ends the call.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ResponseChunk, CaptureError>> + Send>>;

/// Sampling parameters for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceParams {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl InferenceParams {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// A configured LLM endpoint.
///
/// Built once per service and shared by every request, so implementations
/// hold only read-only state (HTTP client, credentials, model id).
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Short provider name for logs and error messages.
    fn name(&self) -> &str;

    /// Send `prompt` and return the response chunks.
    ///
    /// Errors raised before the first chunk (connect, auth, bad status)
    /// come back as `Err`; errors during streaming come back as `Err` items.
    async fn invoke(
        &self,
        prompt: &str,
        params: &InferenceParams,
    ) -> Result<ChunkStream, CaptureError>;

    /// Text carried by one chunk. `Ok(None)` for chunks that legitimately
    /// carry no text (start/stop markers, metadata).
    fn text_delta(&self, chunk: &ResponseChunk) -> Result<Option<String>, ChunkError>;
}

/// Build the backend named by `config`, once, at service construction.
///
/// A pre-built `config.backend` wins; otherwise `config.provider` decides.
pub fn resolve_backend(config: &CaptureConfig) -> Result<Arc<dyn ModelBackend>, CaptureError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    let backend: Arc<dyn ModelBackend> = match config.provider {
        ProviderKind::Bedrock => Arc::new(bedrock::BedrockBackend::from_config(config)?),
        ProviderKind::Anthropic => Arc::new(anthropic::AnthropicBackend::from_config(config)?),
        ProviderKind::Gateway => Arc::new(gateway::GatewayBackend::from_config(config)?),
    };
    tracing::info!("Model backend ready: {}", backend.name());
    Ok(backend)
}

/// Map a reqwest error raised while sending a request.
pub(crate) fn send_error(provider: &str, e: reqwest::Error) -> CaptureError {
    CaptureError::EndpointUnreachable {
        provider: provider.to_string(),
        detail: e.to_string(),
    }
}

/// Map a non-success HTTP status, keeping at most a short prefix of the body.
pub(crate) fn status_error(provider: &str, status: reqwest::StatusCode, body: &str) -> CaptureError {
    let code = status.as_u16();
    if code == 401 || code == 403 {
        return CaptureError::AuthRejected {
            provider: provider.to_string(),
            status: code,
        };
    }
    CaptureError::RequestRejected {
        provider: provider.to_string(),
        status: code,
        detail: body.chars().take(300).collect(),
    }
}
