//! Anthropic Messages API backend (single-shot).
//!
//! The whole response body arrives as one chunk; [`ModelBackend::text_delta`]
//! reads `content[0].text` from it.

use super::{send_error, status_error, ChunkStream, InferenceParams, ModelBackend, ResponseChunk};
use crate::config::{CaptureConfig, DEFAULT_ANTHROPIC_MODEL};
use crate::error::{CaptureError, ChunkError};
use async_trait::async_trait;
use futures::stream;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

const PROVIDER: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// Provider B: one POST to `/v1/messages`, one JSON body back.
pub struct AnthropicBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl AnthropicBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Result<Self, CaptureError> {
        let api_key = config
            .anthropic_api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CaptureError::ProviderNotConfigured {
                provider: PROVIDER.to_string(),
                hint: "Set ANTHROPIC_API_KEY.".to_string(),
            })?;
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string());

        Ok(Self::new(config.anthropic_base_url.clone(), api_key, model))
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

/// Text of the first content block of a Messages API response.
pub fn first_text_block(body: &[u8]) -> Result<Option<String>, ChunkError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ChunkError::InvalidJson(e.to_string()))?;
    let content = value
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| ChunkError::UnexpectedShape("no 'content' array".into()))?;

    Ok(content
        .first()
        .and_then(|block| block.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string))
}

#[async_trait]
impl ModelBackend for AnthropicBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn invoke(
        &self,
        prompt: &str,
        params: &InferenceParams,
    ) -> Result<ChunkStream, CaptureError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: params.max_tokens,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };
        debug!("Anthropic request: model={} prompt={} chars", self.model, prompt.chars().count());

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Anthropic returned HTTP {}: {}", status, text);
            return Err(status_error(PROVIDER, status, &text));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CaptureError::StreamInterrupted {
                provider: PROVIDER.to_string(),
                detail: e.to_string(),
            })?;

        Ok(Box::pin(stream::once(async move {
            Ok(ResponseChunk::new(body.to_vec()))
        })))
    }

    fn text_delta(&self, chunk: &ResponseChunk) -> Result<Option<String>, ChunkError> {
        first_text_block(&chunk.payload)
    }
}
