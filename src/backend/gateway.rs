//! Gateway backend: any chat provider `edgequake-llm` can build.
//!
//! Lets the service run against OpenAI, Gemini, Ollama, Azure and friends
//! without a bespoke client. The completion text comes back as one chunk.

use super::{ChunkStream, InferenceParams, ModelBackend, ResponseChunk};
use crate::config::CaptureConfig;
use crate::error::{CaptureError, ChunkError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::stream;
use std::sync::Arc;
use tracing::{debug, warn};

/// Model used when a gateway provider is named without one.
pub const DEFAULT_GATEWAY_MODEL: &str = "gpt-4.1-nano";

/// Provider C: delegates to an [`LLMProvider`].
pub struct GatewayBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl GatewayBackend {
    /// Wrap an already-configured provider. `label` names it in logs and errors.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }

    /// Resolve a provider from most-specific to least-specific:
    ///
    /// 1. `config.llm_provider`, used as-is
    /// 2. `config.gateway_provider` with `config.model`
    /// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
    /// 4. [`ProviderFactory::from_env`] auto-detection
    pub fn from_config(config: &CaptureConfig) -> Result<Self, CaptureError> {
        if let Some(ref provider) = config.llm_provider {
            return Ok(Self::new(Arc::clone(provider), "gateway"));
        }

        if let Some(ref name) = config.gateway_provider {
            let model = config.model.as_deref().unwrap_or(DEFAULT_GATEWAY_MODEL);
            return Ok(Self::new(create_provider(name, model)?, name.clone()));
        }

        if let (Ok(name), Ok(model)) = (
            std::env::var("EDGEQUAKE_LLM_PROVIDER"),
            std::env::var("EDGEQUAKE_MODEL"),
        ) {
            if !name.is_empty() && !model.is_empty() {
                let provider = create_provider(&name, &model)?;
                return Ok(Self::new(provider, name));
            }
        }

        let (provider, _embedding) =
            ProviderFactory::from_env().map_err(|e| CaptureError::ProviderNotConfigured {
                provider: "gateway".to_string(),
                hint: format!(
                    "No LLM provider could be auto-detected from environment.\n\
                     Set OPENAI_API_KEY, GEMINI_API_KEY, or EDGEQUAKE_LLM_PROVIDER.\n\
                     Error: {e}"
                ),
            })?;
        Ok(Self::new(provider, "gateway"))
    }
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, CaptureError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        CaptureError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn build_options(params: &InferenceParams) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(params.temperature),
        max_tokens: Some(params.max_tokens),
        ..Default::default()
    }
}

#[async_trait]
impl ModelBackend for GatewayBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn invoke(
        &self,
        prompt: &str,
        params: &InferenceParams,
    ) -> Result<ChunkStream, CaptureError> {
        let messages = vec![ChatMessage::user(prompt)];
        let options = build_options(params);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| {
                warn!("Gateway provider {} failed: {}", self.label, e);
                CaptureError::EndpointUnreachable {
                    provider: self.label.clone(),
                    detail: e.to_string(),
                }
            })?;

        debug!(
            "Gateway {}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );

        let payload = response.content.into_bytes();
        Ok(Box::pin(stream::once(async move {
            Ok(ResponseChunk::new(payload))
        })))
    }

    fn text_delta(&self, chunk: &ResponseChunk) -> Result<Option<String>, ChunkError> {
        String::from_utf8(chunk.payload.clone())
            .map(Some)
            .map_err(|_| ChunkError::InvalidUtf8)
    }
}
