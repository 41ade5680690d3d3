//! Amazon Bedrock streaming backend (`invoke-with-response-stream`).
//!
//! The request body is the Nova messages shape:
//!
//! ```json
//! { "inferenceConfig": { "max_new_tokens": 1000, "temperature": 0.4 },
//!   "messages": [ { "role": "user", "content": [ { "text": "…" } ] } ] }
//! ```
//!
//! The response is an AWS event stream. Each `chunk` event carries
//! `{"bytes": "<base64>"}`; the decoded JSON holds the text fragment at
//! `contentBlockDelta.delta.text` (other events, such as `messageStart` or
//! `metadata`, carry none). `exception` frames abort the call.

use super::eventstream::{EventStreamDecoder, Frame, FrameError};
use super::sigv4::{self, AwsCredentials, SignableRequest};
use super::{send_error, status_error, ChunkStream, InferenceParams, ModelBackend, ResponseChunk};
use crate::config::{CaptureConfig, DEFAULT_BEDROCK_MODEL};
use crate::error::{CaptureError, ChunkError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::stream::{self, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

const PROVIDER: &str = "bedrock";

/// How requests to Bedrock are authorised.
#[derive(Clone, PartialEq, Eq)]
pub enum BedrockAuth {
    /// Bedrock API key sent as `Authorization: Bearer …`.
    Bearer(String),
    /// IAM credentials, SigV4-signed per request.
    SigV4(AwsCredentials),
}

impl BedrockAuth {
    /// Secret-free description for logs.
    pub fn describe(&self) -> &'static str {
        match self {
            BedrockAuth::Bearer(_) => "bearer <redacted>",
            BedrockAuth::SigV4(_) => "sigv4 <redacted>",
        }
    }

    /// Credentials from `AWS_BEARER_TOKEN_BEDROCK`, else `AWS_ACCESS_KEY_ID` +
    /// `AWS_SECRET_ACCESS_KEY` (+ `AWS_SESSION_TOKEN`).
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("AWS_BEARER_TOKEN_BEDROCK") {
            return Some(BedrockAuth::Bearer(token));
        }
        match (get("AWS_ACCESS_KEY_ID"), get("AWS_SECRET_ACCESS_KEY")) {
            (Some(access_key_id), Some(secret_access_key)) => {
                Some(BedrockAuth::SigV4(AwsCredentials {
                    access_key_id,
                    secret_access_key,
                    session_token: get("AWS_SESSION_TOKEN"),
                }))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for BedrockAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

// ── Request body ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    #[serde(rename = "inferenceConfig")]
    inference_config: InferenceConfig,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct InferenceConfig {
    max_new_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: [TextBlock<'a>; 1],
}

#[derive(Debug, Serialize)]
struct TextBlock<'a> {
    text: &'a str,
}

fn request_body(prompt: &str, params: &InferenceParams) -> Result<Vec<u8>, CaptureError> {
    let request = InvokeRequest {
        inference_config: InferenceConfig {
            max_new_tokens: params.max_tokens,
            temperature: params.temperature,
        },
        messages: [Message {
            role: "user",
            content: [TextBlock { text: prompt }],
        }],
    };
    serde_json::to_vec(&request)
        .map_err(|e| CaptureError::Internal(format!("cannot encode Bedrock request: {e}")))
}

// ── Backend ──────────────────────────────────────────────────────────────

/// Provider A: Bedrock runtime with streamed response.
pub struct BedrockBackend {
    client: reqwest::Client,
    endpoint: String,
    region: String,
    model_id: String,
    auth: BedrockAuth,
}

impl fmt::Debug for BedrockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BedrockBackend")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("model_id", &self.model_id)
            .field("auth", &self.auth)
            .finish()
    }
}

impl BedrockBackend {
    /// `endpoint` is scheme + host, e.g. `https://bedrock-runtime.ap-south-1.amazonaws.com`.
    pub fn new(
        endpoint: impl Into<String>,
        region: impl Into<String>,
        model_id: impl Into<String>,
        auth: BedrockAuth,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            region: region.into(),
            model_id: model_id.into(),
            auth,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Result<Self, CaptureError> {
        let auth = config
            .bedrock_auth
            .clone()
            .or_else(BedrockAuth::from_env)
            .ok_or_else(|| CaptureError::ProviderNotConfigured {
                provider: PROVIDER.to_string(),
                hint: "Set AWS_BEARER_TOKEN_BEDROCK, or AWS_ACCESS_KEY_ID and \
                       AWS_SECRET_ACCESS_KEY (plus AWS_SESSION_TOKEN for temporary credentials)."
                    .to_string(),
            })?;

        let endpoint = config
            .bedrock_endpoint
            .clone()
            .unwrap_or_else(|| regional_endpoint(&config.region));
        let model_id = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_BEDROCK_MODEL.to_string());

        Ok(Self::new(endpoint, config.region.clone(), model_id, auth))
    }

    fn invoke_url(&self) -> String {
        format!(
            "{}/model/{}/invoke-with-response-stream",
            self.endpoint,
            urlencoding::encode(&self.model_id)
        )
    }

    fn sigv4_headers(
        &self,
        credentials: &AwsCredentials,
        url: &str,
        body: &[u8],
    ) -> Result<Vec<(&'static str, String)>, CaptureError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| CaptureError::InvalidConfig(format!("bad Bedrock endpoint: {e}")))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            (None, _) => {
                return Err(CaptureError::InvalidConfig(
                    "Bedrock endpoint has no host".into(),
                ))
            }
        };
        let request = SignableRequest {
            method: "POST",
            host: &host,
            path: parsed.path(),
            payload: body,
        };
        sigv4::sign(
            credentials,
            &self.region,
            PROVIDER,
            &request,
            chrono::Utc::now(),
        )
    }
}

/// `https://bedrock-runtime.{region}.amazonaws.com`
pub fn regional_endpoint(region: &str) -> String {
    format!("https://bedrock-runtime.{region}.amazonaws.com")
}

#[async_trait]
impl ModelBackend for BedrockBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn invoke(
        &self,
        prompt: &str,
        params: &InferenceParams,
    ) -> Result<ChunkStream, CaptureError> {
        let body = request_body(prompt, params)?;
        let url = self.invoke_url();
        debug!("Bedrock invoke: model={} body={} bytes", self.model_id, body.len());

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/vnd.amazon.eventstream")
            .header("x-amzn-bedrock-accept", "application/json");

        request = match &self.auth {
            BedrockAuth::Bearer(token) => request.bearer_auth(token),
            BedrockAuth::SigV4(credentials) => {
                let mut signed = request;
                for (name, value) in self.sigv4_headers(credentials, &url, &body)? {
                    signed = signed.header(name, value);
                }
                signed
            }
        };

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| send_error(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Bedrock returned HTTP {}: {}", status, text);
            return Err(status_error(PROVIDER, status, &text));
        }

        Ok(frame_stream(response))
    }

    fn text_delta(&self, chunk: &ResponseChunk) -> Result<Option<String>, ChunkError> {
        decode_chunk(&chunk.payload)
    }
}

/// Decode one `chunk` event payload to its text fragment.
pub fn decode_chunk(payload: &[u8]) -> Result<Option<String>, ChunkError> {
    let envelope: Value =
        serde_json::from_slice(payload).map_err(|e| ChunkError::InvalidJson(e.to_string()))?;
    let encoded = envelope
        .get("bytes")
        .and_then(Value::as_str)
        .ok_or_else(|| ChunkError::UnexpectedShape("no 'bytes' field".into()))?;
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|e| ChunkError::InvalidBase64(e.to_string()))?;
    let event: Value =
        serde_json::from_slice(&decoded).map_err(|e| ChunkError::InvalidJson(e.to_string()))?;

    Ok(event
        .pointer("/contentBlockDelta/delta/text")
        .and_then(Value::as_str)
        .map(str::to_string))
}

/// Turn a decoded frame into a chunk; `Ok(None)` for frames with no chunk.
fn frame_to_chunk(frame: Frame) -> Result<Option<ResponseChunk>, CaptureError> {
    match frame.message_type() {
        Some("exception") | Some("error") => {
            let kind = frame.exception_type().unwrap_or("unknown").to_string();
            let message = serde_json::from_slice::<Value>(&frame.payload)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_default();
            Err(CaptureError::StreamInterrupted {
                provider: PROVIDER.to_string(),
                detail: format!("{kind}: {message}"),
            })
        }
        _ => match frame.event_type() {
            Some("chunk") => Ok(Some(ResponseChunk::new(frame.payload))),
            other => {
                debug!("Ignoring event-stream frame of type {:?}", other);
                Ok(None)
            }
        },
    }
}

fn framing_error(e: FrameError) -> CaptureError {
    CaptureError::StreamInterrupted {
        provider: PROVIDER.to_string(),
        detail: e.to_string(),
    }
}

/// Decode the response body into chunks as bytes arrive.
fn frame_stream(response: reqwest::Response) -> ChunkStream {
    let body = Box::pin(response.bytes_stream());
    let state = (body, EventStreamDecoder::new(), false);

    Box::pin(stream::unfold(state, |(mut body, mut decoder, done)| async move {
        if done {
            return None;
        }
        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => match frame_to_chunk(frame) {
                    Ok(Some(chunk)) => return Some((Ok(chunk), (body, decoder, false))),
                    Ok(None) => continue,
                    Err(e) => return Some((Err(e), (body, decoder, true))),
                },
                Ok(None) => {}
                Err(e) => return Some((Err(framing_error(e)), (body, decoder, true))),
            }

            match body.next().await {
                Some(Ok(bytes)) => decoder.push(&bytes),
                Some(Err(e)) => {
                    let err = CaptureError::StreamInterrupted {
                        provider: PROVIDER.to_string(),
                        detail: e.to_string(),
                    };
                    return Some((Err(err), (body, decoder, true)));
                }
                None => {
                    return match decoder.finish() {
                        Ok(()) => None,
                        Err(e) => Some((Err(framing_error(e)), (body, decoder, true))),
                    }
                }
            }
        }
    }))
}
