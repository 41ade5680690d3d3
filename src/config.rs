//! Configuration types for idea capture.
//!
//! All analysis behaviour is controlled through [`CaptureConfig`], built via
//! its [`CaptureConfigBuilder`]. The config is assembled once at process
//! start, handed to [`crate::capture::IdeaCapture::new`], and never mutated
//! afterwards; concurrent requests share it read-only.

use crate::backend::bedrock::BedrockAuth;
use crate::backend::ModelBackend;
use crate::error::CaptureError;
use crate::pipeline::extract::DocumentExtractor;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default Bedrock model: Nova Micro through the APAC inference profile.
pub const DEFAULT_BEDROCK_MODEL: &str = "apac.amazon.nova-micro-v1:0";

/// Default Anthropic model.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-20241022";

/// Default Bedrock region.
pub const DEFAULT_REGION: &str = "ap-south-1";

/// Default Anthropic API base URL.
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Configuration for an idea-capture service.
///
/// Built via [`CaptureConfig::builder()`] or using
/// [`CaptureConfig::default()`].
///
/// # Example
/// ```rust
/// use idea_capture::{CaptureConfig, PromptTemplate, ProviderKind};
///
/// let config = CaptureConfig::builder()
///     .provider(ProviderKind::Anthropic)
///     .template(PromptTemplate::Highlights)
///     .max_tokens(1500)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct CaptureConfig {
    /// Which model backend to call. Default: [`ProviderKind::Bedrock`].
    pub provider: ProviderKind,

    /// Model identifier. If None, uses the backend default
    /// ([`DEFAULT_BEDROCK_MODEL`], [`DEFAULT_ANTHROPIC_MODEL`], or the
    /// gateway provider's own default).
    pub model: Option<String>,

    /// Gateway provider name (e.g. "openai", "gemini", "ollama").
    /// Only read when `provider` is [`ProviderKind::Gateway`].
    pub gateway_provider: Option<String>,

    /// Pre-constructed gateway provider. Takes precedence over `gateway_provider`.
    pub llm_provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed backend. Takes precedence over `provider` entirely.
    pub backend: Option<Arc<dyn ModelBackend>>,

    /// Document extractor. If None, pdfium is used.
    pub extractor: Option<Arc<dyn DocumentExtractor>>,

    /// Prompt template variant. Default: [`PromptTemplate::Dynamic`].
    pub template: PromptTemplate,

    /// Maximum tokens the model may generate. Default: 1000.
    ///
    /// The record is seven short fields; 1000 tokens fits three entries per
    /// list with room to spare. Too low a value truncates the JSON, which
    /// then lands in the fallback tier.
    pub max_tokens: usize,

    /// Sampling temperature. Range 0.0–1.0. Default: 0.4.
    pub temperature: f32,

    /// Timeout for the model call in seconds; 0 disables it. Default: 120.
    ///
    /// Covers the whole call, from request to last streamed chunk. Expiry
    /// surfaces as [`CaptureError::ModelTimeout`], never a partial record.
    pub model_timeout_secs: u64,

    /// Pitch text is cut to this many characters before interpolation. Default: 4000.
    pub max_pitch_chars: usize,

    /// Which words count as emphasized.
    pub emphasis: EmphasisRule,

    /// AWS region for Bedrock. Default: `ap-south-1`.
    pub region: String,

    /// Override for the Bedrock runtime endpoint (scheme + host).
    pub bedrock_endpoint: Option<String>,

    /// Bedrock credentials. If None, read from the AWS environment variables.
    pub bedrock_auth: Option<BedrockAuth>,

    /// Anthropic API key. If None, read from `ANTHROPIC_API_KEY`.
    pub anthropic_api_key: Option<String>,

    /// Anthropic API base URL. Default: `https://api.anthropic.com`.
    pub anthropic_base_url: String,

    /// Directory where uploads are staged. If None, the OS temp dir.
    pub upload_dir: Option<PathBuf>,

    /// Largest accepted upload in bytes. Default: 25 MiB.
    pub max_upload_bytes: usize,

    /// Explicit path to libpdfium. If None, `PDFIUM_LIB_PATH`, then the system library.
    pub pdfium_library: Option<PathBuf>,

    /// Stage-level progress events (CLI spinner, metrics hooks).
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            gateway_provider: None,
            llm_provider: None,
            backend: None,
            extractor: None,
            template: PromptTemplate::default(),
            max_tokens: 1000,
            temperature: 0.4,
            model_timeout_secs: 120,
            max_pitch_chars: 4000,
            emphasis: EmphasisRule::default(),
            region: DEFAULT_REGION.to_string(),
            bedrock_endpoint: None,
            bedrock_auth: None,
            anthropic_api_key: None,
            anthropic_base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            upload_dir: None,
            max_upload_bytes: 25 * 1024 * 1024,
            pdfium_library: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CaptureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("gateway_provider", &self.gateway_provider)
            .field("llm_provider", &self.llm_provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn DocumentExtractor>"))
            .field("template", &self.template)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("model_timeout_secs", &self.model_timeout_secs)
            .field("max_pitch_chars", &self.max_pitch_chars)
            .field("emphasis", &self.emphasis)
            .field("region", &self.region)
            .field("bedrock_endpoint", &self.bedrock_endpoint)
            .field("bedrock_auth", &self.bedrock_auth.as_ref().map(BedrockAuth::describe))
            .field("anthropic_api_key", &self.anthropic_api_key.as_ref().map(|_| "<redacted>"))
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl CaptureConfig {
    /// Create a new builder for `CaptureConfig`.
    pub fn builder() -> CaptureConfigBuilder {
        CaptureConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model call timeout, if one is configured.
    pub fn model_timeout(&self) -> Option<Duration> {
        (self.model_timeout_secs > 0).then(|| Duration::from_secs(self.model_timeout_secs))
    }

    /// Directory uploads are staged in.
    pub fn staging_dir(&self) -> PathBuf {
        self.upload_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Builder for [`CaptureConfig`].
#[derive(Debug)]
pub struct CaptureConfigBuilder {
    config: CaptureConfig,
}

impl CaptureConfigBuilder {
    pub fn provider(mut self, kind: ProviderKind) -> Self {
        self.config.provider = kind;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn gateway_provider(mut self, name: impl Into<String>) -> Self {
        self.config.gateway_provider = Some(name.into());
        self
    }

    pub fn llm_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.llm_provider = Some(provider);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn template(mut self, template: PromptTemplate) -> Self {
        self.config.template = template;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 1.0);
        self
    }

    pub fn model_timeout_secs(mut self, secs: u64) -> Self {
        self.config.model_timeout_secs = secs;
        self
    }

    pub fn max_pitch_chars(mut self, n: usize) -> Self {
        self.config.max_pitch_chars = n;
        self
    }

    pub fn emphasis(mut self, rule: EmphasisRule) -> Self {
        self.config.emphasis = rule;
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = region.into();
        self
    }

    pub fn bedrock_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.bedrock_endpoint = Some(endpoint.into());
        self
    }

    pub fn bedrock_auth(mut self, auth: BedrockAuth) -> Self {
        self.config.bedrock_auth = Some(auth);
        self
    }

    pub fn anthropic_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.anthropic_api_key = Some(key.into());
        self
    }

    pub fn anthropic_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.anthropic_base_url = url.into();
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = Some(dir.into());
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CaptureConfig, CaptureError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(CaptureError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.max_pitch_chars == 0 {
            return Err(CaptureError::InvalidConfig(
                "max_pitch_chars must be ≥ 1".into(),
            ));
        }
        if !c.temperature.is_finite() {
            return Err(CaptureError::InvalidConfig(
                "temperature must be a finite number".into(),
            ));
        }
        if !(c.emphasis.min_font_size.is_finite() && c.emphasis.min_font_size > 0.0) {
            return Err(CaptureError::InvalidConfig(format!(
                "emphasis font size threshold must be > 0, got {}",
                c.emphasis.min_font_size
            )));
        }
        if c.emphasis.font_marker.trim().is_empty() {
            return Err(CaptureError::InvalidConfig(
                "emphasis font marker must not be empty".into(),
            ));
        }
        if c.region.trim().is_empty() {
            return Err(CaptureError::InvalidConfig("region must not be empty".into()));
        }
        if !is_http_url(&c.anthropic_base_url) {
            return Err(CaptureError::InvalidConfig(format!(
                "anthropic base URL must start with http:// or https://, got '{}'",
                c.anthropic_base_url
            )));
        }
        if let Some(ref endpoint) = c.bedrock_endpoint {
            if !is_http_url(endpoint) {
                return Err(CaptureError::InvalidConfig(format!(
                    "bedrock endpoint must start with http:// or https://, got '{endpoint}'"
                )));
            }
        }
        if c.max_upload_bytes < 1024 {
            return Err(CaptureError::InvalidConfig(
                "max_upload_bytes must be at least 1 KiB".into(),
            ));
        }
        Ok(self.config)
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which model backend answers the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Amazon Bedrock `invoke-with-response-stream` (streamed chunks).
    #[default]
    Bedrock,
    /// Anthropic Messages API (single response).
    Anthropic,
    /// Any provider `edgequake-llm` can build.
    Gateway,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Bedrock => "bedrock",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gateway => "gateway",
        }
    }
}

/// Prompt template variant.
///
/// The variants differ in tone and strictness; none is canonical. All of
/// them ask for the same seven-field JSON record.
///
/// | Template | Character |
/// |----------|-----------|
/// | `DeepResearch` | Exhaustive analyst brief, long per-section requirements |
/// | `Dynamic` | Content-driven procedure for questions and problems (default) |
/// | `FounderLens` | Conversational, curiosity-first |
/// | `Highlights` | Adds the deck's emphasized terms and weights headlines |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptTemplate {
    DeepResearch,
    #[default]
    Dynamic,
    FounderLens,
    Highlights,
}

impl PromptTemplate {
    /// Whether the template interpolates emphasized terms, which requires
    /// per-character font inspection during ingestion.
    pub fn uses_highlights(&self) -> bool {
        matches!(self, PromptTemplate::Highlights)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptTemplate::DeepResearch => "deep-research",
            PromptTemplate::Dynamic => "dynamic",
            PromptTemplate::FounderLens => "founder-lens",
            PromptTemplate::Highlights => "highlights",
        }
    }
}

/// Heuristic deciding whether a word is emphasized (headline, bold claim).
///
/// A word qualifies when its rendered font size is at least `min_font_size`
/// points, or its font name contains `font_marker` ignoring case. PDF
/// producers report sizes and font names inconsistently, so both knobs are
/// configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmphasisRule {
    /// Default: 16.0 points.
    pub min_font_size: f32,
    /// Default: `"bold"`.
    pub font_marker: String,
}

impl Default for EmphasisRule {
    fn default() -> Self {
        Self {
            min_font_size: 16.0,
            font_marker: "bold".to_string(),
        }
    }
}

impl EmphasisRule {
    pub fn is_emphasized(&self, font_size: f32, font_name: &str) -> bool {
        font_size >= self.min_font_size
            || font_name
                .to_lowercase()
                .contains(&self.font_marker.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = CaptureConfig::default();
        assert_eq!(c.provider, ProviderKind::Bedrock);
        assert_eq!(c.template, PromptTemplate::Dynamic);
        assert_eq!(c.max_tokens, 1000);
        assert_eq!(c.max_pitch_chars, 4000);
        assert_eq!(c.region, "ap-south-1");
        assert_eq!(c.emphasis.min_font_size, 16.0);
        assert_eq!(c.emphasis.font_marker, "bold");
    }

    #[test]
    fn temperature_is_clamped() {
        let c = CaptureConfig::builder().temperature(3.5).build().unwrap();
        assert_eq!(c.temperature, 1.0);
        let c = CaptureConfig::builder().temperature(-1.0).build().unwrap();
        assert_eq!(c.temperature, 0.0);
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let err = CaptureConfig::builder().max_tokens(0).build().unwrap_err();
        assert!(matches!(err, CaptureError::InvalidConfig(_)));
    }

    #[test]
    fn bad_anthropic_url_rejected() {
        let err = CaptureConfig::builder()
            .anthropic_base_url("api.anthropic.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn empty_font_marker_rejected() {
        let err = CaptureConfig::builder()
            .emphasis(EmphasisRule {
                min_font_size: 16.0,
                font_marker: "  ".into(),
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("marker"));
    }

    #[test]
    fn timeout_zero_disables() {
        let c = CaptureConfig::builder().model_timeout_secs(0).build().unwrap();
        assert!(c.model_timeout().is_none());
        let c = CaptureConfig::builder().model_timeout_secs(5).build().unwrap();
        assert_eq!(c.model_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn debug_redacts_secrets() {
        let c = CaptureConfig::builder()
            .anthropic_api_key("sk-ant-very-secret")
            .bedrock_auth(BedrockAuth::Bearer("bedrock-secret-token".into()))
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-ant-very-secret"), "got: {dbg}");
        assert!(!dbg.contains("bedrock-secret-token"), "got: {dbg}");
    }

    #[test]
    fn emphasis_by_size_or_font_name() {
        let rule = EmphasisRule::default();
        assert!(rule.is_emphasized(16.0, "Helvetica"));
        assert!(rule.is_emphasized(24.0, "Helvetica"));
        assert!(rule.is_emphasized(11.0, "Arial-BoldMT"));
        assert!(rule.is_emphasized(11.0, "ABCDEF+OpenSans-BOLD"));
        assert!(!rule.is_emphasized(15.9, "Helvetica"));
    }

    #[test]
    fn emphasis_thresholds_are_configurable() {
        let rule = EmphasisRule {
            min_font_size: 20.0,
            font_marker: "Black".into(),
        };
        assert!(!rule.is_emphasized(18.0, "Arial-Bold"));
        assert!(rule.is_emphasized(11.0, "Inter-Black"));
        assert!(rule.is_emphasized(20.0, "Inter"));
    }

    #[test]
    fn only_highlights_template_needs_emphasis() {
        assert!(PromptTemplate::Highlights.uses_highlights());
        assert!(!PromptTemplate::Dynamic.uses_highlights());
        assert!(!PromptTemplate::DeepResearch.uses_highlights());
        assert!(!PromptTemplate::FounderLens.uses_highlights());
    }
}
