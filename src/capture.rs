//! The analysis service: PDF + notes in, [`InsightRecord`] out.
//!
//! [`IdeaCapture`] resolves its model backend and document extractor once,
//! at construction, and is then shared read-only across requests (the HTTP
//! server wraps it in an `Arc`). Each analysis runs the same four steps:
//!
//! ```text
//! ingest ──▶ compose ──▶ invoke ──▶ normalize
//! (pdfium)   (template)  (chunks)   (3 tiers)
//! ```
//!
//! [`InsightRecord`]: crate::output::InsightRecord

use crate::backend::{resolve_backend, InferenceParams, ModelBackend};
use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::output::{AnalysisOutput, AnalysisStats};
use crate::pipeline::extract::{ingest, DocumentExtractor, PdfiumExtractor};
use crate::pipeline::{input, llm, normalize};
use crate::prompts::compose_prompt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// A configured analysis service.
pub struct IdeaCapture {
    config: CaptureConfig,
    backend: Arc<dyn ModelBackend>,
    extractor: Arc<dyn DocumentExtractor>,
}

impl std::fmt::Debug for IdeaCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdeaCapture")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl IdeaCapture {
    /// Build the service, resolving the model backend from `config`.
    ///
    /// # Errors
    /// [`CaptureError::ProviderNotConfigured`] when the chosen provider has
    /// no credentials.
    pub fn new(config: CaptureConfig) -> Result<Self, CaptureError> {
        let backend = resolve_backend(&config)?;
        let extractor = config.extractor.clone().unwrap_or_else(|| {
            Arc::new(PdfiumExtractor::new(config.pdfium_library.clone()))
                as Arc<dyn DocumentExtractor>
        });
        info!(
            "Idea capture ready: backend={}, template={}",
            backend.name(),
            config.template.as_str()
        );
        Ok(Self {
            config,
            backend,
            extractor,
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Name of the resolved backend, e.g. `"bedrock"`.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Analyse an uploaded PDF held in memory.
    ///
    /// The bytes are staged to a temporary file for the extractor; that file
    /// is removed before this returns, whatever the outcome.
    pub async fn analyze_bytes(
        &self,
        notes: &str,
        bytes: &[u8],
    ) -> Result<AnalysisOutput, CaptureError> {
        let staged = input::stage_upload(bytes, &self.config.staging_dir())?;

        let result = match input::validate_pdf(staged.path()) {
            Ok(()) => self.run(notes, staged.path()).await,
            Err(e) => Err(e),
        };
        staged.release();
        self.report(result)
    }

    /// Analyse a PDF already on disk. The file is left in place.
    pub async fn analyze_file(
        &self,
        notes: &str,
        path: impl AsRef<Path>,
    ) -> Result<AnalysisOutput, CaptureError> {
        let path = path.as_ref();
        let result = match input::validate_pdf(path) {
            Ok(()) => self.run(notes, path).await,
            Err(e) => Err(e),
        };
        self.report(result)
    }

    fn report(
        &self,
        result: Result<AnalysisOutput, CaptureError>,
    ) -> Result<AnalysisOutput, CaptureError> {
        if let (Err(e), Some(cb)) = (&result, &self.config.progress_callback) {
            cb.on_error(&e.to_string());
        }
        result
    }

    async fn run(&self, notes: &str, path: &Path) -> Result<AnalysisOutput, CaptureError> {
        let total_start = Instant::now();
        let progress = self.config.progress_callback.as_ref();
        let mut stats = AnalysisStats::default();

        // ── Step 1: Ingest ───────────────────────────────────────────────
        if let Some(cb) = progress {
            cb.on_ingest_start();
        }
        let ingest_start = Instant::now();
        let emphasis = self
            .config
            .template
            .uses_highlights()
            .then(|| self.config.emphasis.clone());
        let content = ingest(Arc::clone(&self.extractor), path, emphasis).await?;
        stats.ingest_duration_ms = ingest_start.elapsed().as_millis() as u64;
        stats.page_count = content.page_count;
        stats.body_chars = content.body_text.chars().count();
        stats.emphasized_terms = content.emphasized_terms.len();
        info!(
            "Ingested {} pages, {} chars, {} emphasized terms",
            stats.page_count, stats.body_chars, stats.emphasized_terms
        );
        if let Some(cb) = progress {
            cb.on_ingest_complete(stats.page_count, stats.body_chars);
        }

        // ── Step 2: Compose prompt ───────────────────────────────────────
        let prompt = compose_prompt(
            self.config.template,
            notes,
            &content,
            self.config.max_pitch_chars,
        );
        stats.prompt_chars = prompt.chars().count();

        // ── Step 3: Invoke model ─────────────────────────────────────────
        if let Some(cb) = progress {
            cb.on_model_start(self.backend.name(), stats.prompt_chars);
        }
        let model_start = Instant::now();
        let response = llm::collect_response(
            self.backend.as_ref(),
            &prompt,
            &InferenceParams::from_config(&self.config),
            self.config.model_timeout(),
            progress,
        )
        .await?;
        stats.model_duration_ms = model_start.elapsed().as_millis() as u64;
        stats.chunks_received = response.chunks_received;
        stats.chunks_skipped = response.chunks_skipped;
        stats.response_chars = response.text.chars().count();

        // ── Step 4: Normalize ────────────────────────────────────────────
        let (record, tier) = normalize::normalize_response(&response.text);
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        info!(
            "Analysis complete: tier={:?}, {} chunks ({} skipped), {}ms",
            tier, stats.chunks_received, stats.chunks_skipped, stats.total_duration_ms
        );
        if let Some(cb) = progress {
            cb.on_complete(tier);
        }

        Ok(AnalysisOutput {
            record,
            tier,
            raw_response: response.text,
            stats,
        })
    }
}
