//! Progress-callback trait for stage-level analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::CaptureConfigBuilder::progress_callback`] to observe the
//! pipeline as it moves through ingestion, the model call and normalisation.
//! The CLI uses it to drive its spinner; a server could forward the events
//! to metrics.
//!
//! # Example
//!
//! ```rust
//! use idea_capture::{AnalysisProgressCallback, CaptureConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct ChunkCounter(AtomicUsize);
//!
//! impl AnalysisProgressCallback for ChunkCounter {
//!     fn on_chunk(&self, _response_chars: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = CaptureConfig::builder()
//!     .progress_callback(Arc::new(ChunkCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ParseTier;
use std::sync::Arc;

/// Called by the analysis pipeline at each stage boundary.
///
/// Implementations must be `Send + Sync`: one config, and therefore one
/// callback, serves every concurrent request. All methods default to no-ops.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called before the PDF is opened.
    fn on_ingest_start(&self) {}

    /// Called once the document text has been extracted.
    ///
    /// # Arguments
    /// * `page_count`: pages visited
    /// * `body_chars`: characters of body text extracted
    fn on_ingest_complete(&self, page_count: usize, body_chars: usize) {
        let _ = (page_count, body_chars);
    }

    /// Called just before the model request is sent.
    fn on_model_start(&self, provider: &str, prompt_chars: usize) {
        let _ = (provider, prompt_chars);
    }

    /// Called after every chunk whose text was appended.
    ///
    /// # Arguments
    /// * `response_chars`: accumulated response length so far
    fn on_chunk(&self, response_chars: usize) {
        let _ = response_chars;
    }

    /// Called once the record has been normalised.
    fn on_complete(&self, tier: ParseTier) {
        let _ = tier;
    }

    /// Called when the analysis fails with a fatal error.
    fn on_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CaptureConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
