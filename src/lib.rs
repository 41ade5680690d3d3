//! # idea-capture
//!
//! Turn a startup pitch-deck PDF and the founder's notes into a structured
//! business analysis: title, description, audience, problem statements,
//! tags, follow-up questions and burning problems.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF + notes
//!  │
//!  ├─ 1. Stage      write upload to a temp file, check %PDF magic
//!  ├─ 2. Ingest     page text + bold/large words via pdfium (spawn_blocking)
//!  ├─ 3. Compose    fill one of four prompt templates (pitch cut to 4000 chars)
//!  ├─ 4. Invoke     Bedrock (streamed) / Anthropic / any edgequake-llm provider
//!  ├─ 5. Normalize  parse JSON → extract {…} → fallback record
//!  └─ 6. Output     InsightRecord + tier + stats; temp file removed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use idea_capture::{CaptureConfig, IdeaCapture, ProviderKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads ANTHROPIC_API_KEY from the environment
//!     let config = CaptureConfig::builder()
//!         .provider(ProviderKind::Anthropic)
//!         .build()?;
//!     let capture = IdeaCapture::new(config)?;
//!     let output = capture
//!         .analyze_file("A subscription box for artisanal coffee", "deck.pdf")
//!         .await?;
//!     println!("{}", serde_json::to_string_pretty(&output.record)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Serving over HTTP
//!
//! [`server::create_router`] exposes `POST /idea-capture` and `GET /health`;
//! the `idea-capture serve` binary wraps it.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `idea-capture` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod capture;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{ModelBackend, ResponseChunk};
pub use capture::IdeaCapture;
pub use config::{CaptureConfig, CaptureConfigBuilder, EmphasisRule, PromptTemplate, ProviderKind};
pub use error::{CaptureError, ChunkError, ErrorKind};
pub use output::{AnalysisOutput, AnalysisStats, ExtractedContent, InsightRecord, ParseTier};
pub use pipeline::extract::{DocumentExtractor, PdfiumExtractor};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
