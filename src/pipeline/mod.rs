//! Pipeline stages for pitch-deck analysis.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the service in [`crate::capture`] only sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ (prompts) ──▶ llm ──▶ normalize
//! (stage)   (pdfium)    (template)   (chunks) (3 tiers)
//! ```
//!
//! 1. [`input`]: stage the upload to a temp file and check the `%PDF` magic
//! 2. [`extract`]: body text and emphasized words; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`llm`]: the only stage with network I/O; invokes the backend and
//!    concatenates chunk text in order, skipping undecodable chunks
//! 4. [`normalize`]: parse the response into an `InsightRecord`, falling back
//!    to a placeholder record instead of failing

pub mod extract;
pub mod input;
pub mod llm;
pub mod normalize;
