//! Error types for the idea-capture library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CaptureError`]: **Fatal**: the analysis cannot produce a record
//!   (the upload is not a PDF, the model endpoint is unreachable, the
//!   provider is not configured). Returned as `Err(CaptureError)` from
//!   [`crate::capture::IdeaCapture`].
//!
//! * [`ChunkError`]: **Non-fatal**: a single streamed chunk could not be
//!   decoded. The chunk is skipped, counted in
//!   [`crate::output::AnalysisStats::chunks_skipped`], and the rest of the
//!   response is still used.
//!
//! Malformed model *content* is neither: it is absorbed into the fallback
//! record by [`crate::pipeline::normalize`] and never surfaces as an error.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification used by the HTTP layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something that is not a parseable PDF (4xx).
    DocumentFormat,
    /// The model endpoint failed: network, auth, rejected request, timeout (5xx).
    Transport,
    /// Misconfiguration or a bug on our side (5xx).
    Internal,
}

/// All fatal errors returned by the idea-capture library.
#[derive(Debug, Error)]
pub enum CaptureError {
    // ── Document errors ───────────────────────────────────────────────────
    /// The upload carried zero bytes.
    #[error("Uploaded file is empty")]
    EmptyUpload,

    /// The bytes do not start with the `%PDF` signature.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: Vec<u8> },

    /// pdfium could not parse the document structure.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The PDF is encrypted; uploads carry no password.
    #[error("PDF '{path}' is encrypted and requires a password")]
    PasswordRequired { path: PathBuf },

    // ── Transport errors ──────────────────────────────────────────────────
    /// Connection, DNS or TLS failure before a response arrived.
    #[error("Model endpoint for '{provider}' unreachable: {detail}")]
    EndpointUnreachable { provider: String, detail: String },

    /// The endpoint answered 401/403.
    #[error("Authentication rejected by provider '{provider}' (HTTP {status})")]
    AuthRejected { provider: String, status: u16 },

    /// The endpoint answered with any other non-success status.
    #[error("Provider '{provider}' rejected the request (HTTP {status}): {detail}")]
    RequestRejected {
        provider: String,
        status: u16,
        detail: String,
    },

    /// The response stream broke off or carried an exception frame.
    #[error("Response stream from '{provider}' interrupted: {detail}")]
    StreamInterrupted { provider: String, detail: String },

    /// The model call exceeded the configured timeout.
    #[error("Model call to '{provider}' timed out after {secs}s")]
    ModelTimeout { provider: String, secs: u64 },

    // ── Setup errors ──────────────────────────────────────────────────────
    /// The configured provider cannot be built (missing credentials etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Writing the upload to the staging directory failed.
    #[error("Failed to stage upload in '{dir}': {source}")]
    Staging {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CaptureError {
    /// Classify the error for status mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::EmptyUpload
            | CaptureError::NotAPdf { .. }
            | CaptureError::CorruptPdf { .. }
            | CaptureError::PasswordRequired { .. } => ErrorKind::DocumentFormat,

            CaptureError::EndpointUnreachable { .. }
            | CaptureError::AuthRejected { .. }
            | CaptureError::RequestRejected { .. }
            | CaptureError::StreamInterrupted { .. }
            | CaptureError::ModelTimeout { .. } => ErrorKind::Transport,

            CaptureError::ProviderNotConfigured { .. }
            | CaptureError::PdfiumBindingFailed(_)
            | CaptureError::InvalidConfig(_)
            | CaptureError::Staging { .. }
            | CaptureError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message that is safe to hand to an untrusted caller.
    ///
    /// Document errors describe the problem; everything else is generic so
    /// endpoint URLs, regions, upstream bodies and server paths stay private.
    pub fn public_message(&self) -> String {
        match self {
            CaptureError::EmptyUpload => "Uploaded file is empty".to_string(),
            CaptureError::NotAPdf { .. } => {
                "Uploaded file is not a PDF document".to_string()
            }
            CaptureError::CorruptPdf { .. } => {
                "Uploaded PDF is corrupt and could not be read".to_string()
            }
            CaptureError::PasswordRequired { .. } => {
                "Uploaded PDF is password-protected".to_string()
            }
            CaptureError::ModelTimeout { .. } => {
                "Analysis failed: the language model did not respond in time".to_string()
            }
            e if e.kind() == ErrorKind::Transport => {
                "Analysis failed: the language model service is unavailable".to_string()
            }
            _ => "Analysis failed: internal error".to_string(),
        }
    }
}

/// Why a single streamed chunk was skipped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChunkError {
    /// The chunk bytes were not valid JSON.
    #[error("chunk is not valid JSON: {0}")]
    InvalidJson(String),

    /// The wrapped `bytes` field was not valid base64.
    #[error("chunk payload is not valid base64: {0}")]
    InvalidBase64(String),

    /// The chunk decoded but did not have the shape the backend expects.
    #[error("unexpected chunk shape: {0}")]
    UnexpectedShape(String),

    /// The chunk bytes were not valid UTF-8.
    #[error("chunk is not valid UTF-8")]
    InvalidUtf8,
}
