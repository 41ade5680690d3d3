//! Upload staging: put uploaded bytes on disk where pdfium can open them.
//!
//! pdfium wants a file-system path, so each upload is written to a
//! request-scoped temp file. [`StagedUpload::release`] deletes it and only
//! logs a failed delete. If a caller never reaches `release` (a panic, an
//! early `?`), dropping the `NamedTempFile` inside still removes the file.
//!
//! The `%PDF` signature check runs on the staged file before pdfium sees
//! it, so callers get a meaningful error rather than a pdfium failure.

use crate::error::CaptureError;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// PDF readers accept the signature anywhere in the first 1024 bytes.
const MAGIC_WINDOW: usize = 1024;

/// An upload written to a temp file for the lifetime of one request.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    /// Path of the staged file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the staged file. Failure is logged, never returned.
    pub fn release(self) {
        let path = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => debug!("Removed staged upload {}", path.display()),
            Err(e) => warn!("Failed to remove staged upload {}: {}", path.display(), e),
        }
    }
}

/// Write `bytes` to a fresh `idea-capture-*.pdf` file inside `dir`.
pub fn stage_upload(bytes: &[u8], dir: &Path) -> Result<StagedUpload, CaptureError> {
    if bytes.is_empty() {
        return Err(CaptureError::EmptyUpload);
    }

    let staging_err = |source: std::io::Error| CaptureError::Staging {
        dir: dir.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(staging_err)?;
    let mut file = tempfile::Builder::new()
        .prefix("idea-capture-")
        .suffix(".pdf")
        .tempfile_in(dir)
        .map_err(staging_err)?;
    file.write_all(bytes).map_err(staging_err)?;
    file.flush().map_err(staging_err)?;

    debug!(
        "Staged {} byte upload at {}",
        bytes.len(),
        file.path().display()
    );
    Ok(StagedUpload { file })
}

/// Check that the file at `path` carries a PDF signature.
pub fn validate_pdf(path: &Path) -> Result<(), CaptureError> {
    let mut head = Vec::with_capacity(MAGIC_WINDOW);
    std::fs::File::open(path)
        .and_then(|f| f.take(MAGIC_WINDOW as u64).read_to_end(&mut head))
        .map_err(|e| CaptureError::Internal(format!("cannot read '{}': {e}", path.display())))?;

    if head.is_empty() {
        return Err(CaptureError::EmptyUpload);
    }
    if !has_pdf_signature(&head) {
        return Err(CaptureError::NotAPdf {
            path: PathBuf::from(path),
            magic: head.iter().take(8).copied().collect(),
        });
    }
    Ok(())
}

fn has_pdf_signature(head: &[u8]) -> bool {
    head.windows(4).any(|w| w == b"%PDF")
}
