//! Document ingestion: body text and emphasized words via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with internal global state and no async API.
//! [`ingest`] runs the extractor on Tokio's blocking pool so a large deck
//! never stalls the worker threads serving other requests.
//!
//! ## Emphasis detection
//!
//! pdfium reports text per character. Characters are grouped into words on
//! whitespace only, and a word takes the font of its first character, so a
//! bold "Growth" followed by a regular ":" stays one word, "Growth:". A word
//! is emphasized when that font passes [`EmphasisRule::is_emphasized`].
//! Per-character inspection is skipped entirely unless the caller asks for
//! emphasis.

use crate::config::EmphasisRule;
use crate::error::CaptureError;
use crate::output::ExtractedContent;
use pdfium_render::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Produces [`ExtractedContent`] from a PDF on disk.
///
/// Implementations are blocking; [`ingest`] moves them off the async
/// runtime. The trait exists so services and tests can swap pdfium for
/// another text source.
pub trait DocumentExtractor: Send + Sync {
    /// Extract text from every page in order, plus emphasized words when
    /// `emphasis` is given. Fails only when the document as a whole cannot
    /// be parsed.
    fn extract(
        &self,
        path: &Path,
        emphasis: Option<&EmphasisRule>,
    ) -> Result<ExtractedContent, CaptureError>;
}

/// Run `extractor` on the blocking pool.
pub async fn ingest(
    extractor: Arc<dyn DocumentExtractor>,
    path: &Path,
    emphasis: Option<EmphasisRule>,
) -> Result<ExtractedContent, CaptureError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || extractor.extract(&path, emphasis.as_ref()))
        .await
        .map_err(|e| CaptureError::Internal(format!("Ingest task panicked: {}", e)))?
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// pdfium-backed extractor.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    library: Option<PathBuf>,
}

impl PdfiumExtractor {
    /// `library` points at a libpdfium file; None means `PDFIUM_LIB_PATH`,
    /// then the system library.
    pub fn new(library: Option<PathBuf>) -> Self {
        Self { library }
    }
}

/// Bind to pdfium: explicit path, else `PDFIUM_LIB_PATH`, else the system library.
pub fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, CaptureError> {
    let from_env = std::env::var("PDFIUM_LIB_PATH")
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);

    let bindings = match library.map(Path::to_path_buf).or(from_env) {
        Some(path) => {
            debug!("Binding pdfium from {}", path.display());
            Pdfium::bind_to_library(path.as_path()).map_err(|e| {
                CaptureError::PdfiumBindingFailed(format!("{}: {}", path.display(), e))
            })?
        }
        None => Pdfium::bind_to_system_library()
            .map_err(|e| CaptureError::PdfiumBindingFailed(e.to_string()))?,
    };
    Ok(Pdfium::new(bindings))
}

impl DocumentExtractor for PdfiumExtractor {
    fn extract(
        &self,
        path: &Path,
        emphasis: Option<&EmphasisRule>,
    ) -> Result<ExtractedContent, CaptureError> {
        let pdfium = bind_pdfium(self.library.as_deref())?;

        let document = pdfium.load_pdf_from_file(path, None).map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                CaptureError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            } else {
                CaptureError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: err_str,
                }
            }
        })?;

        let mut pages: Vec<Option<(String, Vec<Glyph>)>> = Vec::new();
        for (idx, page) in document.pages().iter().enumerate() {
            let text = match page.text() {
                Ok(text) => text,
                Err(e) => {
                    warn!("Page {}: no extractable text ({:?})", idx + 1, e);
                    pages.push(None);
                    continue;
                }
            };

            let glyphs: Vec<Glyph> = if emphasis.is_some() {
                text.chars()
                    .iter()
                    .filter_map(|c| {
                        c.unicode_char().map(|ch| Glyph {
                            ch,
                            font_size: c.scaled_font_size().value,
                            font_name: c.font_name(),
                        })
                    })
                    .collect()
            } else {
                Vec::new()
            };
            pages.push(Some((text.all(), glyphs)));
        }

        let content = assemble_pages(pages, emphasis);
        info!(
            "Extracted {} pages, {} chars, {} emphasized terms",
            content.page_count,
            content.body_text.chars().count(),
            content.emphasized_terms.len()
        );
        Ok(content)
    }
}

/// Combine per-page results in page order.
///
/// Pages are joined with `\n`; a `None` page (no extractable text) adds an
/// empty segment. Emphasized terms are deduplicated across the whole
/// document in discovery order. Glyphs are ignored when `emphasis` is None.
pub fn assemble_pages(
    pages: Vec<Option<(String, Vec<Glyph>)>>,
    emphasis: Option<&EmphasisRule>,
) -> ExtractedContent {
    let mut page_texts = Vec::with_capacity(pages.len());
    let mut terms = TermCollector::default();

    for page in pages {
        match page {
            Some((text, glyphs)) => {
                page_texts.push(text);
                if let Some(rule) = emphasis {
                    terms.collect(group_words(glyphs), rule);
                }
            }
            None => page_texts.push(String::new()),
        }
    }

    ExtractedContent {
        body_text: page_texts.join("\n"),
        page_count: page_texts.len(),
        emphasized_terms: terms.into_terms(),
    }
}

// ── Word grouping ────────────────────────────────────────────────────────

/// One rendered character with its font.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub font_size: f32,
    pub font_name: String,
}

/// A run of non-whitespace glyphs, carrying the font of its first glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub font_size: f32,
    pub font_name: String,
}

/// Group glyphs into words in reading order.
pub fn group_words(glyphs: impl IntoIterator<Item = Glyph>) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Option<Word> = None;

    for glyph in glyphs {
        if glyph.ch.is_whitespace() || glyph.ch.is_control() {
            words.extend(current.take());
            continue;
        }

        match current.as_mut() {
            Some(word) => word.text.push(glyph.ch),
            None => {
                current = Some(Word {
                    text: glyph.ch.to_string(),
                    font_size: glyph.font_size,
                    font_name: glyph.font_name,
                })
            }
        }
    }
    words.extend(current);
    words
}

/// Deduplicating collector that remembers first-seen order.
#[derive(Debug, Default)]
struct TermCollector {
    seen: HashSet<String>,
    terms: Vec<String>,
}

impl TermCollector {
    fn collect(&mut self, words: impl IntoIterator<Item = Word>, rule: &EmphasisRule) {
        for word in words {
            if rule.is_emphasized(word.font_size, &word.font_name) && !self.seen.contains(&word.text) {
                self.seen.insert(word.text.clone());
                self.terms.push(word.text);
            }
        }
    }

    fn into_terms(self) -> Vec<String> {
        self.terms
    }
}

/// Emphasized words across `words`, deduplicated in discovery order.
pub fn emphasized_terms(words: impl IntoIterator<Item = Word>, rule: &EmphasisRule) -> Vec<String> {
    let mut terms = TermCollector::default();
    terms.collect(words, rule);
    terms.into_terms()
}
