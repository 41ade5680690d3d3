//! Output types produced by the analysis pipeline.

use serde::{Deserialize, Serialize};

/// Text and emphasis cues pulled out of one PDF.
///
/// Built once per document and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    /// Page texts in document order, joined by `\n`. A page without
    /// extractable text contributes an empty segment.
    pub body_text: String,

    /// Emphasized words, deduplicated, in order of first appearance.
    /// Empty unless emphasis detection was requested.
    pub emphasized_terms: Vec<String>,

    /// Number of pages visited.
    pub page_count: usize,
}

impl ExtractedContent {
    /// Emphasized terms one per line, the form the highlights template expects.
    pub fn highlights_block(&self) -> String {
        self.emphasized_terms.join("\n")
    }
}

/// The normalised business analysis.
///
/// Every field is always present in the serialised form; empty strings and
/// empty lists stand in for anything the model did not provide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsightRecord {
    pub title: String,
    pub description: String,
    pub audience: String,
    pub problem_statements: Vec<String>,
    pub tags: Vec<String>,
    pub follow_up_questions: Vec<String>,
    pub burning_problems: Vec<String>,
}

/// Title of the record returned when the model output cannot be parsed.
pub const FALLBACK_TITLE: &str = "Product Analysis";

/// Description of the record returned when the model output cannot be parsed.
pub const FALLBACK_DESCRIPTION: &str = "Analysis could not be completed";

impl InsightRecord {
    /// The placeholder returned when every parse tier fails.
    pub fn fallback() -> Self {
        Self {
            title: FALLBACK_TITLE.to_string(),
            description: FALLBACK_DESCRIPTION.to_string(),
            ..Default::default()
        }
    }
}

/// Which normalisation tier produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseTier {
    /// The whole trimmed response was a JSON object.
    Parsed,
    /// The span from the first `{` to the last `}` was a JSON object.
    ExtractedSubset,
    /// Nothing parsed; the record is [`InsightRecord::fallback`].
    Fallback,
}

/// Counters and timings for one analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub page_count: usize,
    pub body_chars: usize,
    pub emphasized_terms: usize,
    pub prompt_chars: usize,
    pub chunks_received: usize,
    pub chunks_skipped: usize,
    pub response_chars: usize,
    pub ingest_duration_ms: u64,
    pub model_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything one analysis produced.
///
/// The HTTP endpoint returns only `record`; the CLI can show all of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub record: InsightRecord,
    pub tier: ParseTier,
    /// The concatenated model response before normalisation.
    pub raw_response: String,
    pub stats: AnalysisStats,
}
