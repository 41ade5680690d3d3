//! Response normalisation: turn whatever the model said into an [`InsightRecord`].
//!
//! Models are asked for JSON only, but they wrap it in prose, Markdown
//! fences, or stop mid-object when they run out of tokens. Normalisation
//! never fails; it reports which tier produced the record so callers and
//! tests can tell a clean answer from a salvaged or placeholder one.
//!
//! ## Tiers
//!
//! 1. **Parsed**: the whole trimmed response is a JSON object.
//! 2. **ExtractedSubset**: the maximal span from the first `{` to the last
//!    `}` is a JSON object (strips fences and chatter around it).
//! 3. **Fallback**: [`InsightRecord::fallback`].
//!
//! Only JSON *objects* count. A response that happens to be a bare JSON
//! string or array is treated as unparsed.

use crate::output::{InsightRecord, ParseTier};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// First `{` through last `}`, across lines. Greedy on purpose: the record
/// nests objects inside lists, so the minimal match would cut it short.
static RE_OBJECT_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Normalise a complete model response.
pub fn normalize_response(response: &str) -> (InsightRecord, ParseTier) {
    // ── Tier 1: whole response ───────────────────────────────────────────
    if let Some(obj) = parse_object(response.trim()) {
        debug!("Response parsed as JSON directly");
        return (record_from_object(&obj), ParseTier::Parsed);
    }

    // ── Tier 2: outermost brace span ─────────────────────────────────────
    if let Some(span) = RE_OBJECT_SPAN.find(response) {
        if let Some(obj) = parse_object(span.as_str()) {
            debug!(
                "Response parsed from embedded object at bytes {}..{}",
                span.start(),
                span.end()
            );
            return (record_from_object(&obj), ParseTier::ExtractedSubset);
        }
    }

    // ── Tier 3: placeholder ──────────────────────────────────────────────
    warn!(
        "Model response could not be parsed as JSON ({} chars); returning fallback record",
        response.len()
    );
    (InsightRecord::fallback(), ParseTier::Fallback)
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Coerce a JSON object into a record. Missing keys become empty, unknown
/// keys are ignored, and mistyped values are converted where that is
/// unambiguous (see [`coerce_string`] and [`coerce_list`]).
pub fn record_from_object(obj: &Map<String, Value>) -> InsightRecord {
    InsightRecord {
        title: coerce_string(obj.get("title")),
        description: coerce_string(obj.get("description")),
        audience: coerce_string(obj.get("audience")),
        problem_statements: coerce_list(obj.get("problemStatements")),
        tags: coerce_list(obj.get("tags")),
        follow_up_questions: coerce_list(obj.get("followUpQuestions")),
        burning_problems: coerce_list(obj.get("burningProblems")),
    }
}

/// String field: strings as-is, scalars as text, arrays joined with ", ".
fn coerce_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(scalar_text)
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

/// List field: array elements as text (nulls and nested containers dropped),
/// a lone non-empty string as a one-element list.
fn coerce_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "title": "BrewBox",
        "description": "Monthly artisanal coffee subscription.",
        "audience": "Home baristas",
        "problemStatements": ["Hard to discover roasters", "Stale supermarket beans"],
        "tags": ["coffee", "subscription"],
        "followUpQuestions": ["How do you pick roasters?"],
        "burningProblems": ["Retaining subscribers after month three"]
    }"#;

    fn brewbox() -> InsightRecord {
        InsightRecord {
            title: "BrewBox".into(),
            description: "Monthly artisanal coffee subscription.".into(),
            audience: "Home baristas".into(),
            problem_statements: vec![
                "Hard to discover roasters".into(),
                "Stale supermarket beans".into(),
            ],
            tags: vec!["coffee".into(), "subscription".into()],
            follow_up_questions: vec!["How do you pick roasters?".into()],
            burning_problems: vec!["Retaining subscribers after month three".into()],
        }
    }

    // ── Tier 1 ───────────────────────────────────────────────────────────

    #[test]
    fn valid_json_round_trips_field_for_field() {
        let (record, tier) = normalize_response(FULL);
        assert_eq!(tier, ParseTier::Parsed);
        assert_eq!(record, brewbox());
    }

    #[test]
    fn surrounding_whitespace_still_parsed_tier() {
        let (_, tier) = normalize_response(&format!("\n\n  {FULL}  \n"));
        assert_eq!(tier, ParseTier::Parsed);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let (record, tier) = normalize_response(r#"{"title":"X"}"#);
        assert_eq!(tier, ParseTier::Parsed);
        assert_eq!(record.title, "X");
        assert!(record.description.is_empty());
        assert!(record.tags.is_empty());
        assert!(record.burning_problems.is_empty());
    }

    #[test]
    fn extra_fields_are_ignored() {
        let (record, _) = normalize_response(r#"{"title":"X","confidence":0.9,"notes":{"a":1}}"#);
        assert_eq!(record.title, "X");
    }

    #[test]
    fn audience_list_is_joined() {
        let (record, _) = normalize_response(r#"{"audience":["CFOs","Controllers"]}"#);
        assert_eq!(record.audience, "CFOs, Controllers");
    }

    #[test]
    fn single_string_list_field_is_wrapped() {
        let (record, _) = normalize_response(r#"{"tags":"coffee"}"#);
        assert_eq!(record.tags, vec!["coffee".to_string()]);
    }

    #[test]
    fn non_string_list_items_are_stringified_and_nulls_dropped() {
        let (record, _) = normalize_response(r#"{"tags":["b2c", 3, null, true, {"x":1}]}"#);
        assert_eq!(record.tags, vec!["b2c", "3", "true"]);
    }

    // ── Tier 2 ───────────────────────────────────────────────────────────

    #[test]
    fn embedded_object_is_extracted() {
        let response = r#"Here is the result: {"title":"X", "tags":["a"]} Thanks!"#;
        let (record, tier) = normalize_response(response);
        assert_eq!(tier, ParseTier::ExtractedSubset);
        assert_eq!(record.title, "X");
        assert_eq!(record.tags, vec!["a".to_string()]);
    }

    #[test]
    fn markdown_fence_is_stripped() {
        let response = format!("```json\n{FULL}\n```");
        let (record, tier) = normalize_response(&response);
        assert_eq!(tier, ParseTier::ExtractedSubset);
        assert_eq!(record, brewbox());
    }

    #[test]
    fn extraction_uses_maximal_span() {
        // A minimal span would stop at the first inner `}`.
        let response = r#"Result: {"title":"X","meta":{"k":"v"},"tags":["t"]} done"#;
        let (record, tier) = normalize_response(response);
        assert_eq!(tier, ParseTier::ExtractedSubset);
        assert_eq!(record.tags, vec!["t".to_string()]);
    }

    // ── Tier 3 ───────────────────────────────────────────────────────────

    #[test]
    fn plain_prose_falls_back() {
        let (record, tier) = normalize_response("I'm sorry, I can't analyze this deck.");
        assert_eq!(tier, ParseTier::Fallback);
        assert_eq!(record, InsightRecord::fallback());
    }

    #[test]
    fn empty_response_falls_back() {
        let (record, tier) = normalize_response("");
        assert_eq!(tier, ParseTier::Fallback);
        assert_eq!(record.title, "Product Analysis");
    }

    #[test]
    fn truncated_json_falls_back() {
        let (_, tier) = normalize_response(r#"{"title":"X","tags":["a","#);
        assert_eq!(tier, ParseTier::Fallback);
    }

    #[test]
    fn two_separate_objects_fall_back() {
        // The maximal span covers both objects and is not valid JSON.
        let (_, tier) = normalize_response(r#"{"title":"A"} and {"title":"B"}"#);
        assert_eq!(tier, ParseTier::Fallback);
    }

    #[test]
    fn bare_json_array_is_not_a_record() {
        let (_, tier) = normalize_response(r#"["title", "X"]"#);
        assert_eq!(tier, ParseTier::Fallback);
    }
}
