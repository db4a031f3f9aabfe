//! Parsing of classifier responses.
//!
//! The service answers with free text that should contain one JSON object
//! keyed `candidate_1 .. candidate_N`. Reasoning blocks wrapped in
//! `<think>` tags are stripped first. Anything that cannot be read for an
//! item becomes the deterministic fallback verdict.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::CollaboratorError;
use crate::core::{Classification, ClassifierVerdict, IssueType, VerdictSource};

static THINK_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

const INCOMPLETE_REASONING: &str = "AI analysis incomplete";

/// Verdicts for a batch, positionally aligned with the request
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub verdicts: Vec<ClassifierVerdict>,
    /// Items that were back-filled with the fallback verdict
    pub fallbacks: usize,
}

impl ParsedResponse {
    pub fn all_fallback(expected: usize) -> Self {
        Self {
            verdicts: vec![ClassifierVerdict::fallback(); expected],
            fallbacks: expected,
        }
    }
}

/// First balanced `{ ... }` region, ignoring braces inside string literals
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn verdict_from_item(item: &Map<String, Value>) -> ClassifierVerdict {
    let classification = item
        .get("classification")
        .and_then(Value::as_str)
        .map(Classification::parse_label)
        .unwrap_or(Classification::RequiresRuntimeCheck);
    let issue_type = item
        .get("logic_issue_type")
        .or_else(|| item.get("issue_type"))
        .and_then(Value::as_str)
        .map(IssueType::parse)
        .unwrap_or_default();

    ClassifierVerdict {
        classification,
        reasoning: item
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or(INCOMPLETE_REASONING)
            .to_string(),
        confidence: item
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(ClassifierVerdict::FALLBACK_CONFIDENCE)
            .clamp(0.0, 1.0),
        transformations: string_list(item.get("transformations")),
        tests_recommended: string_list(item.get("tests_recommended")),
        issue_type,
        source: VerdictSource::Classifier,
    }
}

/// Reads the response document. Fails only when no JSON object can be found
/// at all; missing or malformed items are back-filled.
pub fn parse_response_document(
    text: &str,
    expected: usize,
) -> Result<ParsedResponse, CollaboratorError> {
    let cleaned = THINK_BLOCK.replace_all(text.trim(), "");
    let json = extract_json_object(cleaned.trim())
        .ok_or_else(|| CollaboratorError::Malformed("no JSON object in response".to_string()))?;
    let document: Map<String, Value> = serde_json::from_str(json)
        .map_err(|e| CollaboratorError::Malformed(e.to_string()))?;

    let mut fallbacks = 0;
    let verdicts = (1..=expected)
        .map(|i| match document.get(&format!("candidate_{}", i)).and_then(Value::as_object) {
            Some(item) => verdict_from_item(item),
            None => {
                debug!("Classifier response missing candidate_{}", i);
                fallbacks += 1;
                ClassifierVerdict::fallback()
            }
        })
        .collect();

    Ok(ParsedResponse {
        verdicts,
        fallbacks,
    })
}

/// Parses a response, degrading to all-fallback when the document is
/// unreadable. Always returns exactly `expected` verdicts.
pub fn parse_classifier_response(text: &str, expected: usize) -> ParsedResponse {
    match parse_response_document(text, expected) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Classifier response unusable: {}", e);
            ParsedResponse::all_fallback(expected)
        }
    }
}
