//! The FINALIZE phase: combined confidence and final ordering.

use crate::core::{Candidate, Classification, PatternType};

const BASE_CONFIDENCE: f64 = 0.5;
const VERDICT_WEIGHT: f64 = 0.3;

fn type_adjustment(pattern: PatternType) -> f64 {
    match pattern {
        PatternType::Vectorizable | PatternType::EmbarrassinglyParallel => 0.2,
        PatternType::SimpleLoop => 0.1,
        PatternType::Risky => -0.2,
        PatternType::Reduction | PatternType::Unknown => 0.0,
    }
}

fn classification_boost(label: Option<Classification>) -> f64 {
    match label {
        Some(Classification::SafeParallel) => 0.3,
        Some(Classification::RequiresRuntimeCheck) | None => 0.0,
        Some(Classification::NotParallel) | Some(Classification::LogicIssue) => -0.4,
    }
}

/// Blend of the detector-type prior and the classifier or consensus output.
///
/// Candidates without a verdict use their scored confidence in its place.
pub fn combined_confidence(candidate: &Candidate) -> f64 {
    let verdict_confidence = candidate
        .verdict
        .as_ref()
        .map_or(candidate.confidence, |v| v.confidence);
    let base = BASE_CONFIDENCE + type_adjustment(candidate.pattern_type);
    let raw = (base + classification_boost(candidate.classification)
        + verdict_confidence * VERDICT_WEIGHT)
        / 2.0;
    raw.clamp(0.0, 1.0)
}

/// Attaches combined confidence, drops candidates below `min_confidence` and
/// orders the rest by combined confidence descending, then line.
pub fn finalize(candidates: Vec<Candidate>, min_confidence: f64) -> Vec<Candidate> {
    let mut finished: Vec<Candidate> = candidates
        .into_iter()
        .map(|mut candidate| {
            candidate.combined_confidence = Some(combined_confidence(&candidate));
            candidate
        })
        .filter(|c| c.combined_confidence.unwrap_or_default() >= min_confidence)
        .collect();

    finished.sort_by(|a, b| {
        b.combined_confidence
            .unwrap_or_default()
            .total_cmp(&a.combined_confidence.unwrap_or_default())
            .then(a.line.cmp(&b.line))
    });
    finished
}
