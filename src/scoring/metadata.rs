//! Adjustments derived from candidate provenance rather than code text.

use serde::{Deserialize, Serialize};

use crate::config::MetadataWeights;
use crate::core::Candidate;

const POSITIVE_REASON_KEYWORDS: &[&str] = &[
    "no dependencies",
    "simple",
    "independent",
    "embarrassing",
    "vectorizable",
    "reduction",
    "parallel",
];

const NEGATIVE_REASON_KEYWORDS: &[&str] = &[
    "complex",
    "dependencies",
    "side effects",
    "unclear",
    "potential",
    "risky",
    "needs verification",
];

const UNINFORMATIVE_FUNCTIONS: &[&str] = &["", "main", "unknown"];
const COMPUTE_FUNCTION_WORDS: &[&str] = &["compute", "process", "calculate", "transform"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataAnalysis {
    pub modifier: f64,
    pub factors: Vec<String>,
}

/// Scores hotspot membership, the detector's reason text and the enclosing
/// function name. Each keyword list contributes at most once.
pub fn analyze_metadata(candidate: &Candidate, weights: &MetadataWeights) -> MetadataAnalysis {
    let mut analysis = MetadataAnalysis::default();

    if candidate.hotspot_priority {
        analysis.modifier += weights.hotspot_bonus;
        analysis.factors.push("hotspot".to_string());
    }

    let reason = candidate.reason.to_lowercase();
    if let Some(keyword) = POSITIVE_REASON_KEYWORDS.iter().find(|k| reason.contains(*k)) {
        analysis.modifier += weights.positive_reason_bonus;
        analysis.factors.push(format!("reason:+{}", keyword));
    }
    if let Some(keyword) = NEGATIVE_REASON_KEYWORDS.iter().find(|k| reason.contains(*k)) {
        analysis.modifier -= weights.negative_reason_penalty;
        analysis.factors.push(format!("reason:-{}", keyword));
    }

    let function = candidate.function.trim().to_lowercase();
    if UNINFORMATIVE_FUNCTIONS.contains(&function.as_str()) {
        analysis.modifier -= weights.function_name_adjustment;
        analysis.factors.push("function:uninformative".to_string());
    } else if COMPUTE_FUNCTION_WORDS.iter().any(|w| function.contains(w)) {
        analysis.modifier += weights.function_name_adjustment;
        analysis.factors.push("function:compute".to_string());
    }

    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PatternType;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_hotspot_compute_function_with_positive_reason() {
        let mut candidate = Candidate::new("k.c", 10, "compute_forces", PatternType::Vectorizable)
            .with_reason("Simple loop with independent iterations");
        candidate.hotspot_priority = true;
        let analysis = analyze_metadata(&candidate, &MetadataWeights::default());
        assert!(approx(analysis.modifier, 0.1 + 0.05 + 0.05));
        assert_eq!(analysis.factors.len(), 3);
    }

    #[test]
    fn test_negative_reason_and_main() {
        let candidate = Candidate::new("k.c", 10, "main", PatternType::Risky)
            .with_reason("Possible side effects in body");
        let analysis = analyze_metadata(&candidate, &MetadataWeights::default());
        assert!(approx(analysis.modifier, -0.08 - 0.05));
    }

    #[test]
    fn test_reason_with_both_polarities() {
        // "no dependencies" is positive; "dependencies" also matches negative
        let candidate = Candidate::new("k.c", 10, "helper", PatternType::SimpleLoop)
            .with_reason("no dependencies");
        let analysis = analyze_metadata(&candidate, &MetadataWeights::default());
        assert!(approx(analysis.modifier, 0.05 - 0.08));
    }

    #[test]
    fn test_neutral_metadata() {
        let candidate = Candidate::new("k.c", 10, "helper", PatternType::SimpleLoop);
        let analysis = analyze_metadata(&candidate, &MetadataWeights::default());
        assert!(approx(analysis.modifier, 0.0));
        assert!(analysis.factors.is_empty());
    }
}
