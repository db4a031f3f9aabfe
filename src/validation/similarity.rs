//! Token-set similarity between normalized directives.

use std::collections::HashSet;

use super::corpus::PatternFamily;
use super::syntax::clause_name;

/// Token sets treated as equivalent loop constructs, checked in both directions
const LOOP_EQUIVALENTS: &[(&[&str], &[&str])] = &[
    (&["parallel", "for"], &["parallel", "for"]),
    (&["simd"], &["parallel", "for", "simd"]),
    (&["for"], &["parallel", "for"]),
];

const EQUIVALENCE_BOOST: f64 = 0.2;
const SHARED_CLAUSE_BOOST: f64 = 0.05;
const SHARED_CLAUSES: &[&str] = &["private", "reduction", "schedule", "collapse"];

const SAME_FAMILY_BOOST: f64 = 0.15;
const COMPATIBLE_FAMILY_BOOST: f64 = 0.10;
const LOOP_SHAPED_BOOST: f64 = 0.05;
const LOOP_KEYWORDS: &[&str] = &["parallel for", "simd", "parallel", "for"];

/// Jaccard similarity of the token sets plus equivalence and shared-clause
/// boosts, capped at 1.0.
pub fn directive_similarity(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();

    let union = tokens_a.union(&tokens_b).count();
    let base = if union == 0 {
        0.0
    } else {
        tokens_a.intersection(&tokens_b).count() as f64 / union as f64
    };

    let has_all = |set: &HashSet<&str>, wanted: &[&str]| wanted.iter().all(|t| set.contains(t));
    let equivalent = LOOP_EQUIVALENTS.iter().any(|(left, right)| {
        (has_all(&tokens_a, left) && has_all(&tokens_b, right))
            || (has_all(&tokens_b, left) && has_all(&tokens_a, right))
    });
    let mut boost = if equivalent { EQUIVALENCE_BOOST } else { 0.0 };

    let names_a: HashSet<&str> = tokens_a.iter().map(|t| clause_name(t)).collect();
    let names_b: HashSet<&str> = tokens_b.iter().map(|t| clause_name(t)).collect();
    boost += SHARED_CLAUSES
        .iter()
        .filter(|c| names_a.contains(*c) && names_b.contains(*c))
        .count() as f64
        * SHARED_CLAUSE_BOOST;

    (base + boost).min(1.0)
}

/// Boost for the relationship between the candidate's family and a
/// reference pattern's family
pub fn family_boost(hint: Option<PatternFamily>, reference: PatternFamily) -> f64 {
    match hint {
        Some(family) if family == reference => SAME_FAMILY_BOOST,
        Some(family) if family.is_loop() && reference.is_loop() => COMPATIBLE_FAMILY_BOOST,
        _ => 0.0,
    }
}

pub fn loop_shaped_boost(a: &str, b: &str) -> f64 {
    let loop_shaped = |s: &str| LOOP_KEYWORDS.iter().any(|k| s.contains(k));
    if loop_shaped(a) && loop_shaped(b) {
        LOOP_SHAPED_BOOST
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identical_directives() {
        assert!(approx(directive_similarity("parallel for", "parallel for"), 1.0));
    }

    #[test]
    fn test_bare_for_is_compatible_with_parallel_for() {
        // jaccard 1/2 plus equivalence boost
        assert!(approx(directive_similarity("for", "parallel for"), 0.7));
    }

    #[test]
    fn test_shared_clause_boost_uses_clause_names() {
        let score = directive_similarity("simd private(i)", "task private(j)");
        // tokens share nothing, clause names share `private`
        assert!(approx(score, 0.05));
    }

    #[test]
    fn test_disjoint_directives() {
        assert!(approx(directive_similarity("task", "sections"), 0.0));
        assert!(approx(directive_similarity("", ""), 0.0));
    }

    #[test]
    fn test_family_boosts() {
        assert!(approx(
            family_boost(Some(PatternFamily::LoopParallel), PatternFamily::LoopParallel),
            0.15
        ));
        assert!(approx(
            family_boost(Some(PatternFamily::LoopVectorizable), PatternFamily::LoopParallel),
            0.10
        ));
        assert!(approx(
            family_boost(Some(PatternFamily::Reduction), PatternFamily::LoopParallel),
            0.0
        ));
        assert!(approx(family_boost(None, PatternFamily::Reduction), 0.0));
    }

    #[test]
    fn test_loop_shaped_boost() {
        assert!(approx(loop_shaped_boost("parallel for", "simd"), 0.05));
        assert!(approx(loop_shaped_boost("task", "simd"), 0.0));
    }
}
