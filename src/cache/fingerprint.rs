//! Structural fingerprints of code snippets.
//!
//! A fingerprint summarises loop shape, indexing, operations and data types
//! so that structurally equivalent loops share classifier results even when
//! identifiers differ.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

use crate::config::SimilarityWeights;
use crate::core::PatternType;
use crate::source::call_count;

static FOR_LOOP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfor\s*\(").unwrap());
static WHILE_LOOP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bwhile\s*\(").unwrap());
static DO_LOOP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bdo\s*\{").unwrap());

static INDEXED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+\[\s*\w+\s*\]").unwrap());
static MULTI_INDEXED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w+\[\s*\w+\s*\]\s*\[\s*\w+\s*\]").unwrap());
static COMPUTED_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w+\[\s*\w+\s*[+\-*/]\s*\w*\s*\]").unwrap());

static SEQUENTIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+\[\s*[ijk]\s*\]").unwrap());
static STRIDED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+\[\s*[ijk]\s*\*\s*\d+\s*\]").unwrap());
static INDIRECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+\[\s*\w+\[\s*[ijk]\s*\]\s*\]").unwrap());

static CONTROL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:if|else|switch|case)\b").unwrap());
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Za-z_]\w*\b").unwrap());

static OPERATION_CLASSES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("arithmetic", r"[+\-]"),
        ("multiplication", r"[*/]"),
        ("bitwise", r"[&|^~]"),
        ("comparison", r"[<>=!]"),
        ("assignment", r"="),
        ("mathematical", r"\b(?:sin|cos|sqrt|log|exp|pow)\b"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).unwrap()))
    .collect()
});

static DATA_TYPES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    ["int", "float", "double", "char", "long", "short"]
        .into_iter()
        .map(|name| (name, Regex::new(&format!(r"\b{}\b", name)).unwrap()))
        .collect()
});

const NON_VARIABLES: &[&str] = &["for", "while", "if", "else", "int", "float", "double", "return"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopType {
    For,
    While,
    DoWhile,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPattern {
    None,
    Simple,
    Complex,
    MultiDimensional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPattern {
    Sequential,
    Strided,
    Indirect,
    Unknown,
}

/// Similarity index bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    pub loop_type: LoopType,
    pub access_pattern: AccessPattern,
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}_{:?}", self.loop_type, self.access_pattern)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralFingerprint {
    pub loop_type: LoopType,
    pub access_pattern: AccessPattern,
    pub operations: BTreeSet<String>,
    pub variable_count: usize,
    pub nesting_depth: usize,
    pub has_function_calls: bool,
    pub has_control_flow: bool,
    pub memory_pattern: MemoryPattern,
    pub data_types: BTreeSet<String>,
    pub pattern_type: PatternType,
}

impl StructuralFingerprint {
    pub fn extract(snippet: &str, pattern_type: PatternType) -> Self {
        Self {
            loop_type: loop_type(snippet),
            access_pattern: access_pattern(snippet),
            operations: OPERATION_CLASSES
                .iter()
                .filter(|(_, re)| re.is_match(snippet))
                .map(|(name, _)| name.to_string())
                .collect(),
            variable_count: variable_count(snippet),
            nesting_depth: nesting_depth(snippet),
            has_function_calls: call_count(snippet) > 0,
            has_control_flow: CONTROL.is_match(snippet),
            memory_pattern: memory_pattern(snippet),
            data_types: DATA_TYPES
                .iter()
                .filter(|(_, re)| re.is_match(snippet))
                .map(|(name, _)| name.to_string())
                .collect(),
            pattern_type,
        }
    }

    /// SHA-256 of the canonical JSON form, hex encoded
    pub fn hash(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        format!("{:x}", hasher.finalize())
    }

    pub fn bucket(&self) -> BucketKey {
        BucketKey {
            loop_type: self.loop_type,
            access_pattern: self.access_pattern,
        }
    }

    /// Weighted agreement over the category-level fields, normalized by the
    /// total weight. Fingerprints for different pattern types never match.
    pub fn similarity(&self, other: &Self, weights: &SimilarityWeights) -> f64 {
        if self.pattern_type != other.pattern_type {
            return 0.0;
        }
        let total = weights.total();
        if total <= 0.0 {
            return 0.0;
        }

        let agree = |same: bool, weight: f64| if same { weight } else { 0.0 };
        let score = agree(self.loop_type == other.loop_type, weights.loop_type)
            + agree(self.access_pattern == other.access_pattern, weights.access_pattern)
            + jaccard(&self.operations, &other.operations) * weights.operations
            + agree(
                self.has_function_calls == other.has_function_calls,
                weights.function_calls,
            )
            + agree(self.has_control_flow == other.has_control_flow, weights.control_flow)
            + agree(self.memory_pattern == other.memory_pattern, weights.memory_pattern);

        score / total
    }
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn loop_type(snippet: &str) -> LoopType {
    if FOR_LOOP.is_match(snippet) {
        LoopType::For
    } else if WHILE_LOOP.is_match(snippet) {
        LoopType::While
    } else if DO_LOOP.is_match(snippet) {
        LoopType::DoWhile
    } else {
        LoopType::Unknown
    }
}

fn access_pattern(snippet: &str) -> AccessPattern {
    if !INDEXED.is_match(snippet) && !COMPUTED_INDEX.is_match(snippet) {
        AccessPattern::None
    } else if MULTI_INDEXED.is_match(snippet) {
        AccessPattern::MultiDimensional
    } else if COMPUTED_INDEX.is_match(snippet) {
        AccessPattern::Complex
    } else {
        AccessPattern::Simple
    }
}

fn memory_pattern(snippet: &str) -> MemoryPattern {
    if INDIRECT.is_match(snippet) {
        MemoryPattern::Indirect
    } else if STRIDED.is_match(snippet) {
        MemoryPattern::Strided
    } else if SEQUENTIAL.is_match(snippet) {
        MemoryPattern::Sequential
    } else {
        MemoryPattern::Unknown
    }
}

fn variable_count(snippet: &str) -> usize {
    IDENTIFIER
        .find_iter(snippet)
        .map(|m| m.as_str())
        .filter(|name| !NON_VARIABLES.contains(name))
        .collect::<BTreeSet<_>>()
        .len()
}

fn nesting_depth(snippet: &str) -> usize {
    let mut depth: usize = 0;
    let mut max_depth = 0;
    for ch in snippet.chars() {
        match ch {
            '{' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max_depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VECTOR_ADD: &str = "for (int i = 0; i < n; i++) { c[i] = a[i] + b[i]; }";

    #[test]
    fn test_extract_vector_add() {
        let fp = StructuralFingerprint::extract(VECTOR_ADD, PatternType::Vectorizable);
        assert_eq!(fp.loop_type, LoopType::For);
        assert_eq!(fp.access_pattern, AccessPattern::Simple);
        assert_eq!(fp.memory_pattern, MemoryPattern::Sequential);
        assert_eq!(fp.nesting_depth, 1);
        assert!(!fp.has_function_calls);
        assert!(!fp.has_control_flow);
        assert!(fp.operations.contains("arithmetic"));
        assert!(fp.operations.contains("assignment"));
        assert_eq!(fp.data_types, BTreeSet::from(["int".to_string()]));
        // i, n, c, a, b
        assert_eq!(fp.variable_count, 5);
    }

    #[test]
    fn test_access_and_memory_classes() {
        let matrix = StructuralFingerprint::extract(
            "for (j = 0; j < m; j++) { out[i][j] = x[i][j] * 2; }",
            PatternType::SimpleLoop,
        );
        assert_eq!(matrix.access_pattern, AccessPattern::MultiDimensional);

        let shifted = StructuralFingerprint::extract(
            "while (k < n) { a[k+1] = a[k]; k++; }",
            PatternType::Risky,
        );
        assert_eq!(shifted.loop_type, LoopType::While);
        assert_eq!(shifted.access_pattern, AccessPattern::Complex);

        let gather = StructuralFingerprint::extract("y[i] = x[idx[i]];", PatternType::Risky);
        assert_eq!(gather.memory_pattern, MemoryPattern::Indirect);

        let strided = StructuralFingerprint::extract("s += v[i * 4];", PatternType::Reduction);
        assert_eq!(strided.memory_pattern, MemoryPattern::Strided);
    }

    #[test]
    fn test_hash_ignores_identifier_names() {
        let a = StructuralFingerprint::extract(VECTOR_ADD, PatternType::Vectorizable);
        let b = StructuralFingerprint::extract(
            "for (int k = 0; k < len; k++) { z[k] = x[k] + y[k]; }",
            PatternType::Vectorizable,
        );
        assert_eq!(a.hash().len(), 64);
        assert_eq!(a.hash(), b.hash());

        let c = StructuralFingerprint::extract(VECTOR_ADD, PatternType::SimpleLoop);
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_similarity_within_bucket() {
        let weights = SimilarityWeights::default();
        let a = StructuralFingerprint::extract(VECTOR_ADD, PatternType::Vectorizable);
        let b = StructuralFingerprint::extract(
            "for (int i = 0; i < m; i++) { d[i] = x[i] + y[i] + z[i]; }",
            PatternType::Vectorizable,
        );
        assert_eq!(a.bucket(), b.bucket());
        assert_ne!(a.hash(), b.hash());
        assert!((a.similarity(&b, &weights) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_requires_same_pattern_type() {
        let weights = SimilarityWeights::default();
        let a = StructuralFingerprint::extract(VECTOR_ADD, PatternType::Vectorizable);
        let b = StructuralFingerprint::extract(VECTOR_ADD, PatternType::Risky);
        assert_eq!(a.similarity(&b, &weights), 0.0);
    }

    #[test]
    fn test_control_flow_lowers_similarity() {
        let weights = SimilarityWeights::default();
        let a = StructuralFingerprint::extract(VECTOR_ADD, PatternType::Vectorizable);
        let b = StructuralFingerprint::extract(
            "for (int i = 0; i < n; i++) { if (a[i]) c[i] = a[i] + b[i]; }",
            PatternType::Vectorizable,
        );
        let score = a.similarity(&b, &weights);
        assert!(score < 1.0);
        assert!(score >= 0.85);
    }
}
