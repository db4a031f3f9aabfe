//! Directive compliance checking.
//!
//! A proposed directive is matched, first hit wins, against:
//! 1. the reference corpus by exact normalized text within the candidate's
//!    pattern family (`verified`),
//! 2. the reference corpus by token-set similarity (`similar`),
//! 3. the directive syntax table (`compliant` / `non_compliant`).
//!
//! The validator is chosen once at startup from configuration and handed out
//! as `Arc<dyn DirectiveValidator>`.

pub mod corpus;
pub mod similarity;
pub mod syntax;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{ValidationConfig, ValidationMode};
use crate::core::{PatternType, ValidationResult, ValidationStatus};

pub use corpus::{PatternCategory, PatternFamily, ReferenceCorpus, ReferencePattern};

pub const VERIFIED_DELTA: f64 = 0.30;
pub const SIMILAR_DELTA: f64 = 0.15;
pub const COMPLIANT_DELTA: f64 = 0.10;
pub const UNKNOWN_DELTA: f64 = 0.0;
pub const NON_COMPLIANT_DELTA: f64 = -0.15;
pub const EMPTY_DIRECTIVE_DELTA: f64 = -0.20;

static DIRECTIVE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*#\s*pragma\s+omp\b\s*").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strips the `#pragma omp` prefix, collapses whitespace and lower-cases.
pub fn normalize_directive(directive: &str) -> String {
    let stripped = DIRECTIVE_PREFIX.replace(directive, "");
    WHITESPACE
        .replace_all(stripped.trim(), " ")
        .to_lowercase()
}

/// Capability interface for directive checking
pub trait DirectiveValidator: Send + Sync {
    fn validate(&self, directive: &str, pattern: PatternType) -> ValidationResult;

    fn mode(&self) -> ValidationMode;

    fn statistics(&self) -> ValidatorStatistics {
        ValidatorStatistics::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatorStatistics {
    pub total_patterns: usize,
    pub by_category: BTreeMap<PatternCategory, usize>,
    pub source_files: usize,
    pub corpus_root: Option<PathBuf>,
    pub corpus_available: bool,
}

/// Builds the validator named by configuration. A configured corpus that
/// cannot be loaded degrades to syntax-only checking.
pub fn select_validator(config: &ValidationConfig) -> Arc<dyn DirectiveValidator> {
    match config.mode {
        ValidationMode::Disabled => {
            info!("Directive validation disabled");
            Arc::new(DisabledValidator)
        }
        ValidationMode::SyntaxOnly => Arc::new(ComplianceValidator::syntax_only()),
        ValidationMode::Full => {
            let Some(path) = config.corpus_path.as_deref() else {
                info!("No reference corpus configured, using syntax-only validation");
                return Arc::new(ComplianceValidator::syntax_only());
            };
            match ReferenceCorpus::load(path, config.corpus_context_lines) {
                Ok(corpus) => Arc::new(
                    ComplianceValidator::with_corpus(corpus)
                        .with_similarity_threshold(config.similarity_threshold),
                ),
                Err(e) => {
                    warn!("{}. Falling back to syntax-only validation", e);
                    Arc::new(ComplianceValidator::syntax_only())
                }
            }
        }
    }
}

/// Validator that never has an opinion
#[derive(Debug, Default)]
pub struct DisabledValidator;

impl DirectiveValidator for DisabledValidator {
    fn validate(&self, _directive: &str, _pattern: PatternType) -> ValidationResult {
        ValidationResult::unknown("validation disabled")
    }

    fn mode(&self) -> ValidationMode {
        ValidationMode::Disabled
    }
}

#[derive(Debug)]
pub struct ComplianceValidator {
    corpus: Option<ReferenceCorpus>,
    similarity_threshold: f64,
}

struct SimilarMatch<'a> {
    pattern: &'a ReferencePattern,
    score: f64,
}

impl ComplianceValidator {
    pub fn syntax_only() -> Self {
        Self {
            corpus: None,
            similarity_threshold: ValidationConfig::default().similarity_threshold,
        }
    }

    pub fn with_corpus(corpus: ReferenceCorpus) -> Self {
        Self {
            corpus: Some(corpus),
            ..Self::syntax_only()
        }
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn corpus(&self) -> Option<&ReferenceCorpus> {
        self.corpus.as_ref()
    }

    /// Reference examples filed under `category`
    pub fn reference_examples(&self, category: PatternCategory) -> Vec<&ReferencePattern> {
        self.corpus
            .as_ref()
            .map(|c| c.examples(category))
            .unwrap_or_default()
    }

    /// Directive recommendations for `category`, most common first
    pub fn recommendations(&self, category: PatternCategory) -> Vec<String> {
        self.corpus
            .as_ref()
            .map(|c| c.recommendations(category))
            .unwrap_or_default()
    }

    fn find_exact<'a>(
        corpus: &'a ReferenceCorpus,
        normalized: &str,
        hint: Option<PatternFamily>,
    ) -> Option<&'a ReferencePattern> {
        corpus.patterns().iter().find(|p| {
            p.normalized == normalized && hint.is_none_or(|family| p.family() == family)
        })
    }

    fn find_similar<'a>(
        &self,
        corpus: &'a ReferenceCorpus,
        normalized: &str,
        hint: Option<PatternFamily>,
    ) -> Option<SimilarMatch<'a>> {
        let mut best: Option<SimilarMatch<'a>> = None;
        for pattern in corpus.patterns() {
            let score = similarity::directive_similarity(normalized, &pattern.normalized)
                + similarity::family_boost(hint, pattern.family())
                + similarity::loop_shaped_boost(normalized, &pattern.normalized);

            let better = best.as_ref().is_none_or(|b| score > b.score);
            if score >= self.similarity_threshold && better {
                best = Some(SimilarMatch { pattern, score });
            }
        }
        best
    }
}

impl DirectiveValidator for ComplianceValidator {
    fn validate(&self, directive: &str, pattern: PatternType) -> ValidationResult {
        if directive.trim().is_empty() {
            return ValidationResult {
                status: ValidationStatus::NonCompliant,
                confidence_delta: EMPTY_DIRECTIVE_DELTA,
                reference: None,
                similarity: 0.0,
                notes: vec!["empty pragma".to_string()],
            };
        }

        let normalized = normalize_directive(directive);
        let hint = PatternFamily::from_pattern(pattern);

        if let Some(corpus) = self.corpus.as_ref().filter(|_| !normalized.is_empty()) {
            if let Some(reference) = Self::find_exact(corpus, &normalized, hint) {
                debug!(directive = %normalized, source = %reference.source_file, "Verified directive");
                return ValidationResult {
                    status: ValidationStatus::Verified,
                    confidence_delta: VERIFIED_DELTA,
                    reference: Some(reference.source_file.clone()),
                    similarity: 1.0,
                    notes: vec![format!("Exact match found in {}", reference.source_file)],
                };
            }

            if let Some(found) = self.find_similar(corpus, &normalized, hint) {
                let similarity = found.score.min(1.0);
                return ValidationResult {
                    status: ValidationStatus::Similar,
                    confidence_delta: SIMILAR_DELTA,
                    reference: Some(found.pattern.source_file.clone()),
                    similarity,
                    notes: vec![format!(
                        "Similar pattern found in {} (similarity: {:.2})",
                        found.pattern.source_file, similarity
                    )],
                };
            }
        }

        let verdict = syntax::check(&normalized);
        let (status, confidence_delta) = if verdict.is_valid() {
            (ValidationStatus::Compliant, COMPLIANT_DELTA)
        } else {
            (ValidationStatus::NonCompliant, NON_COMPLIANT_DELTA)
        };
        ValidationResult {
            status,
            confidence_delta,
            reference: None,
            similarity: 0.0,
            notes: verdict.into_notes(),
        }
    }

    fn mode(&self) -> ValidationMode {
        if self.corpus.is_some() {
            ValidationMode::Full
        } else {
            ValidationMode::SyntaxOnly
        }
    }

    fn statistics(&self) -> ValidatorStatistics {
        match &self.corpus {
            Some(corpus) => ValidatorStatistics {
                total_patterns: corpus.patterns().len(),
                by_category: corpus.counts_by_category(),
                source_files: corpus.source_file_count(),
                corpus_root: Some(corpus.root().to_path_buf()),
                corpus_available: true,
            },
            None => ValidatorStatistics::default(),
        }
    }
}
