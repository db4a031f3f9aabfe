//! Confidence scoring.
//!
//! `final = clamp(prior(pattern) + context + metadata + validation, 0, 1)`
//! where the context modifier is itself clamped to the configured bounds.
//! Every score carries its additive breakdown and the raw validation result.

pub mod context;
pub mod metadata;
pub mod prioritize;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ConfidenceConfig;
use crate::core::{Candidate, ConfidenceBreakdown, ValidationResult};
use crate::source::SourceText;
use crate::validation::DirectiveValidator;

pub use context::{analyze_context, ContextAnalysis};
pub use metadata::{analyze_metadata, MetadataAnalysis};
pub use prioritize::{prioritize, PrioritySelection};

/// Aggregate statistics from a confidence filtering pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceStats {
    pub total: usize,
    pub retained: usize,
    pub removed: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub high_confidence: usize,
}

impl ConfidenceStats {
    fn from_scores(scores: &[f64], retained: usize, high_threshold: f64) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        Self {
            total: scores.len(),
            retained,
            removed: scores.len() - retained,
            average: scores.iter().sum::<f64>() / scores.len() as f64,
            min: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            high_confidence: scores.iter().filter(|&&s| s >= high_threshold).count(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfidenceFilterOutcome {
    /// Retained candidates, confidence descending
    pub candidates: Vec<Candidate>,
    pub stats: ConfidenceStats,
}

/// Candidate counts per confidence tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceDistribution {
    pub very_high: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub very_low: usize,
}

impl ConfidenceDistribution {
    pub fn from_candidates(candidates: &[Candidate]) -> Self {
        let mut distribution = Self::default();
        for candidate in candidates {
            match candidate.confidence {
                c if c >= 0.9 => distribution.very_high += 1,
                c if c >= 0.75 => distribution.high += 1,
                c if c >= 0.6 => distribution.medium += 1,
                c if c >= 0.4 => distribution.low += 1,
                _ => distribution.very_low += 1,
            }
        }
        distribution
    }

    pub fn total(&self) -> usize {
        self.very_high + self.high + self.medium + self.low + self.very_low
    }
}

pub struct ConfidenceScorer {
    config: ConfidenceConfig,
    validator: Arc<dyn DirectiveValidator>,
}

impl ConfidenceScorer {
    pub fn new(config: ConfidenceConfig, validator: Arc<dyn DirectiveValidator>) -> Self {
        Self { config, validator }
    }

    pub fn config(&self) -> &ConfidenceConfig {
        &self.config
    }

    pub fn validator(&self) -> &Arc<dyn DirectiveValidator> {
        &self.validator
    }

    fn validate_directive(&self, candidate: &Candidate) -> ValidationResult {
        if candidate.suggested_directive.trim().is_empty() {
            return ValidationResult::unknown("no directive proposed");
        }
        let directive = candidate
            .directive()
            .unwrap_or_else(|| candidate.suggested_directive.trim());
        self.validator.validate(directive, candidate.pattern_type)
    }

    /// Scores one candidate against optional surrounding text
    pub fn score(&self, candidate: &Candidate, context: Option<&str>) -> ConfidenceBreakdown {
        let base = self.config.priors.prior(candidate.pattern_type);
        let context_analysis = context
            .map(|text| analyze_context(text, &self.config))
            .unwrap_or_default();
        let metadata = analyze_metadata(candidate, &self.config.metadata);
        let validation = self.validate_directive(candidate);

        let raw = base + context_analysis.modifier + metadata.modifier + validation.confidence_delta;
        let final_score = raw.clamp(0.0, 1.0);

        debug!(
            file = %candidate.file.display(),
            line = candidate.line,
            base,
            context = context_analysis.modifier,
            metadata = metadata.modifier,
            validation = validation.confidence_delta,
            final_score,
            "Scored candidate"
        );

        ConfidenceBreakdown {
            base,
            context_modifier: context_analysis.modifier,
            metadata_modifier: metadata.modifier,
            validation_delta: validation.confidence_delta,
            final_score,
            risk_factors: context_analysis.risk_factors,
            boost_factors: context_analysis.boost_factors,
            validation,
        }
    }

    /// Scores a candidate using the configured context window around its line
    pub fn score_in_source(&self, candidate: &Candidate, source: &SourceText) -> ConfidenceBreakdown {
        let context = source.context(candidate.line, self.config.context_lines);
        self.score(candidate, Some(&context))
    }

    /// Scores every candidate in place, recording confidence and breakdown
    pub fn score_all(&self, candidates: &mut [Candidate], source: Option<&SourceText>) {
        for candidate in candidates.iter_mut() {
            let breakdown = match source {
                Some(source) => self.score_in_source(candidate, source),
                None => self.score(candidate, None),
            };
            candidate.confidence = breakdown.final_score;
            candidate.breakdown = Some(breakdown);
        }
    }

    /// Scores all candidates and keeps those at or above the minimum threshold
    pub fn filter_by_confidence(
        &self,
        mut candidates: Vec<Candidate>,
        source: Option<&SourceText>,
    ) -> ConfidenceFilterOutcome {
        self.score_all(&mut candidates, source);
        let scores: Vec<f64> = candidates.iter().map(|c| c.confidence).collect();

        let threshold = self.config.min_threshold;
        let mut retained: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| c.confidence >= threshold)
            .collect();
        retained.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let stats = ConfidenceStats::from_scores(&scores, retained.len(), self.config.high_threshold);
        info!(
            total = stats.total,
            retained = stats.retained,
            average = stats.average,
            "Confidence filtering complete"
        );

        ConfidenceFilterOutcome {
            candidates: retained,
            stats,
        }
    }
}
