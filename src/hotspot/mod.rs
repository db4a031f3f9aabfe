//! Hotspot detection: ranks loop regions by estimated computational impact so
//! later phases concentrate on the loops worth parallelizing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::config::HotspotConfig;
use crate::core::Candidate;
use crate::source::{self, LoopSpan, SourceText};

static ARRAY_OP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+\[.*?\]").unwrap());
static ARITHMETIC_OP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[+\-*/]=?").unwrap());
static SIMPLE_INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+\[\s*\w+\s*\]").unwrap());
static COMPLEX_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w+\[\s*.*[+\-*/].*\s*\]").unwrap());
static ACCUMULATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+\s*[+\-*/]=").unwrap());
static MATRIX_ACCESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w+\[\s*\w+\s*\]\s*\[\s*\w+\s*\]").unwrap());

pub const UNKNOWN_FUNCTION: &str = "unknown";

/// Impact sub-metrics of a loop region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotMetrics {
    pub nesting_depth: usize,
    pub array_operations: usize,
    pub arithmetic_operations: usize,
    pub function_calls: usize,
    pub memory_complexity: usize,
}

/// A loop region whose impact score cleared the threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopHotspot {
    pub start_line: usize,
    pub end_line: usize,
    pub function: String,
    pub metrics: HotspotMetrics,
    pub impact_score: f64,
}

impl LoopHotspot {
    pub fn contains_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    pub fn region_size(&self) -> usize {
        self.end_line - self.start_line
    }
}

/// How hotspot filtering selected its output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotspotFilterMode {
    /// No hotspots were found; every candidate passed through
    PassThrough,
    /// Only candidates inside hotspots were kept
    Matched,
    /// Hotspots existed but matched nothing; the first few by line were kept
    Fallback,
}

#[derive(Debug, Clone)]
pub struct HotspotFilterOutcome {
    pub candidates: Vec<Candidate>,
    pub mode: HotspotFilterMode,
}

/// Aggregate view of a detection pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HotspotSummary {
    pub total_hotspots: usize,
    pub total_impact_score: f64,
    pub average_impact_score: f64,
    pub top_hotspot: Option<TopHotspot>,
    pub functions: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopHotspot {
    pub function: String,
    pub start_line: usize,
    pub end_line: usize,
    pub score: f64,
}

pub struct HotspotDetector {
    config: HotspotConfig,
}

impl Default for HotspotDetector {
    fn default() -> Self {
        Self::new(HotspotConfig::default())
    }
}

impl HotspotDetector {
    pub fn new(config: HotspotConfig) -> Self {
        Self { config }
    }

    /// Top hotspots of `source`, highest impact first.
    pub fn detect(&self, source: &str) -> Vec<LoopHotspot> {
        let text = SourceText::new(source);
        let mut hotspots: Vec<LoopHotspot> = text
            .loop_headers()
            .filter_map(|header| text.loop_span(header))
            .map(|span| self.measure_region(&text, span))
            .filter(|hotspot| {
                let keep = hotspot.impact_score >= self.config.min_impact_score;
                if keep {
                    debug!(
                        function = %hotspot.function,
                        line = hotspot.start_line,
                        score = hotspot.impact_score,
                        "Hotspot detected"
                    );
                }
                keep
            })
            .collect();

        hotspots.sort_by(|a, b| {
            b.impact_score
                .total_cmp(&a.impact_score)
                .then(a.start_line.cmp(&b.start_line))
        });
        hotspots.truncate(self.config.max_hotspots);
        hotspots
    }

    fn measure_region(&self, text: &SourceText<'_>, span: LoopSpan) -> LoopHotspot {
        let lines = text.span_lines(span.start, span.end);
        let mut metrics = measure_lines(lines);

        let content = lines.join("\n");
        if ACCUMULATION.is_match(&content) {
            metrics.array_operations += self.config.reduction_bonus;
        }
        if MATRIX_ACCESS.is_match(&content) {
            metrics.array_operations += self.config.matrix_bonus;
        }

        let region_size = span.end - span.start;
        let function = text
            .enclosing_function(span.start)
            .unwrap_or_else(|| UNKNOWN_FUNCTION.to_string());

        LoopHotspot {
            start_line: span.start,
            end_line: span.end,
            function,
            metrics,
            impact_score: self.impact_score(&metrics, region_size),
        }
    }

    /// `nesting² × 25 + arrays × 15 + arithmetic × 8 + memory × 12 + size × 2
    /// − calls × 10`, plus a flat bonus for call-free array work, floored at 0.
    pub fn impact_score(&self, metrics: &HotspotMetrics, region_size: usize) -> f64 {
        let c = &self.config;
        let nesting = metrics.nesting_depth as f64;
        let mut score = nesting * nesting * c.nesting_weight
            + metrics.array_operations as f64 * c.array_weight
            + metrics.arithmetic_operations as f64 * c.arithmetic_weight
            + metrics.memory_complexity as f64 * c.memory_weight
            + region_size as f64 * c.size_weight
            - metrics.function_calls as f64 * c.call_penalty;

        if metrics.array_operations > 0 && metrics.function_calls == 0 {
            score += c.clean_array_bonus;
        }
        score.max(0.0)
    }

    /// Keeps candidates that fall inside a hotspot. The output is always a
    /// subset of the input.
    pub fn filter_candidates(
        &self,
        candidates: Vec<Candidate>,
        hotspots: &[LoopHotspot],
    ) -> HotspotFilterOutcome {
        if hotspots.is_empty() {
            warn!("No hotspots detected, keeping all {} candidates", candidates.len());
            return HotspotFilterOutcome {
                candidates,
                mode: HotspotFilterMode::PassThrough,
            };
        }

        let total = candidates.len();
        let (mut matched, unmatched): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .map(|mut candidate| {
                candidate.hotspot_priority = false;
                let hit = hotspots.iter().find(|h| h.contains_line(candidate.line));
                if let Some(hotspot) = hit {
                    candidate.hotspot_score = Some(hotspot.impact_score);
                    candidate.hotspot_priority = true;
                }
                candidate
            })
            .partition(|candidate| candidate.hotspot_priority);

        if matched.is_empty() {
            warn!("No candidates match hotspots, keeping the first candidates by line");
            let mut fallback = unmatched;
            fallback.sort_by_key(|c| c.line);
            fallback.truncate(self.config.fallback_candidates);
            return HotspotFilterOutcome {
                candidates: fallback,
                mode: HotspotFilterMode::Fallback,
            };
        }

        matched.sort_by(|a, b| {
            b.hotspot_score
                .unwrap_or_default()
                .total_cmp(&a.hotspot_score.unwrap_or_default())
        });
        info!("Hotspot filtering: {} -> {} candidates", total, matched.len());
        HotspotFilterOutcome {
            candidates: matched,
            mode: HotspotFilterMode::Matched,
        }
    }
}

fn measure_lines(lines: &[&str]) -> HotspotMetrics {
    let mut metrics = HotspotMetrics::default();
    let mut depth: i64 = 0;
    let mut max_depth: i64 = 0;

    for raw in lines {
        let line = raw.trim();
        depth += line.matches('{').count() as i64;
        depth -= line.matches('}').count() as i64;
        max_depth = max_depth.max(depth);

        metrics.array_operations += ARRAY_OP.find_iter(line).count();
        metrics.arithmetic_operations += ARITHMETIC_OP.find_iter(line).count();
        metrics.function_calls += source::call_count(line);

        if SIMPLE_INDEX.is_match(line) {
            metrics.memory_complexity += 1;
        } else if COMPLEX_INDEX.is_match(line) {
            metrics.memory_complexity += 3;
        }
    }

    // the outermost brace level is the loop itself
    metrics.nesting_depth = usize::try_from(max_depth - 1).unwrap_or(0);
    metrics
}

pub fn summarize(hotspots: &[LoopHotspot]) -> HotspotSummary {
    let Some(top) = hotspots.first() else {
        return HotspotSummary::default();
    };
    let total: f64 = hotspots.iter().map(|h| h.impact_score).sum();
    HotspotSummary {
        total_hotspots: hotspots.len(),
        total_impact_score: total,
        average_impact_score: total / hotspots.len() as f64,
        top_hotspot: Some(TopHotspot {
            function: top.function.clone(),
            start_line: top.start_line,
            end_line: top.end_line,
            score: top.impact_score,
        }),
        functions: hotspots.iter().map(|h| h.function.clone()).collect(),
    }
}
