//! Per-file analysis report.

use serde::Serialize;
use std::path::PathBuf;

use super::classify::ClassifyStats;
use super::sanitize::SanitizeStats;
use super::state::{PhaseOutcome, PhaseRecord, PipelineState};
use super::unify::UnifyStats;
use crate::blocks::{BlockSummary, CodeBlock};
use crate::core::{Candidate, Language};
use crate::hotspot::{HotspotFilterMode, HotspotSummary, LoopHotspot};
use crate::scoring::{ConfidenceDistribution, ConfidenceStats};

#[derive(Debug, Clone, Serialize)]
pub struct FileAnalysis {
    pub file: PathBuf,
    pub language: Language,
    /// Final candidates, combined confidence descending
    pub candidates: Vec<Candidate>,
    pub hotspots: Vec<LoopHotspot>,
    pub hotspot_summary: HotspotSummary,
    pub hotspot_filter: Option<HotspotFilterMode>,
    pub blocks: Vec<CodeBlock>,
    pub block_summary: BlockSummary,
    pub sanitize: SanitizeStats,
    pub confidence: ConfidenceStats,
    pub distribution: ConfidenceDistribution,
    pub classify: ClassifyStats,
    pub unify: UnifyStats,
    pub phases: Vec<PhaseRecord>,
    pub timed_out: bool,
}

impl FileAnalysis {
    pub fn new(file: impl Into<PathBuf>, language: Language) -> Self {
        Self {
            file: file.into(),
            language,
            candidates: Vec::new(),
            hotspots: Vec::new(),
            hotspot_summary: HotspotSummary::default(),
            hotspot_filter: None,
            blocks: Vec::new(),
            block_summary: BlockSummary::default(),
            sanitize: SanitizeStats::default(),
            confidence: ConfidenceStats::default(),
            distribution: ConfidenceDistribution::default(),
            classify: ClassifyStats::default(),
            unify: UnifyStats::default(),
            phases: Vec::new(),
            timed_out: false,
        }
    }

    pub fn phase(&self, state: PipelineState) -> Option<&PhaseRecord> {
        self.phases.iter().find(|p| p.state == state)
    }

    /// True when every recorded phase completed normally
    pub fn is_clean(&self) -> bool {
        !self.timed_out && self.phases.iter().all(|p| p.outcome.is_completed())
    }

    /// Phases that did not complete, with their outcomes
    pub fn problems(&self) -> impl Iterator<Item = (PipelineState, &PhaseOutcome)> {
        self.phases
            .iter()
            .filter(|p| !p.outcome.is_completed())
            .map(|p| (p.state, &p.outcome))
    }
}
