//! Per-file pipeline states and phase outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline states in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    DetectHotspots,
    PartitionBlocks,
    /// External detector call
    RawCandidates,
    FilterByHotspot,
    ScoreConfidence,
    Prioritize,
    /// External classifier call, cache-checked
    Classify,
    UnifyBlocks,
    Finalize,
}

impl PipelineState {
    pub const ORDER: [PipelineState; 9] = [
        Self::DetectHotspots,
        Self::PartitionBlocks,
        Self::RawCandidates,
        Self::FilterByHotspot,
        Self::ScoreConfidence,
        Self::Prioritize,
        Self::Classify,
        Self::UnifyBlocks,
        Self::Finalize,
    ];

    pub fn next(self) -> Option<Self> {
        let position = Self::ORDER.iter().position(|s| *s == self)?;
        Self::ORDER.get(position + 1).copied()
    }

    /// States that call a collaborator and may suspend
    pub fn is_external(self) -> bool {
        matches!(self, Self::RawCandidates | Self::Classify)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DetectHotspots => "detect_hotspots",
            Self::PartitionBlocks => "partition_blocks",
            Self::RawCandidates => "raw_candidates",
            Self::FilterByHotspot => "filter_by_hotspot",
            Self::ScoreConfidence => "score_confidence",
            Self::Prioritize => "prioritize",
            Self::Classify => "classify",
            Self::UnifyBlocks => "unify_blocks",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a phase ended. Lets callers tell "no findings" from "phase failed".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PhaseOutcome {
    Completed,
    /// Ran, but a collaborator failed and outputs were substituted
    Degraded { reason: String },
    Skipped { reason: String },
    TimedOut,
}

impl PhaseOutcome {
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            reason: reason.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub state: PipelineState,
    pub outcome: PhaseOutcome,
    pub elapsed_ms: u64,
    /// Items produced by the phase
    pub items: usize,
}
