//! Core data model shared by every analysis phase.

pub mod errors;

pub use errors::{Error, Result, ResultExt};

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Pattern family reported by the detector for a candidate loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Vectorizable,
    #[serde(alias = "embarrassingly-parallel")]
    EmbarrassinglyParallel,
    #[serde(alias = "advanced_reduction")]
    Reduction,
    #[serde(alias = "simple-loop")]
    SimpleLoop,
    Risky,
    #[default]
    #[serde(other)]
    Unknown,
}

impl PatternType {
    pub const ALL: [PatternType; 6] = [
        Self::Vectorizable,
        Self::EmbarrassinglyParallel,
        Self::Reduction,
        Self::SimpleLoop,
        Self::Risky,
        Self::Unknown,
    ];

    /// Lenient label parsing; unrecognised labels map to `Unknown`.
    pub fn parse(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "vectorizable" => Self::Vectorizable,
            "embarrassingly_parallel" => Self::EmbarrassinglyParallel,
            "reduction" | "advanced_reduction" => Self::Reduction,
            "simple_loop" => Self::SimpleLoop,
            "risky" => Self::Risky,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vectorizable => "vectorizable",
            Self::EmbarrassinglyParallel => "embarrassingly_parallel",
            Self::Reduction => "reduction",
            Self::SimpleLoop => "simple_loop",
            Self::Risky => "risky",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parallelization verdict attached to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    #[serde(alias = "safe-parallel")]
    SafeParallel,
    #[serde(alias = "requires-runtime-check")]
    RequiresRuntimeCheck,
    #[serde(alias = "not-parallel")]
    NotParallel,
    #[serde(alias = "logic-issue")]
    LogicIssue,
}

impl Classification {
    /// Parses a classifier label. Anything unrecognised is treated as
    /// needing a runtime check, the most conservative actionable answer.
    pub fn parse_label(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "safe_parallel" => Self::SafeParallel,
            "not_parallel" => Self::NotParallel,
            "logic_issue" => Self::LogicIssue,
            _ => Self::RequiresRuntimeCheck,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SafeParallel => "safe_parallel",
            Self::RequiresRuntimeCheck => "requires_runtime_check",
            Self::NotParallel => "not_parallel",
            Self::LogicIssue => "logic_issue",
        }
    }

    /// True for labels that advise against parallelizing.
    pub fn is_unsafe(&self) -> bool {
        matches!(self, Self::NotParallel | Self::LogicIssue)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue category reported alongside a classifier verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    #[default]
    #[serde(rename = "none")]
    NoIssue,
    FalsePositive,
    NonParallelAlgorithm,
    DataRace,
    #[serde(other)]
    Other,
}

impl IssueType {
    pub fn parse(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "" | "none" => Self::NoIssue,
            "false_positive" => Self::FalsePositive,
            "non_parallel_algorithm" => Self::NonParallelAlgorithm,
            "data_race" => Self::DataRace,
            _ => Self::Other,
        }
    }
}

/// Where a verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    #[default]
    Classifier,
    Cache,
    Fallback,
    Heuristic,
}

/// Structured classifier output for one candidate. This is also the payload
/// persisted by the result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierVerdict {
    pub classification: Classification,
    pub reasoning: String,
    pub confidence: f64,
    #[serde(default)]
    pub transformations: Vec<String>,
    #[serde(default)]
    pub tests_recommended: Vec<String>,
    #[serde(default)]
    pub issue_type: IssueType,
    #[serde(default)]
    pub source: VerdictSource,
}

impl ClassifierVerdict {
    pub const FALLBACK_CONFIDENCE: f64 = 0.5;

    /// Deterministic verdict for items the classifier did not process.
    pub fn fallback() -> Self {
        Self {
            classification: Classification::RequiresRuntimeCheck,
            reasoning: "not processed".to_string(),
            confidence: Self::FALLBACK_CONFIDENCE,
            transformations: Vec::new(),
            tests_recommended: Vec::new(),
            issue_type: IssueType::NoIssue,
            source: VerdictSource::Fallback,
        }
    }

    pub fn with_source(mut self, source: VerdictSource) -> Self {
        self.source = source;
        self
    }
}

/// Source language of an analysed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
    Unknown,
}

impl Language {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("c") | Some("h") => Self::C,
            Some("cpp") | Some("cc") | Some("cxx") | Some("hpp") | Some("hh") => Self::Cpp,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Unknown => "unknown",
        }
    }
}

/// Outcome class of a directive compliance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Verified,
    Compliant,
    Similar,
    NonCompliant,
    Unknown,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Verified => "verified",
            Self::Compliant => "compliant",
            Self::Similar => "similar",
            Self::NonCompliant => "non_compliant",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Result of checking one proposed directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub confidence_delta: f64,
    pub reference: Option<String>,
    pub similarity: f64,
    pub notes: Vec<String>,
}

impl ValidationResult {
    /// Neutral result used when there is nothing to validate.
    pub fn unknown(note: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Unknown,
            confidence_delta: 0.0,
            reference: None,
            similarity: 0.0,
            notes: vec![note.into()],
        }
    }
}

/// Additive breakdown of a confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub base: f64,
    pub context_modifier: f64,
    pub metadata_modifier: f64,
    pub validation_delta: f64,
    pub final_score: f64,
    pub risk_factors: Vec<String>,
    pub boost_factors: Vec<String>,
    pub validation: ValidationResult,
}

/// Deduplication key for candidates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidateKey {
    pub file: PathBuf,
    pub line: usize,
    pub function: String,
}

/// A code location flagged as a potential parallelization opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub file: PathBuf,
    #[serde(deserialize_with = "deserialize_line")]
    pub line: usize,
    #[serde(default)]
    pub function: String,
    #[serde(default, alias = "candidate_type")]
    pub pattern_type: PatternType,
    #[serde(default)]
    pub reason: String,
    #[serde(default, alias = "suggested_patch")]
    pub suggested_directive: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotspot_score: Option<f64>,
    #[serde(default)]
    pub hotspot_priority: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ConfidenceBreakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<ClassifierVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl Candidate {
    pub fn new(
        file: impl Into<PathBuf>,
        line: usize,
        function: impl Into<String>,
        pattern_type: PatternType,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
            pattern_type,
            reason: String::new(),
            suggested_directive: String::new(),
            confidence: 0.0,
            classification: None,
            hotspot_score: None,
            hotspot_priority: false,
            breakdown: None,
            verdict: None,
            combined_confidence: None,
            notes: Vec::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.suggested_directive = directive.into();
        self
    }

    pub fn key(&self) -> CandidateKey {
        CandidateKey {
            file: self.file.clone(),
            line: self.line,
            function: self.function.clone(),
        }
    }

    /// First `#pragma omp` line of the suggested directive text.
    pub fn directive(&self) -> Option<&str> {
        self.suggested_directive
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with("#pragma omp"))
    }

    /// Applies a verdict, keeping the classification label in sync.
    pub fn apply_verdict(&mut self, verdict: ClassifierVerdict) {
        self.classification = Some(verdict.classification);
        self.verdict = Some(verdict);
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

/// Detector output sometimes carries zero or negative line numbers; those
/// are mapped to 0 and dropped during sanitisation.
fn deserialize_line<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(usize::try_from(raw).unwrap_or(0))
}
