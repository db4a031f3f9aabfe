//! Confidence scoring, hotspot focusing, result caching and block
//! unification for loop parallelization candidates.
//!
//! Raw candidates come from an external detector, verdicts from an external
//! classifier. Everything between the two lives here:
//!
//! ```rust,ignore
//! use parascore::{load_config, CommandDetector, Pipeline};
//!
//! let pipeline = Pipeline::builder(load_config())
//!     .detector(CommandDetector::new("loop-detector", vec!["--json".into()]))
//!     .build();
//! let report = pipeline.analyze_file(Path::new("kernel.c")).await?;
//! for candidate in &report.candidates {
//!     println!("{}:{} {:?}", candidate.file.display(), candidate.line, candidate.classification);
//! }
//! pipeline.shutdown()?;
//! ```

// Export modules for library usage
pub mod blocks;
pub mod cache;
pub mod collaborators;
pub mod config;
pub mod core;
pub mod hotspot;
pub mod observability;
pub mod pipeline;
pub mod scoring;
pub mod source;
pub mod validation;

// Re-export commonly used types
pub use crate::core::{
    Candidate, CandidateKey, Classification, ClassifierVerdict, ConfidenceBreakdown, Error,
    IssueType, Language, PatternType, Result, ValidationResult, ValidationStatus, VerdictSource,
};

pub use crate::config::{load_config, load_config_from_path, ParascoreConfig};

pub use crate::blocks::{BlockPartition, BlockPartitioner, BlockType, CodeBlock, ParallelPotential};
pub use crate::hotspot::{HotspotDetector, LoopHotspot};

pub use crate::cache::{CacheHit, CacheHitKind, CacheStats, ResultCache, StructuralFingerprint};

pub use crate::collaborators::{
    CandidateDetector, Classifier, CollaboratorError, CommandClassifier, CommandDetector,
    ReportFileDetector,
};

pub use crate::scoring::{ConfidenceDistribution, ConfidenceScorer, ConfidenceStats};
pub use crate::validation::{
    select_validator, ComplianceValidator, DirectiveValidator, DisabledValidator,
};

pub use crate::pipeline::{FileAnalysis, PhaseOutcome, Pipeline, PipelineBuilder, PipelineState};
