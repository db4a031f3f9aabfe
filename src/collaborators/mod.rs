//! Contracts for the two external collaborators: the static candidate
//! detector and the classifier.
//!
//! Both are synchronous, potentially slow, and allowed to fail. The pipeline
//! runs them on blocking worker threads and absorbs every failure.

pub mod adapters;
pub mod parser;
pub mod prompt;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::{Candidate, Language, PatternType};

pub use adapters::{CommandClassifier, CommandDetector, ReportFileDetector};
pub use parser::{parse_classifier_response, ParsedResponse};

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Collaborator failed: {0}")]
    Failed(String),

    #[error("Malformed collaborator output: {0}")]
    Malformed(String),

    #[error("Collaborator I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces raw candidates for one source file
pub trait CandidateDetector: Send + Sync {
    fn detect(&self, path: &Path, language: Language) -> Result<Vec<Candidate>, CollaboratorError>;
}

/// Classifies a batch of candidates, returning the service's raw text
pub trait Classifier: Send + Sync {
    fn classify(&self, batch: &[ClassificationRequest]) -> Result<String, CollaboratorError>;
}

/// One item of a classifier batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub file: PathBuf,
    pub function: String,
    pub line: usize,
    pub pattern_type: PatternType,
    pub reason: String,
    pub suggested_directive: String,
    /// Surrounding source, capped in characters
    pub snippet: String,
}

impl ClassificationRequest {
    pub fn from_candidate(candidate: &Candidate, snippet: String) -> Self {
        Self {
            file: candidate.file.clone(),
            function: candidate.function.clone(),
            line: candidate.line,
            pattern_type: candidate.pattern_type,
            reason: candidate.reason.clone(),
            suggested_directive: candidate.suggested_directive.clone(),
            snippet,
        }
    }
}

/// Detector that never finds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDetector;

impl CandidateDetector for NoDetector {
    fn detect(&self, _path: &Path, _language: Language) -> Result<Vec<Candidate>, CollaboratorError> {
        Ok(Vec::new())
    }
}

/// Classifier for runs without a classification service
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableClassifier;

impl Classifier for UnavailableClassifier {
    fn classify(&self, _batch: &[ClassificationRequest]) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable(
            "no classifier configured".to_string(),
        ))
    }
}
