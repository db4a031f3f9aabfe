//! Validation, cache and orchestration settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which directive validator is selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Reference corpus plus syntax table
    #[default]
    Full,
    /// Syntax table only
    SyntaxOnly,
    /// Every directive validates as unknown
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub mode: ValidationMode,

    /// Directory of reference sources; absence degrades to syntax-only
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,

    /// Minimum similarity for a "similar" match against the corpus
    #[serde(default = "default_directive_similarity")]
    pub similarity_threshold: f64,

    /// Context lines captured around each reference directive
    #[serde(default = "default_corpus_context_lines")]
    pub corpus_context_lines: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            mode: ValidationMode::default(),
            corpus_path: None,
            similarity_threshold: default_directive_similarity(),
            corpus_context_lines: default_corpus_context_lines(),
        }
    }
}

pub fn default_directive_similarity() -> f64 {
    0.6
}
pub fn default_corpus_context_lines() -> usize {
    3
}

/// Weights of the structural similarity between two fingerprints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    #[serde(default = "default_loop_type_weight")]
    pub loop_type: f64,
    #[serde(default = "default_access_pattern_weight")]
    pub access_pattern: f64,
    #[serde(default = "default_operations_weight")]
    pub operations: f64,
    #[serde(default = "default_calls_weight")]
    pub function_calls: f64,
    #[serde(default = "default_control_flow_weight")]
    pub control_flow: f64,
    #[serde(default = "default_memory_pattern_weight")]
    pub memory_pattern: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            loop_type: default_loop_type_weight(),
            access_pattern: default_access_pattern_weight(),
            operations: default_operations_weight(),
            function_calls: default_calls_weight(),
            control_flow: default_control_flow_weight(),
            memory_pattern: default_memory_pattern_weight(),
        }
    }
}

impl SimilarityWeights {
    pub fn total(&self) -> f64 {
        self.loop_type
            + self.access_pattern
            + self.operations
            + self.function_calls
            + self.control_flow
            + self.memory_pattern
    }
}

pub fn default_loop_type_weight() -> f64 {
    0.20
}
pub fn default_access_pattern_weight() -> f64 {
    0.25
}
pub fn default_operations_weight() -> f64 {
    0.20
}
pub fn default_calls_weight() -> f64 {
    0.10
}
pub fn default_control_flow_weight() -> f64 {
    0.10
}
pub fn default_memory_pattern_weight() -> f64 {
    0.15
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Directory holding `pattern_cache.json`; defaults to the user cache dir
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,

    #[serde(default = "default_cache_similarity")]
    pub similarity_threshold: f64,

    #[serde(default)]
    pub similarity_weights: SimilarityWeights,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            directory: None,
            max_entries: default_max_entries(),
            ttl_hours: default_ttl_hours(),
            similarity_threshold: default_cache_similarity(),
            similarity_weights: SimilarityWeights::default(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 3600)
    }

    /// Resolved cache directory
    pub fn resolve_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("parascore")
        })
    }
}

pub fn default_cache_enabled() -> bool {
    true
}
pub fn default_max_entries() -> usize {
    1000
}
pub fn default_ttl_hours() -> u64 {
    24 * 7
}
pub fn default_cache_similarity() -> f64 {
    0.85
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on candidates sent to the classifier per file
    #[serde(default = "default_max_classified")]
    pub max_classified: usize,

    /// Items per classifier request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Snippet length cap for classifier requests
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,

    /// Lines on each side of a candidate included in its snippet
    #[serde(default = "default_classifier_context_lines")]
    pub classifier_context_lines: usize,

    #[serde(default = "default_file_timeout_secs")]
    pub file_timeout_secs: u64,

    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files: usize,

    /// Final candidates below this combined confidence are dropped
    #[serde(default)]
    pub min_final_confidence: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_classified: default_max_classified(),
            batch_size: default_batch_size(),
            snippet_chars: default_snippet_chars(),
            classifier_context_lines: default_classifier_context_lines(),
            file_timeout_secs: default_file_timeout_secs(),
            max_concurrent_files: default_max_concurrent_files(),
            min_final_confidence: 0.0,
        }
    }
}

impl PipelineConfig {
    pub fn file_timeout(&self) -> Duration {
        Duration::from_secs(self.file_timeout_secs)
    }
}

pub fn default_max_classified() -> usize {
    10
}
pub fn default_batch_size() -> usize {
    10
}
pub fn default_snippet_chars() -> usize {
    500
}
pub fn default_classifier_context_lines() -> usize {
    5
}
pub fn default_file_timeout_secs() -> u64 {
    120
}
pub fn default_max_concurrent_files() -> usize {
    4
}
