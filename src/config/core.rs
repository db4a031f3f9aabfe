use serde::{Deserialize, Serialize};

use super::pipeline::{CacheConfig, PipelineConfig, ValidationConfig};
use super::scoring::{ConfidenceConfig, HotspotConfig};

/// Root configuration structure for parascore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ParascoreConfig {
    /// Hotspot impact formula and retention
    #[serde(default)]
    pub hotspot: HotspotConfig,

    /// Confidence scorer priors, factor weights and thresholds
    #[serde(default)]
    pub confidence: ConfidenceConfig,

    /// Directive validator selection
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Result cache location and limits
    #[serde(default)]
    pub cache: CacheConfig,

    /// Orchestrator limits and timeouts
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl ParascoreConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.hotspot.validate()?;
        self.confidence.validate()?;

        if !(0.0..=1.0).contains(&self.validation.similarity_threshold) {
            return Err("validation.similarity_threshold must be between 0.0 and 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&self.cache.similarity_threshold) {
            return Err("cache.similarity_threshold must be between 0.0 and 1.0".to_string());
        }
        if self.cache.max_entries == 0 {
            return Err("cache.max_entries must be at least 1".to_string());
        }
        if self.pipeline.batch_size == 0 {
            return Err("pipeline.batch_size must be at least 1".to_string());
        }
        if self.pipeline.max_concurrent_files == 0 {
            return Err("pipeline.max_concurrent_files must be at least 1".to_string());
        }
        Ok(())
    }
}
