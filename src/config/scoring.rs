//! Scoring configuration for hotspot impact and candidate confidence
//!
//! Every constant used by the hotspot formula and the confidence scorer lives
//! here so it can be tuned from `.parascore.toml` without touching control flow.

use crate::core::PatternType;
use serde::{Deserialize, Serialize};

/// Hotspot impact formula configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotConfig {
    /// Regions scoring below this are discarded
    #[serde(default = "default_min_impact_score")]
    pub min_impact_score: f64,

    /// Maximum number of hotspots retained per file
    #[serde(default = "default_max_hotspots")]
    pub max_hotspots: usize,

    #[serde(default = "default_nesting_weight")]
    pub nesting_weight: f64,

    #[serde(default = "default_array_weight")]
    pub array_weight: f64,

    #[serde(default = "default_arithmetic_weight")]
    pub arithmetic_weight: f64,

    #[serde(default = "default_memory_weight")]
    pub memory_weight: f64,

    #[serde(default = "default_size_weight")]
    pub size_weight: f64,

    /// Subtracted once per call-shaped occurrence
    #[serde(default = "default_call_penalty")]
    pub call_penalty: f64,

    /// Flat bonus for regions with array work and no calls
    #[serde(default = "default_clean_array_bonus")]
    pub clean_array_bonus: f64,

    /// Added to the array-operation count when an accumulation idiom is present
    #[serde(default = "default_reduction_bonus")]
    pub reduction_bonus: usize,

    /// Added to the array-operation count when a 2-D access is present
    #[serde(default = "default_matrix_bonus")]
    pub matrix_bonus: usize,

    /// Candidates kept when hotspots exist but none contain a candidate
    #[serde(default = "default_fallback_candidates")]
    pub fallback_candidates: usize,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            min_impact_score: default_min_impact_score(),
            max_hotspots: default_max_hotspots(),
            nesting_weight: default_nesting_weight(),
            array_weight: default_array_weight(),
            arithmetic_weight: default_arithmetic_weight(),
            memory_weight: default_memory_weight(),
            size_weight: default_size_weight(),
            call_penalty: default_call_penalty(),
            clean_array_bonus: default_clean_array_bonus(),
            reduction_bonus: default_reduction_bonus(),
            matrix_bonus: default_matrix_bonus(),
            fallback_candidates: default_fallback_candidates(),
        }
    }
}

impl HotspotConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_impact_score < 0.0 {
            return Err("hotspot.min_impact_score must be non-negative".to_string());
        }
        if self.max_hotspots == 0 {
            return Err("hotspot.max_hotspots must be at least 1".to_string());
        }
        Ok(())
    }
}

pub fn default_min_impact_score() -> f64 {
    50.0
}
pub fn default_max_hotspots() -> usize {
    10
}
pub fn default_nesting_weight() -> f64 {
    25.0
}
pub fn default_array_weight() -> f64 {
    15.0
}
pub fn default_arithmetic_weight() -> f64 {
    8.0
}
pub fn default_memory_weight() -> f64 {
    12.0
}
pub fn default_size_weight() -> f64 {
    2.0
}
pub fn default_call_penalty() -> f64 {
    10.0
}
pub fn default_clean_array_bonus() -> f64 {
    20.0
}
pub fn default_reduction_bonus() -> usize {
    5
}
pub fn default_matrix_bonus() -> usize {
    10
}
pub fn default_fallback_candidates() -> usize {
    5
}

/// Base confidence per pattern type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternPriors {
    #[serde(default = "default_prior_embarrassingly_parallel")]
    pub embarrassingly_parallel: f64,
    #[serde(default = "default_prior_vectorizable")]
    pub vectorizable: f64,
    #[serde(default = "default_prior_reduction")]
    pub reduction: f64,
    #[serde(default = "default_prior_simple_loop")]
    pub simple_loop: f64,
    #[serde(default = "default_prior_risky")]
    pub risky: f64,
    #[serde(default = "default_prior_unknown")]
    pub unknown: f64,
}

impl Default for PatternPriors {
    fn default() -> Self {
        Self {
            embarrassingly_parallel: default_prior_embarrassingly_parallel(),
            vectorizable: default_prior_vectorizable(),
            reduction: default_prior_reduction(),
            simple_loop: default_prior_simple_loop(),
            risky: default_prior_risky(),
            unknown: default_prior_unknown(),
        }
    }
}

impl PatternPriors {
    pub fn prior(&self, pattern: PatternType) -> f64 {
        match pattern {
            PatternType::EmbarrassinglyParallel => self.embarrassingly_parallel,
            PatternType::Vectorizable => self.vectorizable,
            PatternType::Reduction => self.reduction,
            PatternType::SimpleLoop => self.simple_loop,
            PatternType::Risky => self.risky,
            PatternType::Unknown => self.unknown,
        }
    }
}

pub fn default_prior_embarrassingly_parallel() -> f64 {
    0.95
}
pub fn default_prior_vectorizable() -> f64 {
    0.85
}
pub fn default_prior_reduction() -> f64 {
    0.80
}
pub fn default_prior_simple_loop() -> f64 {
    0.65
}
pub fn default_prior_risky() -> f64 {
    0.5
}
pub fn default_prior_unknown() -> f64 {
    0.5
}

/// Penalties applied when a risk factor appears in the surrounding text.
/// Stored as positive magnitudes and subtracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    #[serde(default = "default_risk_function_calls")]
    pub function_calls: f64,
    #[serde(default = "default_risk_pointer_arithmetic")]
    pub pointer_arithmetic: f64,
    #[serde(default = "default_risk_complex_control_flow")]
    pub complex_control_flow: f64,
    #[serde(default = "default_risk_global_variables")]
    pub global_variables: f64,
    #[serde(default = "default_risk_dynamic_memory")]
    pub dynamic_memory: f64,
    #[serde(default = "default_risk_recursion")]
    pub recursion: f64,
    #[serde(default = "default_risk_volatile")]
    pub volatile_access: f64,
    #[serde(default = "default_risk_inline_assembly")]
    pub inline_assembly: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            function_calls: default_risk_function_calls(),
            pointer_arithmetic: default_risk_pointer_arithmetic(),
            complex_control_flow: default_risk_complex_control_flow(),
            global_variables: default_risk_global_variables(),
            dynamic_memory: default_risk_dynamic_memory(),
            recursion: default_risk_recursion(),
            volatile_access: default_risk_volatile(),
            inline_assembly: default_risk_inline_assembly(),
        }
    }
}

pub fn default_risk_function_calls() -> f64 {
    0.15
}
pub fn default_risk_pointer_arithmetic() -> f64 {
    0.10
}
pub fn default_risk_complex_control_flow() -> f64 {
    0.20
}
pub fn default_risk_global_variables() -> f64 {
    0.10
}
pub fn default_risk_dynamic_memory() -> f64 {
    0.15
}
pub fn default_risk_recursion() -> f64 {
    0.30
}
pub fn default_risk_volatile() -> f64 {
    0.25
}
pub fn default_risk_inline_assembly() -> f64 {
    0.50
}

/// Bonuses applied when a boost factor appears in the surrounding text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostWeights {
    #[serde(default = "default_boost_simple_indexing")]
    pub simple_indexing: f64,
    #[serde(default = "default_boost_bounded_loop")]
    pub bounded_loop: f64,
    #[serde(default = "default_boost_local_variables")]
    pub local_variables: f64,
    #[serde(default = "default_boost_arithmetic_density")]
    pub arithmetic_density: f64,
    #[serde(default = "default_boost_read_only_data")]
    pub read_only_data: f64,
    #[serde(default = "default_boost_loop_index_access")]
    pub loop_index_access: f64,
    #[serde(default = "default_boost_short_body")]
    pub short_body: f64,
}

impl Default for BoostWeights {
    fn default() -> Self {
        Self {
            simple_indexing: default_boost_simple_indexing(),
            bounded_loop: default_boost_bounded_loop(),
            local_variables: default_boost_local_variables(),
            arithmetic_density: default_boost_arithmetic_density(),
            read_only_data: default_boost_read_only_data(),
            loop_index_access: default_boost_loop_index_access(),
            short_body: default_boost_short_body(),
        }
    }
}

pub fn default_boost_simple_indexing() -> f64 {
    0.10
}
pub fn default_boost_bounded_loop() -> f64 {
    0.10
}
pub fn default_boost_local_variables() -> f64 {
    0.05
}
pub fn default_boost_arithmetic_density() -> f64 {
    0.08
}
pub fn default_boost_read_only_data() -> f64 {
    0.12
}
pub fn default_boost_loop_index_access() -> f64 {
    0.15
}
pub fn default_boost_short_body() -> f64 {
    0.05
}

/// Metadata-derived adjustments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataWeights {
    #[serde(default = "default_hotspot_bonus")]
    pub hotspot_bonus: f64,
    #[serde(default = "default_positive_reason_bonus")]
    pub positive_reason_bonus: f64,
    #[serde(default = "default_negative_reason_penalty")]
    pub negative_reason_penalty: f64,
    #[serde(default = "default_function_name_adjustment")]
    pub function_name_adjustment: f64,
}

impl Default for MetadataWeights {
    fn default() -> Self {
        Self {
            hotspot_bonus: default_hotspot_bonus(),
            positive_reason_bonus: default_positive_reason_bonus(),
            negative_reason_penalty: default_negative_reason_penalty(),
            function_name_adjustment: default_function_name_adjustment(),
        }
    }
}

pub fn default_hotspot_bonus() -> f64 {
    0.1
}
pub fn default_positive_reason_bonus() -> f64 {
    0.05
}
pub fn default_negative_reason_penalty() -> f64 {
    0.08
}
pub fn default_function_name_adjustment() -> f64 {
    0.05
}

/// Confidence scorer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    /// Candidates below this are dropped by `filter_by_confidence`
    #[serde(default = "default_min_threshold")]
    pub min_threshold: f64,

    /// Candidates at or above this count as high confidence
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,

    /// Lines of source on each side of a candidate used as scoring context
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,

    /// Lower bound of the context modifier
    #[serde(default = "default_context_modifier_min")]
    pub context_modifier_min: f64,

    /// Upper bound of the context modifier
    #[serde(default = "default_context_modifier_max")]
    pub context_modifier_max: f64,

    #[serde(default)]
    pub priors: PatternPriors,

    #[serde(default)]
    pub risks: RiskWeights,

    #[serde(default)]
    pub boosts: BoostWeights,

    #[serde(default)]
    pub metadata: MetadataWeights,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            min_threshold: default_min_threshold(),
            high_threshold: default_high_threshold(),
            context_lines: default_context_lines(),
            context_modifier_min: default_context_modifier_min(),
            context_modifier_max: default_context_modifier_max(),
            priors: PatternPriors::default(),
            risks: RiskWeights::default(),
            boosts: BoostWeights::default(),
            metadata: MetadataWeights::default(),
        }
    }
}

impl ConfidenceConfig {
    // Pure function: Check if a threshold is in valid range
    pub fn is_valid_threshold(value: f64) -> bool {
        (0.0..=1.0).contains(&value)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !Self::is_valid_threshold(self.min_threshold) {
            return Err("confidence.min_threshold must be between 0.0 and 1.0".to_string());
        }
        if !Self::is_valid_threshold(self.high_threshold) {
            return Err("confidence.high_threshold must be between 0.0 and 1.0".to_string());
        }
        if self.context_modifier_min > self.context_modifier_max {
            return Err(format!(
                "confidence context modifier bounds are inverted: {} > {}",
                self.context_modifier_min, self.context_modifier_max
            ));
        }
        let priors = &self.priors;
        for pattern in PatternType::ALL {
            if !Self::is_valid_threshold(priors.prior(pattern)) {
                return Err(format!("prior for {} must be between 0.0 and 1.0", pattern));
            }
        }
        Ok(())
    }
}

pub fn default_min_threshold() -> f64 {
    0.6
}
pub fn default_high_threshold() -> f64 {
    0.8
}
pub fn default_context_lines() -> usize {
    3
}
pub fn default_context_modifier_min() -> f64 {
    -0.5
}
pub fn default_context_modifier_max() -> f64 {
    0.3
}
