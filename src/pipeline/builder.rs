//! Fluent construction of a [`Pipeline`].
//!
//! Collaborators not supplied explicitly are chosen from configuration once,
//! at build time.

use std::sync::Arc;

use super::Pipeline;
use crate::blocks::BlockPartitioner;
use crate::cache::ResultCache;
use crate::collaborators::{CandidateDetector, Classifier, NoDetector, UnavailableClassifier};
use crate::config::ParascoreConfig;
use crate::hotspot::HotspotDetector;
use crate::scoring::ConfidenceScorer;
use crate::validation::{select_validator, DirectiveValidator};

/// Builder for constructing pipelines.
///
/// ```rust,ignore
/// let pipeline = PipelineBuilder::new(config)
///     .detector(CommandDetector::new("loop-detector", vec!["--json".into()]))
///     .classifier(CommandClassifier::new("classify", Vec::new()))
///     .build();
/// ```
pub struct PipelineBuilder {
    config: ParascoreConfig,
    detector: Option<Arc<dyn CandidateDetector>>,
    classifier: Option<Arc<dyn Classifier>>,
    validator: Option<Arc<dyn DirectiveValidator>>,
    cache: Option<Arc<ResultCache>>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new(ParascoreConfig::default())
    }
}

impl PipelineBuilder {
    pub fn new(config: ParascoreConfig) -> Self {
        Self {
            config,
            detector: None,
            classifier: None,
            validator: None,
            cache: None,
        }
    }

    pub fn detector(mut self, detector: impl CandidateDetector + 'static) -> Self {
        self.detector = Some(Arc::new(detector));
        self
    }

    pub fn classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    /// Replaces the validator selected from `[validation]`
    pub fn validator(mut self, validator: Arc<dyn DirectiveValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Shares an already opened cache, e.g. between pipelines
    pub fn cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Pipeline {
        let config = self.config;
        let validator = self
            .validator
            .unwrap_or_else(|| select_validator(&config.validation));
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(ResultCache::open(config.cache.clone())));

        Pipeline {
            hotspots: HotspotDetector::new(config.hotspot.clone()),
            partitioner: BlockPartitioner::new(),
            scorer: ConfidenceScorer::new(config.confidence.clone(), validator),
            cache,
            detector: self.detector.unwrap_or_else(|| Arc::new(NoDetector)),
            classifier: self
                .classifier
                .unwrap_or_else(|| Arc::new(UnavailableClassifier)),
            config,
        }
    }
}
