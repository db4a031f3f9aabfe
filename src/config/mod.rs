// Sub-modules
mod core;
mod loader;
mod pipeline;
mod scoring;

pub use self::core::ParascoreConfig;

pub use loader::{
    directory_ancestors, load_config, load_config_from, load_config_from_path,
    parse_and_validate_config, CONFIG_FILE_NAME,
};

pub use pipeline::{
    CacheConfig, PipelineConfig, SimilarityWeights, ValidationConfig, ValidationMode,
};

pub use scoring::{
    BoostWeights, ConfidenceConfig, HotspotConfig, MetadataWeights, PatternPriors, RiskWeights,
};
