// Re-export all items from the submodules
mod analysis_config;
mod env_vars;

// Re-export analysis config
pub use analysis_config::{
    AnalysisConfig,
    CaptureConfig,
    NoiseConfig,
    load_or_create_config,
};

// Re-export environment variable functions
pub use env_vars::{
    apply_overrides,
    expand_env_vars,
};
