//! Configuration module for gitfleet
//!
//! This module handles:
//! - Engine configuration (gitfleet.toml)
//! - Validation before any repository work starts
//! - Defaults for everything left unset

mod engine_config;

pub use engine_config::{
    load_engine_config,
    ActivityConfig,
    CacheConfig,
    DataQualityConfig,
    EngineConfig,
    LeaderboardConfig,
    PerformanceConfig,
    CONFIG_FILE_NAME,
    MAX_WORKERS,
};
