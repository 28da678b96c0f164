//! Engine configuration support
//!
//! Loads run configuration from `gitfleet.toml` in the scanned root, or from
//! an explicit `--config` path. Every key is optional.
//!
//! # Configuration Format
//!
//! ```toml
//! # gitfleet.toml
//! project = "acme"
//! primary_window = "last_365_days"
//!
//! [[windows]]
//! name = "last_30_days"
//! days = 30
//!
//! [[windows]]
//! name = "last_365_days"
//! days = 365
//!
//! [activity]
//! threshold_days = 365
//! very_old_years = 3
//! old_years = 1
//!
//! [cache]
//! enabled = true
//! dir = "/var/cache/gitfleet"
//!
//! [performance]
//! workers = 8
//! timeout_secs = 300
//! max_history_days = 1825
//!
//! [leaderboards]
//! top_n = 10
//! bottom_n = 10
//! least_active_n = 10
//!
//! [data_quality]
//! unknown_email_placeholder = "unknown@unknown"
//!
//! [organizations]
//! collapse_subdomains = true
//! preserve_full_domain = ["zte.com.cn"]
//! custom_mappings = { "users.noreply.github.com" = "github.com" }
//! ```

use crate::aggregate::AgeThresholds;
use crate::cache::default_cache_dir;
use crate::error::ConfigError;
use crate::identity::{IdentityNormalizer, OrgDomainPolicy, DEFAULT_UNKNOWN_EMAIL};
use crate::windows::{default_window_specs, TimeWindows, WindowSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// File name looked up in the scanned root.
pub const CONFIG_FILE_NAME: &str = "gitfleet.toml";

/// Upper bound for `performance.workers`.
pub const MAX_WORKERS: usize = 64;

/// Full configuration for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Project label written into the report (defaults to the root directory name)
    pub project: Option<String>,

    /// Lookback windows, in output order
    pub windows: Vec<WindowSpec>,

    /// Window used for totals and leaderboards (defaults to the longest)
    pub primary_window: Option<String>,

    pub activity: ActivityConfig,
    pub cache: CacheConfig,
    pub performance: PerformanceConfig,
    pub leaderboards: LeaderboardConfig,
    pub data_quality: DataQualityConfig,
    pub organizations: OrgDomainPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project: None,
            windows: default_window_specs(),
            primary_window: None,
            activity: ActivityConfig::default(),
            cache: CacheConfig::default(),
            performance: PerformanceConfig::default(),
            leaderboards: LeaderboardConfig::default(),
            data_quality: DataQualityConfig::default(),
            organizations: OrgDomainPolicy::default(),
        }
    }
}

/// Activity classification thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// A repository is active when its last commit is at most this many days old
    pub threshold_days: i64,
    /// Inactive for longer than this many years: "very old"
    pub very_old_years: u32,
    /// Inactive for longer than this many years: "old"
    pub old_years: u32,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        let ages = AgeThresholds::default();
        Self {
            threshold_days: crate::pipeline::DEFAULT_ACTIVITY_THRESHOLD_DAYS,
            very_old_years: ages.very_old_years,
            old_years: ages.old_years,
        }
    }
}

/// Metrics cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Cache directory (default: the user cache dir)
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

/// Concurrency and history-depth settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub workers: usize,
    /// Per-repository timeout; 0 disables it
    pub timeout_secs: u64,
    /// Only scan this many days of history
    pub max_history_days: Option<u32>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            workers: crate::pipeline::DEFAULT_WORKERS,
            timeout_secs: crate::pipeline::DEFAULT_TIMEOUT.as_secs(),
            max_history_days: None,
        }
    }
}

/// Leaderboard sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    pub top_n: usize,
    pub bottom_n: usize,
    /// Length of the least-active (longest quiet) repository list
    pub least_active_n: usize,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            bottom_n: 10,
            least_active_n: 10,
        }
    }
}

/// Handling of incomplete commit metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataQualityConfig {
    /// Identity key for commits without a usable author email
    pub unknown_email_placeholder: String,
}

impl Default for DataQualityConfig {
    fn default() -> Self {
        Self {
            unknown_email_placeholder: DEFAULT_UNKNOWN_EMAIL.to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Check every value that would otherwise fail mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Window shape errors are identical at any instant
        let windows = TimeWindows::compute(&self.windows, Utc::now())?;

        if let Some(primary) = &self.primary_window {
            if windows.index_of(primary).is_none() {
                return Err(ConfigError::UnknownPrimaryWindow(primary.clone()));
            }
        }
        if self.activity.threshold_days <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "activity.threshold_days",
                reason: format!("must be positive, got {}", self.activity.threshold_days),
            });
        }
        if self.activity.old_years > self.activity.very_old_years {
            return Err(ConfigError::InvalidValue {
                field: "activity.old_years",
                reason: format!(
                    "must not exceed very_old_years ({} > {})",
                    self.activity.old_years, self.activity.very_old_years
                ),
            });
        }
        if !(1..=MAX_WORKERS).contains(&self.performance.workers) {
            return Err(ConfigError::InvalidValue {
                field: "performance.workers",
                reason: format!(
                    "must be between 1 and {}, got {}",
                    MAX_WORKERS, self.performance.workers
                ),
            });
        }
        if self.performance.max_history_days == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "performance.max_history_days",
                reason: "must be positive when set".to_string(),
            });
        }
        let boards = &self.leaderboards;
        if boards.top_n == 0 || boards.bottom_n == 0 || boards.least_active_n == 0 {
            return Err(ConfigError::InvalidValue {
                field: "leaderboards",
                reason: "top_n, bottom_n and least_active_n must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Compute the run's windows against `now`.
    pub fn time_windows(&self, now: DateTime<Utc>) -> Result<TimeWindows, ConfigError> {
        TimeWindows::compute(&self.windows, now)
    }

    /// Configured primary window, else the longest one.
    pub fn primary_window_name(&self) -> Option<String> {
        self.primary_window.clone().or_else(|| {
            self.windows
                .iter()
                .max_by_key(|w| w.days)
                .map(|w| w.name.clone())
        })
    }

    pub fn normalizer(&self) -> IdentityNormalizer {
        IdentityNormalizer::new(&self.data_quality.unknown_email_placeholder)
    }

    pub fn age_thresholds(&self) -> AgeThresholds {
        AgeThresholds {
            very_old_years: self.activity.very_old_years,
            old_years: self.activity.old_years,
        }
    }

    /// Per-repository timeout, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        match self.performance.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache.dir.clone().unwrap_or_else(default_cache_dir)
    }

    /// SHA-256 of the configuration serialized as JSON with sorted keys.
    pub fn digest(&self) -> String {
        let canonical = serde_json::to_value(self)
            .map(|v| v.to_string())
            .unwrap_or_default();
        format!("{:x}", Sha256::digest(canonical.as_bytes()))
    }
}

/// Resolve the configuration for a run rooted at `root`.
///
/// Searches in this order:
/// 1. `explicit` (the `--config` flag); it must exist
/// 2. `<root>/gitfleet.toml`
///
/// Falls back to defaults when neither is present. A file that exists but
/// does not parse is an error: the run never starts on a half-read config.
pub fn load_engine_config(root: &Path, explicit: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    if let Some(path) = explicit {
        let config = EngineConfig::load(path)?;
        debug!("Loaded config from {}", path.display());
        return Ok(config);
    }

    let path = root.join(CONFIG_FILE_NAME);
    if path.is_file() {
        let config = EngineConfig::load(&path)?;
        debug!("Loaded config from {}", path.display());
        return Ok(config);
    }

    debug!("No config file found, using defaults");
    Ok(EngineConfig::default())
}

#[cfg(test)]
mod tests;
