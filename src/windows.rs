//! Rolling lookback windows
//!
//! Windows are computed once per run against a fixed `now` and shared
//! read-only by every repository worker. A commit belongs to a window when
//! its timestamp lies in `[start, end)`; windows may overlap, so one commit
//! usually lands in several of them.

use crate::error::ConfigError;
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// A configured `(name, duration)` pair, as read from `[[windows]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub name: String,
    pub days: i64,
}

impl WindowSpec {
    pub fn new(name: impl Into<String>, days: i64) -> Self {
        Self {
            name: name.into(),
            days,
        }
    }
}

/// Windows used when the config file does not name any.
pub fn default_window_specs() -> Vec<WindowSpec> {
    vec![
        WindowSpec::new("last_30_days", 30),
        WindowSpec::new("last_90_days", 90),
        WindowSpec::new("last_365_days", 365),
        WindowSpec::new("last_3_years", 1095),
    ]
}

/// One computed window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub name: String,
    pub duration_days: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Half-open containment: `start <= ts < end`.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

/// The full, ordered set of windows for one run.
#[derive(Debug, Clone)]
pub struct TimeWindows {
    now: DateTime<Utc>,
    windows: Vec<TimeWindow>,
    digest: String,
}

impl TimeWindows {
    /// Compute window boundaries relative to `now`.
    ///
    /// Fails on an empty list, a non-positive duration or a repeated name.
    pub fn compute(specs: &[WindowSpec], now: DateTime<Utc>) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::NoWindows);
        }

        let mut seen = HashSet::new();
        let mut windows = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.days <= 0 || spec.days > i64::from(u32::MAX) {
                return Err(ConfigError::NonPositiveWindow {
                    name: spec.name.clone(),
                    days: spec.days,
                });
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(ConfigError::DuplicateWindow(spec.name.clone()));
            }
            windows.push(TimeWindow {
                name: spec.name.clone(),
                duration_days: spec.days as u32,
                start: now - Duration::days(spec.days),
                end: now,
            });
        }

        Ok(Self {
            now,
            digest: shape_digest(specs),
            windows,
        })
    }

    /// The instant every window ends at.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeWindow> {
        self.windows.iter()
    }

    pub fn as_slice(&self) -> &[TimeWindow] {
        &self.windows
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.windows.iter().map(|w| w.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.windows.iter().position(|w| w.name == name)
    }

    /// Indexes of every window containing `ts`.
    pub fn matching(&self, ts: DateTime<Utc>) -> impl Iterator<Item = usize> + '_ {
        self.windows
            .iter()
            .enumerate()
            .filter(move |(_, w)| w.contains(ts))
            .map(|(i, _)| i)
    }

    /// Digest of the window shape (names and durations, in order).
    ///
    /// Boundaries are left out so the digest is stable from one run to the
    /// next; it only changes when the analysis shape changes.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// A window map with a default value for every window.
    pub fn zeroed<T: Default>(&self) -> IndexMap<String, T> {
        self.names().map(|n| (n.to_string(), T::default())).collect()
    }

    /// Zip per-window values (in window order) into a named map.
    pub fn to_map<T>(&self, values: impl IntoIterator<Item = T>) -> IndexMap<String, T> {
        self.names().map(str::to_string).zip(values).collect()
    }
}

fn shape_digest(specs: &[WindowSpec]) -> String {
    let mut hasher = Sha256::new();
    for spec in specs {
        hasher.update(spec.name.as_bytes());
        hasher.update([0x1f]);
        hasher.update(spec.days.to_le_bytes());
        hasher.update([0x1e]);
    }
    let hex = format!("{:x}", hasher.finalize());
    hex[..16].to_string()
}
