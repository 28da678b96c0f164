//! Error taxonomy for the aggregation engine
//!
//! Only [`ConfigError`] aborts a run. Everything else is contained at the
//! repository or record granularity:
//!
//! - [`RepositoryReadError`] becomes an `ErrorRecord` for that repository
//! - [`RecordParseError`] is absorbed and counted by the commit parser
//! - [`CacheError`] degrades to a cache miss

use std::path::PathBuf;
use thiserror::Error;

/// Invalid window, threshold or engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("time window '{name}' must have a positive duration, got {days} days")]
    NonPositiveWindow { name: String, days: i64 },

    #[error("time window '{0}' is configured more than once")]
    DuplicateWindow(String),

    #[error("at least one time window must be configured")]
    NoWindows,

    #[error("primary window '{0}' is not one of the configured time windows")]
    UnknownPrimaryWindow(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A repository's history could not be enumerated at all.
#[derive(Error, Debug)]
pub enum RepositoryReadError {
    #[error("failed to open git repository at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("failed to resolve HEAD in {path}: {source}")]
    Head {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("failed to spawn git log in {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git log failed in {path}: {message}")]
    Log { path: PathBuf, message: String },

    #[error("error reading commit stream: {0}")]
    Stream(#[from] std::io::Error),

    #[error("history scan exceeded its deadline after {elapsed_secs}s")]
    TimedOut { elapsed_secs: u64 },
}

/// A single malformed commit header or numstat line.
///
/// Never surfaced per occurrence; the parser counts these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordParseError {
    #[error("commit header has {0} fields, expected 5")]
    TruncatedHeader(usize),

    #[error("invalid commit timestamp '{0}'")]
    Timestamp(String),

    #[error("invalid numstat line '{0}'")]
    Numstat(String),

    #[error("numstat line without a preceding commit header")]
    Orphan,
}

/// Cache read or write failure; always treated as a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt cache entry at {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode cache entry: {0}")]
    Encode(#[source] serde_json::Error),
}
