//! Core data models for gitfleet
//!
//! These models flow from the per-repository scan through the global
//! reduce into the rendered report. Every window-keyed map carries an entry
//! for every configured window, in configured order.

use crate::identity::AuthorIdentity;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use std::path::PathBuf;

/// Per-window values keyed by window name, in configured order.
pub type WindowMap<T> = IndexMap<String, T>;

/// Line-of-code counters for one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocStats {
    pub added: u64,
    pub removed: u64,
    pub net: i64,
}

impl LocStats {
    pub fn new(added: u64, removed: u64) -> Self {
        Self {
            added,
            removed,
            net: added as i64 - removed as i64,
        }
    }

    /// Add one commit's line counts.
    pub fn record(&mut self, added: u64, removed: u64) {
        *self += LocStats::new(added, removed);
    }
}

impl AddAssign for LocStats {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.removed += other.removed;
        self.net += other.net;
    }
}

/// One parsed commit. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
    pub lines_added: u64,
    pub lines_removed: u64,
}

/// An author's contribution to a single repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoAuthorMetrics {
    #[serde(flatten)]
    pub identity: AuthorIdentity,
    pub commits: WindowMap<u64>,
    pub loc_stats: WindowMap<LocStats>,
}

/// Everything measured for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetrics {
    /// Repository name (path relative to the scanned root)
    pub name: String,
    pub path: PathBuf,
    /// HEAD commit at scan time (None for an empty repository)
    pub head_revision: Option<String>,
    pub last_commit_timestamp: Option<DateTime<Utc>>,
    pub days_since_last_commit: Option<i64>,
    pub is_active: bool,
    /// Commits seen across the whole scanned history
    pub total_commits: u64,
    /// Malformed headers and numstat lines absorbed during the scan
    pub malformed_records: u64,
    pub commit_counts: WindowMap<u64>,
    pub loc_stats: WindowMap<LocStats>,
    pub unique_contributors: WindowMap<usize>,
    /// Sorted by identity email
    pub authors: Vec<RepoAuthorMetrics>,
}

impl RepositoryMetrics {
    /// Whether HEAD points at a commit. Independent of any history-depth
    /// limit, which can leave `total_commits` at zero.
    pub fn has_commits(&self) -> bool {
        self.head_revision.is_some()
    }

    /// Commit count in `window`, zero for an unknown window name.
    pub fn commits_in(&self, window: &str) -> u64 {
        self.commit_counts.get(window).copied().unwrap_or(0)
    }
}

/// Why a repository was excluded from aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// History could not be enumerated
    ReadError,
    /// The per-repository deadline elapsed
    Timeout,
    /// The worker thread died while scanning
    WorkerPanic,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ReadError => write!(f, "read_error"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::WorkerPanic => write!(f, "worker_panic"),
        }
    }
}

/// One repository-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub repository: String,
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// An author rolled up across all repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalAuthor {
    #[serde(flatten)]
    pub identity: AuthorIdentity,
    pub commits: WindowMap<u64>,
    pub loc_stats: WindowMap<LocStats>,
    /// Distinct repositories with at least one commit in each window
    pub repositories_touched: WindowMap<usize>,
}

/// Authors grouped by email domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub domain: String,
    pub contributor_count: usize,
    pub commits: WindowMap<u64>,
    pub loc_stats: WindowMap<LocStats>,
    /// Union of the members' repository sets, per window
    pub repositories_touched: WindowMap<usize>,
}

/// Headline counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub total_repositories: usize,
    pub active_repositories: usize,
    pub inactive_repositories: usize,
    pub no_commit_repositories: usize,
    pub errored_repositories: usize,
    pub total_authors: usize,
    pub total_organizations: usize,
    /// Commits in the primary window, across all repositories
    pub total_commits: u64,
    /// Lines added in the primary window, across all repositories
    pub total_lines_added: u64,
}

/// One activity-age bucket of inactive repositories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBucket {
    pub count: usize,
    /// Sorted repository names
    pub repositories: Vec<String>,
}

/// Inactive repositories split by how long they have been quiet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBuckets {
    pub very_old: AgeBucket,
    pub old: AgeBucket,
    pub recent_inactive: AgeBucket,
}

/// A single leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// 1-based position
    pub rank: usize,
    /// Entity key, also the tie-break
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub value: i64,
}

/// Ranked lists over the primary window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboards {
    pub window: String,
    pub top_repositories: Vec<RankedEntry>,
    pub bottom_repositories: Vec<RankedEntry>,
    /// Inactive repositories with history, longest quiet first (value: days)
    pub least_active_repositories: Vec<RankedEntry>,
    pub top_authors_by_commits: Vec<RankedEntry>,
    pub top_authors_by_net_loc: Vec<RankedEntry>,
    pub top_organizations: Vec<RankedEntry>,
}

/// Aggregate view of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub counts: SummaryCounts,
    pub age_buckets: AgeBuckets,
    pub leaderboards: Leaderboards,
}
