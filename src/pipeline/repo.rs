//! Per-repository aggregation
//!
//! Turns one repository's commit stream into a [`RepositoryMetrics`] in a
//! single forward pass. Every commit is tested against every window and
//! contributes to each window it falls into; per-window contributor sets and
//! per-author counters are filled in the same pass.

use crate::cache::{repository_slug, CacheKey, MetricsCache};
use crate::error::RepositoryReadError;
use crate::git::{CommitParser, HeadCommit, HistorySource, LogRequest, RepoTarget};
use crate::identity::{AuthorIdentity, IdentityNormalizer};
use crate::models::{LocStats, RepoAuthorMetrics, RepositoryMetrics};
use crate::windows::TimeWindows;
use chrono::Duration;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Days without a commit after which a repository counts as inactive.
pub const DEFAULT_ACTIVITY_THRESHOLD_DAYS: i64 = 365;

/// Computes [`RepositoryMetrics`] for one repository at a time.
///
/// Shared by every worker; holds no per-repository state.
pub struct RepoAggregator {
    source: Arc<dyn HistorySource>,
    cache: Option<Arc<dyn MetricsCache>>,
    windows: Arc<TimeWindows>,
    normalizer: IdentityNormalizer,
    activity_threshold_days: i64,
    /// Limit the scan to this many days of history (`git log --since`)
    max_history_days: Option<u32>,
}

impl RepoAggregator {
    pub fn new(source: Arc<dyn HistorySource>, windows: Arc<TimeWindows>) -> Self {
        Self {
            source,
            cache: None,
            windows,
            normalizer: IdentityNormalizer::default(),
            activity_threshold_days: DEFAULT_ACTIVITY_THRESHOLD_DAYS,
            max_history_days: None,
        }
    }

    /// Look up and store results in `cache`.
    pub fn with_cache(mut self, cache: Arc<dyn MetricsCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_normalizer(mut self, normalizer: IdentityNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_activity_threshold(mut self, days: i64) -> Self {
        self.activity_threshold_days = days;
        self
    }

    pub fn with_max_history_days(mut self, days: Option<u32>) -> Self {
        self.max_history_days = days;
        self
    }

    pub fn windows(&self) -> &TimeWindows {
        &self.windows
    }

    pub fn normalizer(&self) -> &IdentityNormalizer {
        &self.normalizer
    }

    /// Digest of everything besides HEAD that shapes a cached result.
    pub fn settings_digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.windows.digest().as_bytes());
        hasher.update(self.activity_threshold_days.to_le_bytes());
        hasher.update(self.normalizer.unknown_email().as_bytes());
        hasher.update(self.max_history_days.unwrap_or(0).to_le_bytes());
        let hex = format!("{:x}", hasher.finalize());
        hex[..16].to_string()
    }

    /// Analyze one repository.
    ///
    /// A cache hit is returned as stored. A repository without commits is
    /// not an error; it yields all-zero windows. The `deadline` is checked
    /// between commits and also bounds the git subprocess.
    pub fn analyze(
        &self,
        target: &RepoTarget,
        deadline: Option<Instant>,
    ) -> Result<RepositoryMetrics, RepositoryReadError> {
        let started = Instant::now();
        let head = self.source.head_commit(&target.path)?;

        let cached = self.cache.as_ref().map(|cache| {
            let key = CacheKey::new(
                repository_slug(&target.name, &target.path),
                head.as_ref().map(|h| h.id.as_str()),
                &self.settings_digest(),
            );
            (cache, key)
        });

        if let Some((cache, key)) = &cached {
            match cache.get(key) {
                Ok(Some(metrics)) => {
                    debug!("{}: cache hit ({})", target.name, key);
                    return Ok(metrics);
                }
                Ok(None) => debug!("{}: cache miss", target.name),
                Err(e) => warn!("{}: ignoring unreadable cache entry: {}", target.name, e),
            }
        }

        let metrics = match head {
            None => {
                debug!("{}: no commits", target.name);
                self.empty_metrics(target)
            }
            Some(head) => self.scan(target, head, deadline, started)?,
        };

        if let Some((cache, key)) = &cached {
            if let Err(e) = cache.put(key, &metrics) {
                warn!("{}: failed to write {} cache: {}", target.name, cache.name(), e);
            }
        }

        debug!(
            "{}: {} commits in {:?}",
            target.name,
            metrics.total_commits,
            started.elapsed()
        );
        Ok(metrics)
    }

    fn scan(
        &self,
        target: &RepoTarget,
        head: HeadCommit,
        deadline: Option<Instant>,
        started: Instant,
    ) -> Result<RepositoryMetrics, RepositoryReadError> {
        let request = LogRequest {
            since: self
                .max_history_days
                .map(|days| self.windows.now() - Duration::days(i64::from(days))),
            deadline,
        };
        let lines = self.source.open_log(&target.path, &request)?;
        let mut parser = CommitParser::new(lines);

        let n = self.windows.len();
        let mut commits = vec![0u64; n];
        let mut loc = vec![LocStats::default(); n];
        let mut contributors: Vec<HashSet<String>> = vec![HashSet::new(); n];
        let mut authors: HashMap<String, AuthorTally> = HashMap::new();
        let mut total_commits = 0u64;
        // The log may be cut short by --since; HEAD is read separately
        let mut last_commit = head.timestamp;
        let mut hits = Vec::with_capacity(n);

        for record in parser.by_ref() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(RepositoryReadError::TimedOut {
                    elapsed_secs: started.elapsed().as_secs(),
                });
            }
            let commit = record.map_err(|e| timed_out_or(e, started))?;

            total_commits += 1;
            last_commit = last_commit.max(commit.timestamp);

            let identity = self
                .normalizer
                .normalize(&commit.author_name, &commit.author_email);
            let author = authors
                .entry(identity.email.clone())
                .or_insert_with(|| AuthorTally::new(identity, n));

            hits.clear();
            hits.extend(self.windows.matching(commit.timestamp));

            for &i in &hits {
                commits[i] += 1;
                loc[i].record(commit.lines_added, commit.lines_removed);
                author.commits[i] += 1;
                author.loc[i].record(commit.lines_added, commit.lines_removed);
                if !contributors[i].contains(&author.identity.email) {
                    contributors[i].insert(author.identity.email.clone());
                }
            }
        }

        let malformed_records = parser.malformed();
        if malformed_records > 0 {
            debug!("{}: absorbed {} malformed log records", target.name, malformed_records);
        }

        let days_since_last_commit = (self.windows.now() - last_commit).num_days().max(0);
        let is_active = days_since_last_commit <= self.activity_threshold_days;

        let mut authors: Vec<RepoAuthorMetrics> = authors
            .into_values()
            .map(|tally| RepoAuthorMetrics {
                commits: self.windows.to_map(tally.commits),
                loc_stats: self.windows.to_map(tally.loc),
                identity: tally.identity,
            })
            .collect();
        authors.sort_by(|a, b| a.identity.email.cmp(&b.identity.email));

        Ok(RepositoryMetrics {
            name: target.name.clone(),
            path: target.path.clone(),
            head_revision: Some(head.id),
            last_commit_timestamp: Some(last_commit),
            days_since_last_commit: Some(days_since_last_commit),
            is_active,
            total_commits,
            malformed_records,
            commit_counts: self.windows.to_map(commits),
            loc_stats: self.windows.to_map(loc),
            unique_contributors: self.windows.to_map(contributors.iter().map(HashSet::len)),
            authors,
        })
    }

    /// Metrics for a repository without a single commit.
    pub fn empty_metrics(&self, target: &RepoTarget) -> RepositoryMetrics {
        RepositoryMetrics {
            name: target.name.clone(),
            path: target.path.clone(),
            head_revision: None,
            last_commit_timestamp: None,
            days_since_last_commit: None,
            is_active: false,
            total_commits: 0,
            malformed_records: 0,
            commit_counts: self.windows.zeroed(),
            loc_stats: self.windows.zeroed(),
            unique_contributors: self.windows.zeroed(),
            authors: Vec::new(),
        }
    }
}

/// Per-author counters, indexed by window position.
struct AuthorTally {
    identity: AuthorIdentity,
    commits: Vec<u64>,
    loc: Vec<LocStats>,
}

impl AuthorTally {
    fn new(identity: AuthorIdentity, windows: usize) -> Self {
        Self {
            identity,
            commits: vec![0; windows],
            loc: vec![LocStats::default(); windows],
        }
    }
}

/// A killed git subprocess surfaces as a `TimedOut` I/O error.
fn timed_out_or(err: RepositoryReadError, started: Instant) -> RepositoryReadError {
    match err {
        RepositoryReadError::Stream(e) if e.kind() == io::ErrorKind::TimedOut => {
            RepositoryReadError::TimedOut {
                elapsed_secs: started.elapsed().as_secs(),
            }
        }
        other => other,
    }
}
