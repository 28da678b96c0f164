//! Cross-repository reduce
//!
//! Runs once, after every repository has been analyzed. Inputs are sorted by
//! `(name, path)` before anything else happens, which makes the whole reduce
//! independent of worker count and completion order: first-seen display
//! names, rollups and leaderboards all come out identical.

pub mod ranking;

use crate::identity::{AuthorIdentity, IdentityNormalizer, OrgDomainPolicy};
use crate::models::{
    AgeBucket, AgeBuckets, ErrorRecord, GlobalAuthor, Leaderboards, LocStats, Organization,
    RepositoryMetrics, RunSummary, SummaryCounts,
};
use crate::pipeline::DEFAULT_ACTIVITY_THRESHOLD_DAYS;
use crate::windows::TimeWindows;
use ranking::{rank, Candidate, Order};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Organization keys that never form an organization.
const IGNORED_DOMAINS: &[&str] = &["", "localhost", "unknown"];

/// Age cutoffs for inactive repositories, in years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeThresholds {
    pub very_old_years: u32,
    pub old_years: u32,
}

impl Default for AgeThresholds {
    fn default() -> Self {
        Self {
            very_old_years: 3,
            old_years: 1,
        }
    }
}

/// Output of the reduce.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetDataset {
    pub summary: RunSummary,
    /// Sorted by name, then path
    pub repositories: Vec<RepositoryMetrics>,
    /// Sorted by identity email
    pub authors: Vec<GlobalAuthor>,
    /// Sorted by domain
    pub organizations: Vec<Organization>,
    pub errors: Vec<ErrorRecord>,
}

/// Reduces per-repository metrics into fleet-wide rollups.
pub struct GlobalAggregator {
    windows: Arc<TimeWindows>,
    primary_window: String,
    normalizer: IdentityNormalizer,
    org_policy: OrgDomainPolicy,
    activity_threshold_days: i64,
    ages: AgeThresholds,
    top_n: usize,
    bottom_n: usize,
    least_active_n: usize,
}

impl GlobalAggregator {
    /// The primary window defaults to the longest configured one.
    pub fn new(windows: Arc<TimeWindows>) -> Self {
        let primary_window = windows
            .iter()
            .max_by_key(|w| w.duration_days)
            .map(|w| w.name.clone())
            .unwrap_or_default();
        Self {
            windows,
            primary_window,
            normalizer: IdentityNormalizer::default(),
            org_policy: OrgDomainPolicy::default(),
            activity_threshold_days: DEFAULT_ACTIVITY_THRESHOLD_DAYS,
            ages: AgeThresholds::default(),
            top_n: 10,
            bottom_n: 10,
            least_active_n: 10,
        }
    }

    pub fn with_primary_window(mut self, name: impl Into<String>) -> Self {
        self.primary_window = name.into();
        self
    }

    pub fn with_normalizer(mut self, normalizer: IdentityNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_org_policy(mut self, policy: OrgDomainPolicy) -> Self {
        self.org_policy = policy;
        self
    }

    pub fn with_activity_threshold(mut self, days: i64) -> Self {
        self.activity_threshold_days = days;
        self
    }

    pub fn with_age_thresholds(mut self, ages: AgeThresholds) -> Self {
        self.ages = ages;
        self
    }

    pub fn with_leaderboard_sizes(mut self, top_n: usize, bottom_n: usize) -> Self {
        self.top_n = top_n;
        self.bottom_n = bottom_n;
        self
    }

    /// Size of the least-active repository list.
    pub fn with_least_active_size(mut self, n: usize) -> Self {
        self.least_active_n = n;
        self
    }

    pub fn primary_window(&self) -> &str {
        &self.primary_window
    }

    pub fn aggregate(
        &self,
        mut metrics: Vec<RepositoryMetrics>,
        mut errors: Vec<ErrorRecord>,
    ) -> FleetDataset {
        metrics.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
        let mut seen_paths = HashSet::new();
        metrics.retain(|m| {
            let first = seen_paths.insert(m.path.clone());
            if !first {
                warn!("Dropping duplicate metrics for {}", m.path.display());
            }
            first
        });
        errors.sort_by(|a, b| a.repository.cmp(&b.repository).then_with(|| a.path.cmp(&b.path)));

        info!("Computing author rollups");
        let authors = self.author_rollups(&metrics);
        info!("Computing organization rollups");
        let organizations = self.organization_rollups(&authors);

        let (counts, age_buckets) = self.classify(&metrics, errors.len());
        let counts = SummaryCounts {
            total_authors: authors.len(),
            total_organizations: organizations.len(),
            ..counts
        };
        let leaderboards = self.leaderboards(&metrics, &authors, &organizations);

        info!(
            "Aggregation complete: {} active, {} inactive, {} no-commit, {} errored repositories",
            counts.active_repositories,
            counts.inactive_repositories,
            counts.no_commit_repositories,
            counts.errored_repositories
        );
        info!(
            "Found {} authors across {} organizations",
            authors.len(),
            organizations.len()
        );

        FleetDataset {
            summary: RunSummary {
                counts,
                age_buckets,
                leaderboards,
            },
            repositories: metrics,
            authors: authors.into_iter().map(|a| a.finish(&self.windows)).collect(),
            organizations,
            errors,
        }
    }

    /// Merge per-repository authors by identity email.
    fn author_rollups(&self, metrics: &[RepositoryMetrics]) -> Vec<AuthorRollup> {
        let n = self.windows.len();
        let mut by_email: BTreeMap<String, AuthorRollup> = BTreeMap::new();

        for (repo_index, repo) in metrics.iter().enumerate() {
            for author in &repo.authors {
                let rollup = by_email
                    .entry(author.identity.email.clone())
                    .or_insert_with(|| AuthorRollup::new(author.identity.clone(), n));

                for (i, window) in self.windows.iter().enumerate() {
                    let commits = author.commits.get(&window.name).copied().unwrap_or(0);
                    rollup.commits[i] += commits;
                    if let Some(loc) = author.loc_stats.get(&window.name) {
                        rollup.loc[i] += *loc;
                    }
                    if commits > 0 {
                        rollup.repositories[i].insert(repo_index);
                    }
                }
            }
        }

        by_email.into_values().collect()
    }

    fn organization_rollups(&self, authors: &[AuthorRollup]) -> Vec<Organization> {
        let n = self.windows.len();
        let mut by_domain: BTreeMap<String, OrgRollup> = BTreeMap::new();

        for author in authors {
            if self.normalizer.is_unknown(&author.identity) {
                continue;
            }
            let domain = self.org_policy.organization_for(&author.identity.domain);
            if IGNORED_DOMAINS.contains(&domain.as_str()) {
                debug!("Skipping {} for organization rollup", author.identity.email);
                continue;
            }

            let org = by_domain
                .entry(domain)
                .or_insert_with(|| OrgRollup::new(n));
            org.contributors.insert(author.identity.email.clone());
            for i in 0..n {
                org.commits[i] += author.commits[i];
                org.loc[i] += author.loc[i];
                org.repositories[i].extend(author.repositories[i].iter().copied());
            }
        }

        by_domain
            .into_iter()
            .map(|(domain, org)| Organization {
                domain,
                contributor_count: org.contributors.len(),
                commits: self.windows.to_map(org.commits),
                loc_stats: self.windows.to_map(org.loc),
                repositories_touched: self
                    .windows
                    .to_map(org.repositories.iter().map(BTreeSet::len)),
            })
            .collect()
    }

    /// Activity counts and age buckets.
    ///
    /// A repository without commits is never active: it counts as inactive
    /// and as very old, and is also tallied under `no_commit_repositories`.
    fn classify(&self, metrics: &[RepositoryMetrics], errored: usize) -> (SummaryCounts, AgeBuckets) {
        let mut counts = SummaryCounts {
            total_repositories: metrics.len(),
            errored_repositories: errored,
            ..Default::default()
        };
        let mut buckets = AgeBuckets::default();
        let very_old_days = i64::from(self.ages.very_old_years) * 365;
        let old_days = i64::from(self.ages.old_years) * 365;

        for repo in metrics {
            counts.total_commits += repo.commits_in(&self.primary_window);
            counts.total_lines_added += repo
                .loc_stats
                .get(&self.primary_window)
                .map_or(0, |l| l.added);

            if !repo.has_commits() {
                counts.no_commit_repositories += 1;
            }
            if self.is_active(repo) {
                counts.active_repositories += 1;
                continue;
            }
            counts.inactive_repositories += 1;

            let bucket = match repo.days_since_last_commit {
                None => &mut buckets.very_old,
                Some(d) if d > very_old_days => &mut buckets.very_old,
                Some(d) if d > old_days => &mut buckets.old,
                Some(_) => &mut buckets.recent_inactive,
            };
            add_to_bucket(bucket, &repo.name);
        }

        (counts, buckets)
    }

    fn is_active(&self, repo: &RepositoryMetrics) -> bool {
        repo.has_commits()
            && repo
                .days_since_last_commit
                .is_some_and(|d| d <= self.activity_threshold_days)
    }

    fn leaderboards(
        &self,
        metrics: &[RepositoryMetrics],
        authors: &[AuthorRollup],
        organizations: &[Organization],
    ) -> Leaderboards {
        let w = &self.primary_window;
        let Some(wi) = self.windows.index_of(w) else {
            warn!("Primary window '{}' is not configured; leaderboards are empty", w);
            return Leaderboards {
                window: w.clone(),
                ..Default::default()
            };
        };

        let with_history: Vec<&RepositoryMetrics> =
            metrics.iter().filter(|m| m.has_commits()).collect();
        let repo_commits = repo_candidates(&with_history, |m| saturating_i64(m.commits_in(w)));

        let least_active: Vec<Candidate<'_>> = with_history
            .iter()
            .filter(|m| !self.is_active(m))
            .filter_map(|m| m.days_since_last_commit.map(|d| Candidate::new(&m.name, d)))
            .collect();

        let known_authors: Vec<&AuthorRollup> = authors
            .iter()
            .filter(|a| !self.normalizer.is_unknown(&a.identity))
            .collect();

        Leaderboards {
            window: w.clone(),
            top_repositories: rank(repo_commits.iter().copied(), Order::Descending, self.top_n),
            bottom_repositories: rank(repo_commits, Order::Ascending, self.bottom_n),
            least_active_repositories: rank(least_active, Order::Descending, self.least_active_n),
            top_authors_by_commits: rank(
                author_candidates(&known_authors, |a| saturating_i64(a.commits[wi])),
                Order::Descending,
                self.top_n,
            ),
            top_authors_by_net_loc: rank(
                author_candidates(&known_authors, |a| a.loc[wi].net),
                Order::Descending,
                self.top_n,
            ),
            top_organizations: rank(
                organizations.iter().map(|o| {
                    Candidate::new(&o.domain, saturating_i64(o.commits.get(w).copied().unwrap_or(0)))
                }),
                Order::Descending,
                self.top_n,
            ),
        }
    }
}

fn repo_candidates<'a>(
    repos: &[&'a RepositoryMetrics],
    value: impl Fn(&RepositoryMetrics) -> i64,
) -> Vec<Candidate<'a>> {
    repos
        .iter()
        .map(|m| {
            let m: &'a RepositoryMetrics = m;
            Candidate::new(&m.name, value(m))
        })
        .collect()
}

/// Authors keyed by email, displayed by name.
fn author_candidates<'a>(
    authors: &[&'a AuthorRollup],
    value: impl Fn(&AuthorRollup) -> i64,
) -> Vec<Candidate<'a>> {
    authors
        .iter()
        .map(|a| {
            let a: &'a AuthorRollup = a;
            Candidate::new(&a.identity.email, value(a)).with_display_name(&a.identity.name)
        })
        .collect()
}

fn add_to_bucket(bucket: &mut AgeBucket, name: &str) {
    bucket.count += 1;
    // Inputs arrive sorted by name, so pushing keeps the list sorted
    bucket.repositories.push(name.to_string());
}

fn saturating_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

/// An author while the reduce is running; repository sets hold indexes into
/// the sorted metrics slice.
struct AuthorRollup {
    identity: AuthorIdentity,
    commits: Vec<u64>,
    loc: Vec<LocStats>,
    repositories: Vec<BTreeSet<usize>>,
}

impl AuthorRollup {
    fn new(identity: AuthorIdentity, windows: usize) -> Self {
        Self {
            identity,
            commits: vec![0; windows],
            loc: vec![LocStats::default(); windows],
            repositories: vec![BTreeSet::new(); windows],
        }
    }

    fn finish(self, windows: &TimeWindows) -> GlobalAuthor {
        GlobalAuthor {
            commits: windows.to_map(self.commits),
            loc_stats: windows.to_map(self.loc),
            repositories_touched: windows.to_map(self.repositories.iter().map(BTreeSet::len)),
            identity: self.identity,
        }
    }
}

struct OrgRollup {
    contributors: BTreeSet<String>,
    commits: Vec<u64>,
    loc: Vec<LocStats>,
    repositories: Vec<BTreeSet<usize>>,
}

impl OrgRollup {
    fn new(windows: usize) -> Self {
        Self {
            contributors: BTreeSet::new(),
            commits: vec![0; windows],
            loc: vec![LocStats::default(); windows],
            repositories: vec![BTreeSet::new(); windows],
        }
    }
}
