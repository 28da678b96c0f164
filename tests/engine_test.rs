//! End-to-end engine tests against real repositories
//!
//! Repositories are built with git2 inside temp directories; history is read
//! back through the `git` executable exactly as in production.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use git2::{Commit, Repository, Signature, Time};
use gitfleet::aggregate::{FleetDataset, GlobalAggregator};
use gitfleet::cache::{DiskCache, MetricsCache};
use gitfleet::error::RepositoryReadError;
use gitfleet::git::{discover_repositories, GitCli, HeadCommit, HistorySource, LogLines, LogRequest};
use gitfleet::models::{ErrorKind, LocStats};
use gitfleet::pipeline::{FleetRunner, RepoAggregator};
use gitfleet::report::FleetReport;
use gitfleet::windows::{default_window_specs, TimeWindows};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Commit `content` to `file` with a fixed author and date.
fn commit_file(
    repo: &Repository,
    file: &str,
    content: &str,
    author: (&str, &str),
    when: DateTime<Utc>,
) -> Result<()> {
    let workdir = repo.workdir().expect("non-bare repository");
    std::fs::write(workdir.join(file), content)?;

    let mut index = repo.index()?;
    index.add_path(Path::new(file))?;
    index.write()?;
    let tree = repo.find_tree(index.write_tree()?)?;

    let sig = Signature::new(author.0, author.1, &Time::new(when.timestamp(), 0))?;
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, "change", &tree, &parents)?;
    Ok(())
}

fn lines(n: usize) -> String {
    (0..n).map(|i| format!("line {i}\n")).collect()
}

fn windows(now: DateTime<Utc>) -> Arc<TimeWindows> {
    Arc::new(TimeWindows::compute(&default_window_specs(), now).unwrap())
}

/// Counts history scans so cache hits can be observed.
struct CountingSource {
    inner: GitCli,
    scans: AtomicUsize,
}

impl CountingSource {
    fn new() -> Self {
        Self {
            inner: GitCli::new(),
            scans: AtomicUsize::new(0),
        }
    }

    fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl HistorySource for CountingSource {
    fn head_commit(&self, repo: &Path) -> Result<Option<HeadCommit>, RepositoryReadError> {
        self.inner.head_commit(repo)
    }

    fn open_log(&self, repo: &Path, request: &LogRequest) -> Result<LogLines, RepositoryReadError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        self.inner.open_log(repo, request)
    }
}

fn run_fleet(root: &Path, now: DateTime<Utc>, workers: usize) -> Result<FleetDataset> {
    run_fleet_with_depth(root, now, workers, None)
}

fn run_fleet_with_depth(
    root: &Path,
    now: DateTime<Utc>,
    workers: usize,
    max_history_days: Option<u32>,
) -> Result<FleetDataset> {
    let windows = windows(now);
    let aggregator = Arc::new(
        RepoAggregator::new(Arc::new(GitCli::new()), Arc::clone(&windows))
            .with_max_history_days(max_history_days),
    );
    let outcome = FleetRunner::new(aggregator)
        .with_workers(workers)
        .run(discover_repositories(root)?, None);
    Ok(GlobalAggregator::new(windows)
        .with_primary_window("last_365_days")
        .aggregate(outcome.metrics, outcome.errors))
}

#[test]
fn test_single_fresh_commit() -> Result<()> {
    let root = TempDir::new()?;
    let now = Utc::now();
    let repo = Repository::init(root.path().join("solo"))?;
    commit_file(
        &repo,
        "notes.txt",
        &lines(10),
        ("Jane Doe", "jane@example.com"),
        now - Duration::hours(1),
    )?;

    let dataset = run_fleet(root.path(), now, 2)?;
    assert!(dataset.errors.is_empty(), "{:?}", dataset.errors);
    let metrics = &dataset.repositories[0];
    for window in default_window_specs() {
        assert_eq!(metrics.commit_counts[&window.name], 1);
        assert_eq!(metrics.loc_stats[&window.name], LocStats { added: 10, removed: 0, net: 10 });
    }
    assert!(metrics.is_active);
    assert_eq!(metrics.days_since_last_commit, Some(0));

    let jane = &dataset.authors[0];
    assert_eq!(jane.identity.email, "jane@example.com");
    assert_eq!(jane.identity.username, "jane");
    assert_eq!(jane.identity.domain, "example.com");
    Ok(())
}

#[test]
fn test_same_email_across_repositories_collapses() -> Result<()> {
    let root = TempDir::new()?;
    let now = Utc::now();
    let first = Repository::init(root.path().join("first"))?;
    commit_file(&first, "a.txt", &lines(2), ("Jane Doe", "jane@example.com"), now - Duration::days(3))?;
    let second = Repository::init(root.path().join("second"))?;
    commit_file(&second, "b.txt", &lines(4), ("JANE DOE", "Jane@Example.com"), now - Duration::days(5))?;

    let dataset = run_fleet(root.path(), now, 4)?;
    assert_eq!(dataset.authors.len(), 1);
    let jane = &dataset.authors[0];
    assert_eq!(jane.commits["last_30_days"], 2);
    assert_eq!(jane.repositories_touched["last_30_days"], 2);
    // "first" sorts before "second", so its display name wins
    assert_eq!(jane.identity.name, "Jane Doe");
    assert_eq!(dataset.organizations.len(), 1);
    assert_eq!(dataset.organizations[0].domain, "example.com");
    Ok(())
}

#[test]
fn test_empty_repository_is_inactive_and_very_old() -> Result<()> {
    let root = TempDir::new()?;
    Repository::init(root.path().join("empty"))?;

    let dataset = run_fleet(root.path(), Utc::now(), 1)?;
    assert!(dataset.errors.is_empty());
    let metrics = &dataset.repositories[0];
    assert_eq!(metrics.last_commit_timestamp, None);
    assert!(!metrics.is_active);
    assert!(metrics.commit_counts.values().all(|c| *c == 0));

    let counts = &dataset.summary.counts;
    assert_eq!(counts.no_commit_repositories, 1);
    assert_eq!(counts.inactive_repositories, 1);
    assert_eq!(dataset.summary.age_buckets.very_old.repositories, vec!["empty"]);
    Ok(())
}

#[test]
fn test_cache_hit_and_invalidation_on_new_commit() -> Result<()> {
    let root = TempDir::new()?;
    let cache_dir = TempDir::new()?;
    let now = Utc::now();
    let repo = Repository::init(root.path().join("cached"))?;
    commit_file(&repo, "a.txt", &lines(3), ("A", "a@corp.com"), now - Duration::days(1))?;

    let source = Arc::new(CountingSource::new());
    let cache: Arc<dyn MetricsCache> = Arc::new(DiskCache::new(cache_dir.path()));
    let aggregator = RepoAggregator::new(Arc::clone(&source) as Arc<dyn HistorySource>, windows(now))
        .with_cache(cache);
    let target = discover_repositories(root.path())?.remove(0);

    let first = aggregator.analyze(&target, None)?;
    let second = aggregator.analyze(&target, None)?;
    assert_eq!(source.scans(), 1);
    assert_eq!(first, second);

    commit_file(&repo, "a.txt", &lines(5), ("A", "a@corp.com"), now - Duration::hours(2))?;
    let third = aggregator.analyze(&target, None)?;
    assert_eq!(source.scans(), 2);
    assert_eq!(third.commits_in("last_30_days"), 2);
    assert_ne!(third.head_revision, first.head_revision);
    Ok(())
}

#[test]
fn test_broken_repository_is_isolated() -> Result<()> {
    let root = TempDir::new()?;
    let now = Utc::now();
    for name in ["alpha", "omega"] {
        let repo = Repository::init(root.path().join(name))?;
        commit_file(&repo, "f.txt", &lines(1), ("Dev", "dev@corp.com"), now - Duration::days(2))?;
    }
    let broken = root.path().join("broken/.git");
    std::fs::create_dir_all(&broken)?;
    std::fs::write(broken.join("HEAD"), "not a ref")?;

    let dataset = run_fleet(root.path(), now, 3)?;
    let names: Vec<&str> = dataset.repositories.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "omega"]);
    assert_eq!(dataset.errors.len(), 1);
    assert_eq!(dataset.errors[0].repository, "broken");
    assert_eq!(dataset.errors[0].kind, ErrorKind::ReadError);
    assert_eq!(dataset.summary.counts.errored_repositories, 1);
    assert_eq!(dataset.authors[0].commits["last_30_days"], 2);
    Ok(())
}

#[test]
fn test_output_independent_of_worker_count() -> Result<()> {
    let root = TempDir::new()?;
    let now = Utc::now();
    let people = [("Ann", "ann@a.org"), ("Bo", "bo@b.org"), ("Cy", "cy@a.org")];
    for i in 0..9 {
        let repo = Repository::init(root.path().join(format!("repo-{i}")))?;
        for (j, person) in people.iter().enumerate().take(i % 3 + 1) {
            commit_file(
                &repo,
                &format!("f{j}.txt"),
                &lines(i + j + 1),
                *person,
                now - Duration::days((i * 40 + j) as i64),
            )?;
        }
    }

    let render = |workers: usize| -> Result<String> {
        let dataset = run_fleet(root.path(), now, workers)?;
        let report = FleetReport::new("fleet", "digest", &windows(now), dataset);
        Ok(serde_json::to_string(&report)?)
    };
    assert_eq!(render(1)?, render(8)?);
    Ok(())
}

#[test]
fn test_history_depth_limit() -> Result<()> {
    let root = TempDir::new()?;
    let now = Utc::now();
    let repo = Repository::init(root.path().join("deep"))?;
    commit_file(&repo, "a.txt", &lines(1), ("A", "a@x.org"), now - Duration::days(800))?;
    commit_file(&repo, "a.txt", &lines(2), ("A", "a@x.org"), now - Duration::days(10))?;

    let aggregator = RepoAggregator::new(Arc::new(GitCli::new()), windows(now)).with_max_history_days(Some(90));
    let target = discover_repositories(root.path())?.remove(0);
    let metrics = aggregator.analyze(&target, None)?;
    assert_eq!(metrics.total_commits, 1);
    assert_eq!(metrics.commits_in("last_3_years"), 1);
    Ok(())
}

#[test]
fn test_depth_limit_does_not_change_last_commit_or_activity() -> Result<()> {
    let root = TempDir::new()?;
    let now = Utc::now();
    // Both newest commits predate the 30-day history limit
    let recent = Repository::init(root.path().join("recent"))?;
    commit_file(&recent, "a.txt", &lines(1), ("A", "a@x.org"), now - Duration::days(40))?;
    let stale = Repository::init(root.path().join("stale"))?;
    commit_file(&stale, "b.txt", &lines(1), ("B", "b@x.org"), now - Duration::days(400))?;

    let full = run_fleet_with_depth(root.path(), now, 2, None)?;
    let bounded = run_fleet_with_depth(root.path(), now, 2, Some(30))?;

    for (a, b) in full.repositories.iter().zip(&bounded.repositories) {
        assert_eq!(a.name, b.name);
        assert!(b.last_commit_timestamp.is_some(), "{}", b.name);
        assert_eq!(a.last_commit_timestamp, b.last_commit_timestamp);
        assert_eq!(a.days_since_last_commit, b.days_since_last_commit);
        assert_eq!(a.is_active, b.is_active);
    }
    assert_eq!(bounded.repositories[0].total_commits, 0);
    assert!(bounded.repositories[0].is_active);
    assert!(!bounded.repositories[1].is_active);

    let (a, b) = (&full.summary.counts, &bounded.summary.counts);
    assert_eq!(b.no_commit_repositories, 0);
    assert_eq!(a.no_commit_repositories, b.no_commit_repositories);
    assert_eq!(a.active_repositories, b.active_repositories);
    assert_eq!(a.inactive_repositories, b.inactive_repositories);
    assert_eq!(full.summary.age_buckets, bounded.summary.age_buckets);
    assert_eq!(bounded.summary.age_buckets.old.repositories, vec!["stale"]);
    Ok(())
}

#[test]
fn test_author_outside_every_window_is_still_counted() -> Result<()> {
    let root = TempDir::new()?;
    let now = Utc::now();
    let repo = Repository::init(root.path().join("mixed"))?;
    commit_file(&repo, "a.txt", &lines(1), ("Old", "old@x.org"), now - Duration::days(2000))?;
    commit_file(&repo, "a.txt", &lines(2), ("New", "new@x.org"), now - Duration::days(2))?;

    let dataset = run_fleet(root.path(), now, 1)?;
    let metrics = &dataset.repositories[0];
    assert_eq!(metrics.total_commits, 2);
    let emails: Vec<&str> = dataset.authors.iter().map(|a| a.identity.email.as_str()).collect();
    assert_eq!(emails, vec!["new@x.org", "old@x.org"]);
    assert_eq!(dataset.summary.counts.total_authors, 2);
    let old = &dataset.authors[1];
    assert!(old.commits.values().all(|c| *c == 0));
    Ok(())
}
