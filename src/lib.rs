//! gitfleet - Git analytics aggregation engine
//!
//! Analyzes fleets of local git clones and produces cross-repository
//! activity metrics over rolling time windows: per-repository commit and
//! line counts, contributor and organization rollups, activity
//! classification and deterministic leaderboards.
//!
//! The engine is a map-reduce over repositories:
//!
//! - map: [`pipeline::RepoAggregator`] scans one repository in a single pass
//!   (fanned out by [`pipeline::FleetRunner`])
//! - reduce: [`aggregate::GlobalAggregator`] merges the results once every
//!   repository has finished
//!
//! ```no_run
//! use gitfleet::aggregate::GlobalAggregator;
//! use gitfleet::git::{discover_repositories, GitCli};
//! use gitfleet::pipeline::{FleetRunner, RepoAggregator};
//! use gitfleet::windows::{default_window_specs, TimeWindows};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let windows = Arc::new(TimeWindows::compute(&default_window_specs(), chrono::Utc::now()).unwrap());
//! let targets = discover_repositories(Path::new("/srv/fleet")).unwrap();
//! let aggregator = Arc::new(RepoAggregator::new(Arc::new(GitCli::new()), Arc::clone(&windows)));
//! let outcome = FleetRunner::new(aggregator).run(targets, None);
//! let dataset = GlobalAggregator::new(windows).aggregate(outcome.metrics, outcome.errors);
//! println!("{} authors", dataset.authors.len());
//! ```

pub mod aggregate;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod identity;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod reporters;
pub mod windows;
