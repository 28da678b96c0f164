//! Repository analysis pipeline
//!
//! Orchestrates the map phase of a run:
//! 1. Resolve HEAD and consult the metrics cache
//! 2. Stream and bucket the commit log of each cache miss
//! 3. Fan out across the fleet with a bounded worker pool
//!
//! The reduce phase lives in [`crate::aggregate`] and only starts once every
//! repository has produced either metrics or an error record.

pub mod fleet;
pub mod repo;

pub use fleet::{FleetOutcome, FleetRunner, Progress, DEFAULT_TIMEOUT, DEFAULT_WORKERS};
pub use repo::{RepoAggregator, DEFAULT_ACTIVITY_THRESHOLD_DAYS};
