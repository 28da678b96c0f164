//! Fleet-wide fan-out
//!
//! A fixed pool of worker threads pulls repositories off a crossbeam channel.
//! Each repository runs on its own short-lived thread so the worker can stop
//! waiting for it after the per-repository timeout; a hung or panicking
//! repository turns into an [`ErrorRecord`] and never stalls the rest.
//!
//! ```text
//!   targets ──► job channel ──► worker 1..N ──► unit thread (analyze)
//!                                   │
//!                                   └──► result channel ──► collector
//! ```

use crate::error::RepositoryReadError;
use crate::git::RepoTarget;
use crate::models::{ErrorKind, ErrorRecord, RepositoryMetrics};
use crate::pipeline::repo::RepoAggregator;
use crossbeam_channel::{bounded, unbounded, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default number of concurrent repositories.
pub const DEFAULT_WORKERS: usize = 8;

/// Default per-repository timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Extra wait past the deadline so a unit can report its own timeout.
const DEADLINE_GRACE: Duration = Duration::from_millis(250);

/// Everything the fan-out produced, sorted by repository name then path.
#[derive(Debug, Clone, Default)]
pub struct FleetOutcome {
    pub metrics: Vec<RepositoryMetrics>,
    pub errors: Vec<ErrorRecord>,
}

/// Reported after each repository finishes.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub completed: usize,
    pub total: usize,
    pub repository: &'a str,
    pub failed: bool,
}

/// Runs a [`RepoAggregator`] over many repositories in parallel.
pub struct FleetRunner {
    aggregator: Arc<RepoAggregator>,
    workers: usize,
    timeout: Option<Duration>,
}

impl FleetRunner {
    pub fn new(aggregator: Arc<RepoAggregator>) -> Self {
        Self {
            aggregator,
            workers: DEFAULT_WORKERS,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Set the worker count (at least 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the per-repository timeout; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Analyze every target. Never fails as a whole: each repository ends up
    /// either in `metrics` or in `errors`.
    pub fn run(
        &self,
        targets: Vec<RepoTarget>,
        progress: Option<&dyn Fn(Progress<'_>)>,
    ) -> FleetOutcome {
        let total = targets.len();
        let workers = self.workers.min(total).max(1);
        info!("Analyzing {} repositories with {} workers", total, workers);
        let started = Instant::now();

        let (job_tx, job_rx) = bounded::<RepoTarget>(total.max(1));
        let (result_tx, result_rx) = unbounded::<Result<RepositoryMetrics, ErrorRecord>>();
        for target in targets {
            // Capacity equals the job count, so this never blocks
            let _ = job_tx.send(target);
        }
        drop(job_tx);

        let mut outcome = FleetOutcome::default();
        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for target in job_rx.iter() {
                        let result = self.run_unit(target);
                        if result_tx.send(result).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            for (completed, result) in result_rx.iter().enumerate() {
                let (repository, failed) = match &result {
                    Ok(m) => (m.name.clone(), false),
                    Err(e) => (e.repository.clone(), true),
                };
                if let Some(report) = progress {
                    report(Progress {
                        completed: completed + 1,
                        total,
                        repository: &repository,
                        failed,
                    });
                }
                match result {
                    Ok(m) => outcome.metrics.push(m),
                    Err(e) => outcome.errors.push(e),
                }
            }
        });

        outcome
            .metrics
            .sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
        outcome
            .errors
            .sort_by(|a, b| a.repository.cmp(&b.repository).then_with(|| a.path.cmp(&b.path)));

        info!(
            "Analyzed {} repositories ({} failed) in {:.2?}",
            total,
            outcome.errors.len(),
            started.elapsed()
        );
        outcome
    }

    /// Run one repository on its own thread and wait for it up to the timeout.
    fn run_unit(&self, target: RepoTarget) -> Result<RepositoryMetrics, ErrorRecord> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let (tx, rx) = bounded(1);
        let aggregator = Arc::clone(&self.aggregator);
        let unit_target = target.clone();

        let spawned = thread::Builder::new()
            .name(format!("gitfleet-{}", target.name))
            .spawn(move || {
                let result = aggregator.analyze(&unit_target, deadline);
                let _ = tx.send(result);
            });
        let handle = match spawned {
            Ok(h) => h,
            Err(e) => {
                return Err(self.error_record(
                    &target,
                    ErrorKind::WorkerPanic,
                    format!("failed to start worker thread: {}", e),
                ))
            }
        };

        let received = match deadline {
            Some(d) => rx.recv_deadline(d + DEADLINE_GRACE),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Ok(metrics)) => {
                let _ = handle.join();
                debug!("{}: done", target.name);
                Ok(metrics)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                let kind = match e {
                    RepositoryReadError::TimedOut { .. } => ErrorKind::Timeout,
                    _ => ErrorKind::ReadError,
                };
                warn!("{}: {}", target.name, e);
                Err(self.error_record(&target, kind, e.to_string()))
            }
            Err(RecvTimeoutError::Timeout) => {
                // The unit thread is left to wind down; its git subprocess
                // is killed by the same deadline.
                let secs = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
                warn!("{}: timed out after {}s", target.name, secs);
                Err(self.error_record(
                    &target,
                    ErrorKind::Timeout,
                    format!("analysis exceeded {}s timeout", secs),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                let message = match handle.join() {
                    Err(payload) => panic_message(payload.as_ref()),
                    Ok(()) => "worker exited without a result".to_string(),
                };
                warn!("{}: worker panicked: {}", target.name, message);
                Err(self.error_record(&target, ErrorKind::WorkerPanic, message))
            }
        }
    }

    fn error_record(&self, target: &RepoTarget, kind: ErrorKind, message: String) -> ErrorRecord {
        ErrorRecord {
            repository: target.name.clone(),
            path: target.path.clone(),
            kind,
            message,
            // The run's reference instant keeps reports reproducible
            timestamp: self.aggregator.windows().now(),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
