//! The run document
//!
//! [`FleetReport`] is the canonical output of a run: every renderer and any
//! downstream consumer reads this structure (as JSON) rather than engine
//! internals.

use crate::aggregate::FleetDataset;
use crate::models::{ErrorRecord, GlobalAuthor, Organization, RepositoryMetrics, RunSummary};
use crate::windows::{TimeWindow, TimeWindows};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version of the report layout. Bump on any breaking field change.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetReport {
    pub schema_version: String,
    /// The run's reference instant; every window ends here
    pub generated_at: DateTime<Utc>,
    pub project: String,
    pub tool_version: String,
    /// SHA-256 of the resolved configuration
    pub config_digest: String,
    pub time_windows: Vec<TimeWindow>,
    pub repositories: Vec<RepositoryMetrics>,
    pub authors: Vec<GlobalAuthor>,
    pub organizations: Vec<Organization>,
    pub summary: RunSummary,
    pub errors: Vec<ErrorRecord>,
}

impl FleetReport {
    pub fn new(
        project: impl Into<String>,
        config_digest: impl Into<String>,
        windows: &TimeWindows,
        dataset: FleetDataset,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: windows.now(),
            project: project.into(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            config_digest: config_digest.into(),
            time_windows: windows.as_slice().to_vec(),
            repositories: dataset.repositories,
            authors: dataset.authors,
            organizations: dataset.organizations,
            summary: dataset.summary,
            errors: dataset.errors,
        }
    }

    /// True when at least one repository could not be analyzed.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
