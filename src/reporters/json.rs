//! JSON reporter
//!
//! Outputs the full FleetReport as pretty-printed JSON.
//! This is the form rendering layers (Markdown, HTML) consume.

use crate::report::FleetReport;
use anyhow::Result;

/// Render report as JSON
pub fn render(report: &FleetReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
