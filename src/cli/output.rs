//! Writing the rendered report

use crate::report::FleetReport;
use crate::reporters::OutputFormat;
use anyhow::{Context, Result};
use console::style;
use std::path::Path;

/// Write to `output_path`, or stdout when none is given.
pub(super) fn write_output(rendered: &str, format: OutputFormat, output_path: Option<&Path>) -> Result<()> {
    match output_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            // Use stderr for the notice to keep stdout clean
            eprintln!("Report written to: {}", style(path.display()).cyan());
        }
        None => {
            if format == OutputFormat::Json {
                println!("{}", rendered);
            } else {
                print!("{}", rendered);
            }
        }
    }
    Ok(())
}

/// Exit with code 1 when `--fail-on-errors` is set and a repository failed.
pub(super) fn check_fail_on_errors(fail_on_errors: bool, report: &FleetReport) {
    if fail_on_errors && report.has_errors() {
        eprintln!(
            "Failing due to --fail-on-errors: {} repositories could not be analyzed",
            report.errors.len()
        );
        std::process::exit(1);
    }
}
