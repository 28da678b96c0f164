//! Text (terminal) reporter with colors and formatting

use crate::models::{AgeBucket, RankedEntry};
use crate::report::FleetReport;
use anyhow::Result;
use console::style;
use std::fmt::Write as _;

/// Rows shown per leaderboard
const MAX_ROWS: usize = 10;

/// Render report as formatted terminal output
pub fn render(report: &FleetReport) -> Result<String> {
    let mut out = String::new();
    let counts = &report.summary.counts;
    let boards = &report.summary.leaderboards;

    // Header
    writeln!(out, "\n{} {}", style("gitfleet").bold(), style(&report.project).cyan())?;
    writeln!(out, "{}", style("──────────────────────────────────────").dim())?;
    writeln!(
        out,
        "Repositories: {}  Active: {}  Inactive: {}  No commits: {}  Errors: {}",
        style(counts.total_repositories).bold(),
        style(counts.active_repositories).green(),
        style(counts.inactive_repositories).yellow(),
        style(counts.no_commit_repositories).dim(),
        if counts.errored_repositories > 0 {
            style(counts.errored_repositories).red()
        } else {
            style(counts.errored_repositories).dim()
        },
    )?;
    writeln!(
        out,
        "Authors: {}  Organizations: {}  Commits ({}): {}  Lines added: {}\n",
        style(counts.total_authors).bold(),
        style(counts.total_organizations).bold(),
        boards.window,
        style(counts.total_commits).bold(),
        style(counts.total_lines_added).bold(),
    )?;

    section(&mut out, "TOP REPOSITORIES", &boards.top_repositories)?;
    section(&mut out, "LEAST ACTIVE (days since last commit)", &boards.least_active_repositories)?;
    section(&mut out, "TOP AUTHORS BY COMMITS", &boards.top_authors_by_commits)?;
    section(&mut out, "TOP AUTHORS BY NET LINES", &boards.top_authors_by_net_loc)?;
    section(&mut out, "TOP ORGANIZATIONS", &boards.top_organizations)?;

    let ages = &report.summary.age_buckets;
    writeln!(out, "{}", style("INACTIVE REPOSITORIES").bold())?;
    bucket_line(&mut out, "very old", &ages.very_old)?;
    bucket_line(&mut out, "old", &ages.old)?;
    bucket_line(&mut out, "recently inactive", &ages.recent_inactive)?;
    out.push('\n');

    if report.has_errors() {
        writeln!(out, "{} ({})", style("ERRORS").red().bold(), report.errors.len())?;
        for err in &report.errors {
            writeln!(
                out,
                "  {} {} {}",
                style(&err.repository).bold(),
                style(format!("[{}]", err.kind)).yellow(),
                style(&err.message).dim()
            )?;
        }
        out.push('\n');
    }

    Ok(out)
}

fn section(out: &mut String, title: &str, entries: &[RankedEntry]) -> Result<()> {
    writeln!(out, "{}", style(title).bold())?;
    if entries.is_empty() {
        writeln!(out, "  {}", style("(none)").dim())?;
    }
    for entry in entries.iter().take(MAX_ROWS) {
        let label = match &entry.display_name {
            Some(display) => format!("{} <{}>", display, entry.name),
            None => entry.name.clone(),
        };
        writeln!(
            out,
            "  {:>3}. {:<48} {}",
            entry.rank,
            truncate(&label, 48),
            style(entry.value).cyan()
        )?;
    }
    out.push('\n');
    Ok(())
}

fn bucket_line(out: &mut String, label: &str, bucket: &AgeBucket) -> Result<()> {
    writeln!(out, "  {:<18} {}", label, style(bucket.count).cyan())?;
    Ok(())
}

/// Truncate on char boundaries so multi-byte names never panic
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
