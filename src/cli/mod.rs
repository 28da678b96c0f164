//! CLI definition and run handler

mod output;

use crate::aggregate::GlobalAggregator;
use crate::cache::{DiskCache, MetricsCache};
use crate::config::{load_engine_config, EngineConfig, MAX_WORKERS};
use crate::git::{discover_repositories, GitCli, HistorySource};
use crate::pipeline::{FleetRunner, Progress, RepoAggregator};
use crate::report::FleetReport;
use crate::reporters::{self, OutputFormat};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > MAX_WORKERS {
        Err(format!("workers cannot exceed {}", MAX_WORKERS))
    } else {
        Ok(n)
    }
}

/// gitfleet - Cross-repository git analytics
///
/// Reads local clones only. Repositories are never modified.
#[derive(Parser, Debug)]
#[command(name = "gitfleet")]
#[command(
    version,
    about = "Cross-repository git analytics: commit and LOC activity over rolling windows, contributor and organization rollups, leaderboards",
    after_help = "\
Examples:
  gitfleet ~/src/fleet                         Summarize every clone under ~/src/fleet
  gitfleet ~/src/fleet -f json -o report.json  Write the full report as JSON
  gitfleet . --workers 16 --timeout-secs 120   More parallelism, shorter per-repo timeout
  gitfleet . --no-cache                        Rescan every repository
  gitfleet . --fail-on-errors                  Exit code 1 if any repository failed (CI mode)"
)]
pub struct Cli {
    /// Directory containing the repositories (default: current directory)
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Config file (default: <root>/gitfleet.toml if present)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Project label for the report (default: root directory name)
    #[arg(long)]
    pub project: Option<String>,

    /// Number of repositories analyzed in parallel (1-64)
    #[arg(long, value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Per-repository timeout in seconds (0 disables)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Only scan this many days of history per repository
    #[arg(long)]
    pub max_history_days: Option<u32>,

    /// Skip the metrics cache for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Metrics cache directory
    #[arg(long, env = "GITFLEET_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Output format: text, json
    #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Output file path (default: stdout)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Exit with code 1 if any repository could not be analyzed
    #[arg(long)]
    pub fail_on_errors: bool,
}

impl Cli {
    /// Fold command-line overrides into the file configuration.
    fn apply_overrides(&self, config: &mut EngineConfig) {
        if let Some(project) = &self.project {
            config.project = Some(project.clone());
        }
        if let Some(workers) = self.workers {
            config.performance.workers = workers;
        }
        if let Some(secs) = self.timeout_secs {
            config.performance.timeout_secs = secs;
        }
        if let Some(days) = self.max_history_days {
            config.performance.max_history_days = Some(days);
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
        if let Some(dir) = &self.cache_dir {
            config.cache.dir = Some(dir.clone());
        }
    }
}

/// Run one analysis end to end.
pub fn run(cli: Cli) -> Result<()> {
    let start_time = Instant::now();
    let format = OutputFormat::from_str(&cli.format)?;
    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("Repository root not found: {}", cli.root.display()))?;

    let mut config = load_engine_config(&root, cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let windows = Arc::new(config.time_windows(Utc::now())?);
    let targets = discover_repositories(&root)?;
    info!("Found {} repositories under {}", targets.len(), root.display());

    let source: Arc<dyn HistorySource> = Arc::new(GitCli::new());
    let mut aggregator = RepoAggregator::new(source, Arc::clone(&windows))
        .with_normalizer(config.normalizer())
        .with_activity_threshold(config.activity.threshold_days)
        .with_max_history_days(config.performance.max_history_days);
    if config.cache.enabled {
        let cache: Arc<dyn MetricsCache> = Arc::new(DiskCache::new(config.cache_dir()));
        aggregator = aggregator.with_cache(cache);
    }

    let bar = progress_bar(&cli, format, targets.len());
    let on_progress = |p: Progress<'_>| {
        if let Some(bar) = &bar {
            bar.set_position(p.completed as u64);
            bar.set_message(p.repository.to_string());
        }
    };
    let outcome = FleetRunner::new(Arc::new(aggregator))
        .with_workers(config.performance.workers)
        .with_timeout(config.timeout())
        .run(targets, Some(&on_progress));
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }

    let mut global = GlobalAggregator::new(Arc::clone(&windows))
        .with_normalizer(config.normalizer())
        .with_org_policy(config.organizations.clone())
        .with_activity_threshold(config.activity.threshold_days)
        .with_age_thresholds(config.age_thresholds())
        .with_leaderboard_sizes(config.leaderboards.top_n, config.leaderboards.bottom_n)
        .with_least_active_size(config.leaderboards.least_active_n);
    if let Some(primary) = config.primary_window_name() {
        global = global.with_primary_window(primary);
    }
    let dataset = global.aggregate(outcome.metrics, outcome.errors);

    let project = config
        .project
        .clone()
        .unwrap_or_else(|| project_name(&root));
    let report = FleetReport::new(project, config.digest(), &windows, dataset);
    let rendered = reporters::report_with_format(&report, format)?;
    output::write_output(&rendered, format, cli.output.as_deref())?;

    if format == OutputFormat::Text && cli.output.is_none() {
        eprintln!(
            "{}",
            style(format!("Done in {:.1}s", start_time.elapsed().as_secs_f64())).dim()
        );
    }

    output::check_fail_on_errors(cli.fail_on_errors, &report);
    Ok(())
}

/// Progress bar on stderr, only for interactive text runs.
fn progress_bar(cli: &Cli, format: OutputFormat, total: usize) -> Option<ProgressBar> {
    if cli.no_progress || format != OutputFormat::Text || !console::Term::stderr().is_term() {
        return None;
    }
    let bar = ProgressBar::new(total as u64);
    bar.set_style(create_bar_style());
    Some(bar)
}

/// Create bar progress style
fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ")
}

fn project_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "fleet".to_string())
}
