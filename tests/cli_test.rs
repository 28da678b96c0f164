//! CLI contract tests
//!
//! Runs the `gitfleet` binary against temp fleets and checks exit codes and
//! the JSON report.

use chrono::{Duration, Utc};
use git2::{Repository, Signature, Time};
use std::path::Path;
use std::process::Command;

fn gitfleet_bin() -> String {
    env!("CARGO_BIN_EXE_gitfleet").to_string()
}

/// One repository with a single recent commit.
fn init_repo(root: &Path, name: &str, email: &str) {
    let dir = root.join(name);
    let repo = Repository::init(&dir).unwrap();
    std::fs::write(dir.join("README.md"), "hello\nworld\n").unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new("README.md")).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let when = Utc::now() - Duration::days(1);
    let sig = Signature::new("Dev", email, &Time::new(when.timestamp(), 0)).unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[]).unwrap();
}

fn run(root: &Path, extra_args: &[&str]) -> (i32, String, String) {
    let output = Command::new(gitfleet_bin())
        .arg(root)
        .args(["--no-cache", "--no-progress"])
        .args(extra_args)
        .output()
        .expect("Failed to run gitfleet");
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

fn parse(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).expect("Invalid JSON")
}

#[test]
fn test_json_report_shape() {
    let root = tempfile::tempdir().unwrap();
    init_repo(root.path(), "api", "a@corp.com");
    init_repo(root.path(), "web", "b@corp.com");

    let (code, stdout, stderr) = run(root.path(), &["--format", "json", "--project", "acme"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    let report = parse(&stdout);
    assert_eq!(report["schema_version"], "1.0.0");
    assert_eq!(report["project"], "acme");
    assert_eq!(report["repositories"].as_array().unwrap().len(), 2);
    assert_eq!(report["summary"]["counts"]["total_authors"], 2);
    assert_eq!(report["organizations"][0]["domain"], "corp.com");
    assert_eq!(report["config_digest"].as_str().unwrap().len(), 64);
    assert_eq!(report["time_windows"].as_array().unwrap().len(), 4);
}

#[test]
fn test_config_file_windows() {
    let root = tempfile::tempdir().unwrap();
    init_repo(root.path(), "api", "a@corp.com");
    std::fs::write(
        root.path().join("gitfleet.toml"),
        "[[windows]]\nname = \"week\"\ndays = 7\n\n[[windows]]\nname = \"month\"\ndays = 30\n",
    )
    .unwrap();

    let (code, stdout, _) = run(root.path(), &["--format", "json"]);
    assert_eq!(code, 0);
    let report = parse(&stdout);
    let names: Vec<&str> = report["time_windows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["week", "month"]);
    assert_eq!(report["summary"]["leaderboards"]["window"], "month");
    assert_eq!(report["repositories"][0]["commit_counts"]["week"], 1);
}

#[test]
fn test_invalid_config_aborts_before_work() {
    let root = tempfile::tempdir().unwrap();
    init_repo(root.path(), "api", "a@corp.com");
    std::fs::write(
        root.path().join("gitfleet.toml"),
        "[[windows]]\nname = \"broken\"\ndays = -3\n",
    )
    .unwrap();

    let (code, stdout, stderr) = run(root.path(), &["--format", "json"]);
    assert_ne!(code, 0);
    assert!(stdout.is_empty());
    assert!(stderr.contains("positive duration"), "stderr: {stderr}");
}

#[test]
fn test_fail_on_errors() {
    let root = tempfile::tempdir().unwrap();
    init_repo(root.path(), "good", "a@corp.com");
    let broken = root.path().join("bad/.git");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("HEAD"), "garbage").unwrap();

    // Without the flag a failed repository is reported, not fatal
    let (code, stdout, _) = run(root.path(), &["--format", "json"]);
    assert_eq!(code, 0);
    let report = parse(&stdout);
    assert_eq!(report["errors"][0]["repository"], "bad");
    assert_eq!(report["errors"][0]["kind"], "read_error");

    let (code, _, stderr) = run(root.path(), &["--format", "json", "--fail-on-errors"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("--fail-on-errors"));
}

#[test]
fn test_output_file_and_text_format() {
    let root = tempfile::tempdir().unwrap();
    init_repo(root.path(), "api", "a@corp.com");
    let out = root.path().join("reports/summary.txt");

    let (code, stdout, _) = run(root.path(), &["--output", out.to_str().unwrap()]);
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains("TOP REPOSITORIES"));
    assert!(text.contains("api"));
}

#[test]
fn test_cache_dir_is_used() {
    let root = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    init_repo(root.path(), "api", "a@corp.com");

    let output = Command::new(gitfleet_bin())
        .arg(root.path())
        .args(["--no-progress", "--format", "json", "--cache-dir"])
        .arg(cache.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let entries = std::fs::read_dir(cache.path()).unwrap().count();
    assert_eq!(entries, 1);
}

#[test]
fn test_rejects_zero_workers() {
    let root = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run(root.path(), &["--workers", "0"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("workers must be at least 1"));
}
