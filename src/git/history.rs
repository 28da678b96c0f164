//! Git history access
//!
//! Resolves HEAD with libgit2 (git2 crate) and streams the commit log from a
//! `git log --numstat` subprocess. The log is read line by line so memory
//! stays flat on very large repositories; a watchdog thread kills the
//! subprocess once the caller's deadline passes.

use crate::error::RepositoryReadError;
use crate::git::parser::LOG_FORMAT;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use git2::{ErrorCode, Repository};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Lines of `git log` output, consumed once.
pub type LogLines = Box<dyn Iterator<Item = io::Result<String>> + Send>;

/// Options for one history scan.
#[derive(Debug, Clone, Default)]
pub struct LogRequest {
    /// Only commits after this instant (`git log --since`)
    pub since: Option<DateTime<Utc>>,
    /// Kill the scan once this instant passes
    pub deadline: Option<Instant>,
}

/// The commit HEAD points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadCommit {
    pub id: String,
    /// Author date, the same field the log stream carries
    pub timestamp: DateTime<Utc>,
}

impl HeadCommit {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            timestamp,
        }
    }
}

/// The version-control interface the engine reads history through.
pub trait HistorySource: Send + Sync {
    /// Current HEAD commit, or `None` when HEAD is unborn (no commits).
    ///
    /// Read independently of the log so a `--since` bound never hides the
    /// last commit.
    fn head_commit(&self, repo: &Path) -> Result<Option<HeadCommit>, RepositoryReadError>;

    /// Open the commit log as a line stream in [`LOG_FORMAT`] plus numstat.
    fn open_log(&self, repo: &Path, request: &LogRequest) -> Result<LogLines, RepositoryReadError>;
}

/// [`HistorySource`] backed by libgit2 and the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    git_binary: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            git_binary: PathBuf::from("git"),
        }
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a path is the root of a git repository.
    pub fn is_git_repo(path: &Path) -> bool {
        Repository::open(path).is_ok()
    }
}

impl HistorySource for GitCli {
    fn head_commit(&self, repo: &Path) -> Result<Option<HeadCommit>, RepositoryReadError> {
        let repository = Repository::open(repo).map_err(|source| RepositoryReadError::Open {
            path: repo.to_path_buf(),
            source,
        })?;

        let head = match repository.head() {
            Ok(head) => head,
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                debug!("{} has no commits yet", repo.display());
                return Ok(None);
            }
            Err(source) => {
                return Err(RepositoryReadError::Head {
                    path: repo.to_path_buf(),
                    source,
                })
            }
        };

        let commit = head.peel_to_commit().map_err(|source| RepositoryReadError::Head {
            path: repo.to_path_buf(),
            source,
        })?;
        let seconds = commit.author().when().seconds();
        let timestamp = DateTime::from_timestamp(seconds, 0).unwrap_or(DateTime::UNIX_EPOCH);
        Ok(Some(HeadCommit::new(commit.id().to_string(), timestamp)))
    }

    fn open_log(&self, repo: &Path, request: &LogRequest) -> Result<LogLines, RepositoryReadError> {
        let mut cmd = Command::new(&self.git_binary);
        cmd.arg("log")
            .arg("--numstat")
            .arg("--no-color")
            .arg("--date=iso-strict")
            .arg(format!("--pretty=format:{}", LOG_FORMAT));
        if let Some(since) = request.since {
            cmd.arg(format!("--since={}", since.to_rfc3339()));
        }
        cmd.current_dir(repo)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| RepositoryReadError::Spawn {
            path: repo.to_path_buf(),
            source,
        })?;
        debug!("Spawned git log in {}", repo.display());

        let stdout = child.stdout.take().ok_or_else(|| RepositoryReadError::Log {
            path: repo.to_path_buf(),
            message: "git log stdout was not captured".to_string(),
        })?;
        let stderr = child.stderr.take().map(drain_stderr);

        let child = Arc::new(Mutex::new(child));
        let timed_out = Arc::new(AtomicBool::new(false));
        let watchdog = request.deadline.map(|deadline| {
            arm_watchdog(
                Arc::clone(&child),
                Arc::clone(&timed_out),
                deadline,
                repo.to_path_buf(),
            )
        });

        Ok(Box::new(GitLogStream {
            repo: repo.to_path_buf(),
            started: Instant::now(),
            reader: BufReader::new(stdout),
            child,
            stderr,
            watchdog,
            timed_out,
            buf: Vec::with_capacity(256),
            done: false,
        }))
    }
}

/// Collect stderr on its own thread so a chatty git never blocks on a full pipe.
fn drain_stderr(mut stderr: impl Read + Send + 'static) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut out = Vec::new();
        let _ = stderr.read_to_end(&mut out);
        String::from_utf8_lossy(&out).trim().to_string()
    })
}

/// Kill `child` when `deadline` passes, unless disarmed first.
///
/// Dropping the returned sender disarms the watchdog.
fn arm_watchdog(
    child: Arc<Mutex<Child>>,
    timed_out: Arc<AtomicBool>,
    deadline: Instant,
    repo: PathBuf,
) -> Sender<()> {
    let (disarm_tx, disarm_rx) = bounded::<()>(0);
    thread::spawn(move || {
        let wait = deadline.saturating_duration_since(Instant::now());
        if let Err(RecvTimeoutError::Timeout) = disarm_rx.recv_timeout(wait) {
            timed_out.store(true, Ordering::SeqCst);
            let mut child = lock_child(&child);
            if let Err(e) = child.kill() {
                debug!("git log in {} already exited: {}", repo.display(), e);
            } else {
                warn!("Killed git log in {} after deadline", repo.display());
            }
        }
    });
    disarm_tx
}

fn lock_child(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct GitLogStream {
    repo: PathBuf,
    started: Instant,
    reader: BufReader<ChildStdout>,
    child: Arc<Mutex<Child>>,
    stderr: Option<JoinHandle<String>>,
    watchdog: Option<Sender<()>>,
    timed_out: Arc<AtomicBool>,
    buf: Vec<u8>,
    done: bool,
}

impl GitLogStream {
    /// Poll for exit without holding the lock, so the watchdog can still kill.
    fn wait_for_exit(&self) -> io::Result<ExitStatus> {
        loop {
            if let Some(status) = lock_child(&self.child).try_wait()? {
                return Ok(status);
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Called at end of stream: reap the process and report failures.
    fn finish(&mut self) -> io::Result<()> {
        let status = self.wait_for_exit()?;
        self.watchdog.take();
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();

        if self.timed_out.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!(
                    "git log in {} killed after {}s",
                    self.repo.display(),
                    self.started.elapsed().as_secs()
                ),
            ));
        }
        if !status.success() {
            return Err(io::Error::other(format!(
                "git log exited with {}: {}",
                status, stderr
            )));
        }
        Ok(())
    }
}

impl Iterator for GitLogStream {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                self.finish().err().map(Err)
            }
            // Author names are not always valid UTF-8; never fail the scan on that.
            Ok(_) => Some(Ok(String::from_utf8_lossy(&self.buf).into_owned())),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl Drop for GitLogStream {
    fn drop(&mut self) {
        self.watchdog.take();
        if !self.done {
            let mut child = lock_child(&self.child);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::parser::CommitParser;
    use anyhow::Result;
    use git2::Signature;
    use tempfile::tempdir;

    fn create_test_repo() -> Result<(tempfile::TempDir, Repository)> {
        let dir = tempdir()?;
        let repo = Repository::init(dir.path())?;

        {
            let sig = Signature::now("Test User", "test@example.com")?;
            let tree_id = {
                let mut index = repo.index()?;
                std::fs::write(dir.path().join("test.txt"), "hello\nworld\n")?;
                index.add_path(Path::new("test.txt"))?;
                index.write()?;
                index.write_tree()?
            };
            let tree = repo.find_tree(tree_id)?;
            repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])?;
        }

        Ok((dir, repo))
    }

    #[test]
    fn test_head_commit() -> Result<()> {
        let (dir, repo) = create_test_repo()?;
        let head = GitCli::new().head_commit(dir.path())?.expect("repository has a commit");
        let commit = repo.head()?.peel_to_commit()?;
        assert_eq!(head.id, commit.id().to_string());
        assert_eq!(head.timestamp.timestamp(), commit.author().when().seconds());
        Ok(())
    }

    #[test]
    fn test_head_commit_uses_author_date() -> Result<()> {
        let dir = tempdir()?;
        let repo = Repository::init(dir.path())?;
        let authored = Signature::new("Old", "old@example.com", &git2::Time::new(1_500_000_000, 0))?;
        let committed = Signature::now("Rebaser", "rebase@example.com")?;
        let tree_id = repo.index()?.write_tree()?;
        let tree = repo.find_tree(tree_id)?;
        repo.commit(Some("HEAD"), &authored, &committed, "rewritten", &tree, &[])?;

        let head = GitCli::new().head_commit(dir.path())?.expect("repository has a commit");
        assert_eq!(head.timestamp.timestamp(), 1_500_000_000);
        Ok(())
    }

    #[test]
    fn test_head_commit_of_empty_repo_is_none() -> Result<()> {
        let dir = tempdir()?;
        Repository::init(dir.path())?;
        assert_eq!(GitCli::new().head_commit(dir.path())?, None);
        Ok(())
    }

    #[test]
    fn test_head_commit_of_non_repo_fails() -> Result<()> {
        let dir = tempdir()?;
        let err = GitCli::new().head_commit(dir.path()).unwrap_err();
        assert!(matches!(err, RepositoryReadError::Open { .. }));
        assert!(!GitCli::is_git_repo(dir.path()));
        Ok(())
    }

    #[test]
    fn test_open_log_streams_numstat() -> Result<()> {
        let (dir, _repo) = create_test_repo()?;
        let lines = GitCli::new().open_log(dir.path(), &LogRequest::default())?;
        let mut parser = CommitParser::new(lines);
        let commits = parser.by_ref().collect::<Result<Vec<_>, _>>()?;
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].author_email, "test@example.com");
        assert_eq!(commits[0].lines_added, 2);
        assert_eq!(parser.malformed(), 0);
        Ok(())
    }

    #[test]
    fn test_open_log_on_non_repo_reports_failure() -> Result<()> {
        let dir = tempdir()?;
        let lines = GitCli::new().open_log(dir.path(), &LogRequest::default())?;
        let results: Vec<io::Result<String>> = lines.collect();
        assert!(results.iter().any(|r| r.is_err()));
        Ok(())
    }
}
