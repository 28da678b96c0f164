//! Repository discovery
//!
//! Walks a root directory and returns every git working tree below it,
//! nested clones included. Hidden directories and ignore files are not
//! honoured: a fleet checkout often lives under dot-directories, and a
//! `.gitignore` in the root must not hide a clone.

use anyhow::{bail, Context, Result};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One repository to analyze.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepoTarget {
    /// Display name: the path relative to the scanned root, `/`-separated
    pub name: String,
    pub path: PathBuf,
}

impl RepoTarget {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Target for a single repository path, named after its directory.
    pub fn from_path(path: &Path) -> Self {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let name = canonical
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| canonical.to_string_lossy().into_owned());
        Self::new(name, canonical)
    }
}

/// Find all git repositories under `root`, sorted by name.
///
/// A directory counts as a repository when it contains a `.git` entry
/// (directory for normal clones, file for worktrees and submodules).
pub fn discover_repositories(root: &Path) -> Result<Vec<RepoTarget>> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", root.display()))?;

    let walker = WalkBuilder::new(&root)
        .hidden(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .follow_links(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();

    // Keyed by path so the same clone is never reported twice
    let mut found: BTreeMap<PathBuf, RepoTarget> = BTreeMap::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("Skipping unreadable entry during discovery: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_dir()) {
            continue;
        }
        let dir = entry.path();
        if !dir.join(".git").exists() {
            continue;
        }
        let name = display_name(&root, dir);
        found
            .entry(dir.to_path_buf())
            .or_insert_with(|| RepoTarget::new(name, dir));
    }

    let mut targets: Vec<RepoTarget> = found.into_values().collect();
    targets.sort();
    debug!("Discovered {} repositories under {}", targets.len(), root.display());
    Ok(targets)
}

fn display_name(root: &Path, dir: &Path) -> String {
    match dir.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        _ => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.to_string_lossy().into_owned()),
    }
}
