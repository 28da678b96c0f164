//! Repository metrics caching
//!
//! A cached [`RepositoryMetrics`] is valid exactly as long as its key is:
//! the key combines the repository, its HEAD commit and a digest of the
//! analysis settings. A new commit or a different window layout therefore
//! always misses. Two stores are provided:
//!
//! - [`DiskCache`]: one JSON file per key, survives between runs
//! - [`MemoryCache`]: process-local, used by tests and one-shot embedding

pub mod disk;
pub mod memory;
pub mod paths;
pub mod traits;

pub use disk::DiskCache;
pub use memory::MemoryCache;
pub use paths::{default_cache_dir, repository_slug};
pub use traits::MetricsCache;

use serde::{Deserialize, Serialize};

/// HEAD marker used for repositories without any commit.
pub const EMPTY_HEAD: &str = "empty";

/// Identifies one cached analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Repository slug, see [`repository_slug`]
    pub repository: String,
    /// HEAD commit id, or [`EMPTY_HEAD`]
    pub head: String,
    /// Digest of the window shape and analysis settings
    pub settings: String,
}

impl CacheKey {
    pub fn new(repository: String, head: Option<&str>, settings: &str) -> Self {
        Self {
            repository,
            head: head.unwrap_or(EMPTY_HEAD).to_string(),
            settings: settings.to_string(),
        }
    }

    /// File name for this key in a directory-backed store.
    pub fn file_name(&self) -> String {
        format!("{}_{}_{}.json", self.repository, self.head, self.settings)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}#{}", self.repository, self.head, self.settings)
    }
}
