//! Directory-backed metrics cache

use crate::cache::{CacheKey, MetricsCache};
use crate::error::CacheError;
use crate::models::RepositoryMetrics;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores each entry as `<dir>/<key file name>`.
///
/// Writes go to a temporary file that is renamed into place, so a reader
/// never observes a half-written entry.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl MetricsCache for DiskCache {
    fn name(&self) -> &str {
        "disk"
    }

    fn get(&self, key: &CacheKey) -> Result<Option<RepositoryMetrics>, CacheError> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        let metrics = serde_json::from_slice(&bytes)
            .map_err(|source| CacheError::Decode { path: path.clone(), source })?;
        debug!("Cache hit: {}", path.display());
        Ok(Some(metrics))
    }

    fn put(&self, key: &CacheKey, metrics: &RepositoryMetrics) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let json = serde_json::to_vec(metrics).map_err(CacheError::Encode)?;
        let path = self.entry_path(key);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", key.file_name(), std::process::id()));

        fs::write(&tmp, json).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            CacheError::Io { path: path.clone(), source }
        })?;
        debug!("Cached metrics at {}", path.display());
        Ok(())
    }
}
