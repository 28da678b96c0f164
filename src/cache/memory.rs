//! In-process metrics cache

use crate::cache::{CacheKey, MetricsCache};
use crate::error::CacheError;
use crate::models::RepositoryMetrics;
use dashmap::DashMap;

/// Thread-safe cache living for the lifetime of the value.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<CacheKey, RepositoryMetrics>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl MetricsCache for MemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &CacheKey) -> Result<Option<RepositoryMetrics>, CacheError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, key: &CacheKey, metrics: &RepositoryMetrics) -> Result<(), CacheError> {
        self.entries.insert(key.clone(), metrics.clone());
        Ok(())
    }
}
