//! Cache trait shared by every metrics store

use crate::cache::CacheKey;
use crate::error::CacheError;
use crate::models::RepositoryMetrics;

/// Key-value store for per-repository metrics.
///
/// Injected into the aggregator for one run. Each repository only ever
/// touches its own key, so implementations need no cross-key coordination.
/// Callers treat every error as a miss.
pub trait MetricsCache: Send + Sync {
    /// Name of this cache (for logging)
    fn name(&self) -> &str;

    fn get(&self, key: &CacheKey) -> Result<Option<RepositoryMetrics>, CacheError>;

    fn put(&self, key: &CacheKey, metrics: &RepositoryMetrics) -> Result<(), CacheError>;
}
