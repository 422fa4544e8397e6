//! Caching decorator: reuse a fetched value until its TTL elapses.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::fetch::counting::COUNT_PREFIX;
use crate::fetch::{CacheStats, Fetcher};
use crate::store::KeyValueStore;

// == Caching Fetcher ==
/// Serves `key` from the store while a live entry exists, otherwise fetches
/// and writes the result back with a fixed TTL.
///
/// Failed fetches are never stored. Concurrent misses on one key may each
/// fetch; the last SETEX wins. Keys under the `count:` prefix share the
/// counters' key space and are rejected.
pub struct CachingFetcher<F> {
    inner: F,
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
    stats: Arc<CacheStats>,
}

impl<F> CachingFetcher<F> {
    /// Creates the decorator. `ttl` must be at least one millisecond.
    pub fn new(inner: F, store: Arc<dyn KeyValueStore>, ttl: Duration) -> Result<Self> {
        if ttl < Duration::from_millis(1) {
            return Err(Error::InvalidArgument(format!(
                "cache ttl must be at least 1ms, got {:?}",
                ttl
            )));
        }

        Ok(Self {
            inner,
            store,
            ttl,
            stats: Arc::new(CacheStats::new()),
        })
    }

    /// Replaces the stats sink, e.g. with one shared with the API.
    pub fn with_stats(mut self, stats: Arc<CacheStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> &Arc<CacheStats> {
        &self.stats
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for CachingFetcher<F> {
    async fn fetch(&self, key: &str) -> Result<String> {
        if key.starts_with(COUNT_PREFIX) {
            return Err(Error::InvalidArgument(format!(
                "key '{}' collides with the access counter key space",
                key
            )));
        }

        if let Some(cached) = self.store.get(key).await? {
            self.stats.record_hit();
            debug!(key, "cache hit");
            return Ok(cached);
        }

        self.stats.record_miss();
        debug!(key, "cache miss");

        let value = match self.inner.fetch(key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "fetch failed, nothing cached");
                return Err(err);
            }
        };

        self.store.set_ex(key, &value, self.ttl).await?;
        self.stats.record_store();

        Ok(value)
    }
}
