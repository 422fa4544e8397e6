//! Fetch Module
//!
//! The `Fetcher` capability and the decorators layered over it:
//! [`CountingFetcher`] counts every call, [`CachingFetcher`] reuses results
//! for a TTL. [`build_page_fetcher`] composes them counter-first.

mod caching;
mod counting;
mod http;
mod stats;


use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::store::KeyValueStore;

// Re-export public types
pub use caching::CachingFetcher;
pub use counting::{access_count, count_key, CountingFetcher};
pub use http::{FetchConfig, HttpFetcher};
pub use stats::{CacheStats, StatsSnapshot};

// == Fetcher ==
/// Turns a request key (a URL for pages) into a value.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<String>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, key: &str) -> Result<String> {
        (**self).fetch(key).await
    }
}

/// The composed page fetcher: count, then consult the cache, then fetch.
pub type PageFetcher<F> = CountingFetcher<CachingFetcher<F>>;

/// Wraps `inner` so every call is counted and results are cached for `ttl`.
///
/// Both decorators share `store`; `stats` receives the cache's hit/miss
/// accounting.
pub fn build_page_fetcher<F: Fetcher>(
    inner: F,
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
    stats: Arc<CacheStats>,
) -> Result<PageFetcher<F>> {
    let cached = CachingFetcher::new(inner, store.clone(), ttl)?.with_stats(stats);
    Ok(CountingFetcher::new(cached, store))
}
