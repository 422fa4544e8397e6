//! Counting decorator: one INCR per call, whatever happens next.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::store::KeyValueStore;

pub(crate) const COUNT_PREFIX: &str = "count:";

/// Store key holding the access counter for `key`.
pub fn count_key(key: &str) -> String {
    format!("{}{}", COUNT_PREFIX, key)
}

/// Reads the access counter for `key` without touching it.
///
/// Keys that were never fetched report 0.
pub async fn access_count(store: &dyn KeyValueStore, key: &str) -> Result<i64> {
    match store.get(&count_key(key)).await? {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::WrongType(format!("counter for '{}' is not an integer", key))),
        None => Ok(0),
    }
}

// == Counting Fetcher ==
/// Increments `count:<key>` before delegating to the inner fetcher.
///
/// The increment happens first, so cache hits and failed fetches are
/// counted too. If the increment itself fails the inner fetcher is not called.
pub struct CountingFetcher<F> {
    inner: F,
    store: Arc<dyn KeyValueStore>,
}

impl<F> CountingFetcher<F> {
    pub fn new(inner: F, store: Arc<dyn KeyValueStore>) -> Self {
        Self { inner, store }
    }

    /// Bumps the counter for `key` and returns the new value.
    pub async fn increment_and_get(&self, key: &str) -> Result<i64> {
        self.store.incr(&count_key(key)).await
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for CountingFetcher<F> {
    async fn fetch(&self, key: &str) -> Result<String> {
        let count = self.increment_and_get(key).await?;
        debug!(key, count, "access counted");
        self.inner.fetch(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::ScriptedFetcher;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn counting() -> (CountingFetcher<ScriptedFetcher>, Arc<dyn KeyValueStore>) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        (
            CountingFetcher::new(ScriptedFetcher::default(), store.clone()),
            store,
        )
    }

    #[test]
    fn test_count_key_format() {
        assert_eq!(count_key("http://example.com"), "count:http://example.com");
    }

    #[tokio::test]
    async fn test_every_call_counted() {
        let (fetcher, store) = counting();

        for _ in 0..4 {
            fetcher.fetch("http://example.com").await.unwrap();
        }

        assert_eq!(fetcher.inner().calls(), 4);
        assert_eq!(access_count(store.as_ref(), "http://example.com").await.unwrap(), 4);
        assert_eq!(
            store.get("count:http://example.com").await.unwrap(),
            Some("4".to_string())
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_counted() {
        let (fetcher, store) = counting();

        assert!(fetcher.fetch("fail-here").await.is_err());
        assert_eq!(access_count(store.as_ref(), "fail-here").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unfetched_key_counts_zero() {
        let (_, store) = counting();
        assert_eq!(access_count(store.as_ref(), "never").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_increment_failure_skips_fetch() {
        let (fetcher, store) = counting();
        store
            .set_ex(&count_key("k"), "not-a-number", Duration::from_secs(60))
            .await
            .unwrap();

        let result = fetcher.fetch("k").await;

        assert!(matches!(result, Err(Error::WrongType(_))));
        assert_eq!(fetcher.inner().calls(), 0);
    }

    #[tokio::test]
    async fn test_increment_and_get() {
        let (fetcher, _) = counting();

        assert_eq!(fetcher.increment_and_get("k").await.unwrap(), 1);
        assert_eq!(fetcher.increment_and_get("k").await.unwrap(), 2);
        assert_eq!(fetcher.increment_and_get("other").await.unwrap(), 1);
    }
}
