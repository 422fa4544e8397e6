//! API Handlers
//!
//! HTTP request handlers for each page cache endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::{Error, Result};
use crate::fetch::{access_count, build_page_fetcher, CacheStats, Fetcher};
use crate::models::{CountResponse, HealthResponse, PageQuery, PageResponse, StatsResponse};
use crate::store::KeyValueStore;

/// Application state shared across all handlers.
///
/// Holds the composed page fetcher and the store handle it writes to.
#[derive(Clone)]
pub struct AppState {
    /// Counting, caching page fetcher
    pub fetcher: Arc<dyn Fetcher>,
    /// Store shared with the fetcher, read by `/count`
    pub store: Arc<dyn KeyValueStore>,
    /// Hit/miss counters fed by the fetcher
    pub stats: Arc<CacheStats>,
}

impl AppState {
    /// Wraps `origin` in the counter and cache, both backed by `store`.
    pub fn new<F>(origin: F, store: Arc<dyn KeyValueStore>, ttl: Duration) -> Result<Self>
    where
        F: Fetcher + 'static,
    {
        let stats = Arc::new(CacheStats::new());
        let fetcher = build_page_fetcher(origin, store.clone(), ttl, stats.clone())?;

        Ok(Self {
            fetcher: Arc::new(fetcher),
            store,
            stats,
        })
    }
}

fn validated(query: PageQuery) -> Result<PageQuery> {
    match query.validate() {
        Some(error_msg) => Err(Error::InvalidArgument(error_msg)),
        None => Ok(query),
    }
}

/// Handler for GET /page?url=
///
/// Counts the request, then serves the page from cache or fetches it.
pub async fn page_handler(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageResponse>> {
    let query = validated(query)?;

    let content = state.fetcher.fetch(&query.url).await?;

    Ok(Json(PageResponse::new(query.url, content)))
}

/// Handler for GET /count?url=
///
/// Reports how many times the URL has been requested.
pub async fn count_handler(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CountResponse>> {
    let query = validated(query)?;

    let count = access_count(state.store.as_ref(), &query.url).await?;

    Ok(Json(CountResponse::new(query.url, count)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.stats.snapshot()))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.store.backend_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::ScriptedFetcher;
    use crate::store::MemoryStore;

    fn test_state() -> AppState {
        AppState::new(
            ScriptedFetcher::default(),
            Arc::new(MemoryStore::new()),
            Duration::from_secs(10),
        )
        .unwrap()
    }

    fn page(url: &str) -> Query<PageQuery> {
        Query(PageQuery {
            url: url.to_string(),
        })
    }

    #[tokio::test]
    async fn test_page_then_count() {
        let state = test_state();

        let first = page_handler(State(state.clone()), page("http://example.com"))
            .await
            .unwrap();
        let second = page_handler(State(state.clone()), page("http://example.com"))
            .await
            .unwrap();
        assert_eq!(first.content, second.content);

        let count = count_handler(State(state.clone()), page("http://example.com"))
            .await
            .unwrap();
        assert_eq!(count.count, 2);

        let stats = stats_handler(State(state)).await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_count_unknown_url_is_zero() {
        let state = test_state();

        let count = count_handler(State(state), page("http://never.example"))
            .await
            .unwrap();
        assert_eq!(count.count, 0);
    }

    #[tokio::test]
    async fn test_page_invalid_url() {
        let state = test_state();

        let result = page_handler(State(state.clone()), page("not a url")).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        // Rejected before reaching the counter
        let count = access_count(state.store.as_ref(), "not a url").await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler(State(test_state())).await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.store, "memory");
    }

    #[test]
    fn test_state_rejects_zero_ttl() {
        let result = AppState::new(
            ScriptedFetcher::default(),
            Arc::new(MemoryStore::new()),
            Duration::ZERO,
        );
        assert!(result.is_err());
    }
}
