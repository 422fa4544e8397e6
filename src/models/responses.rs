//! Response DTOs for the page cache API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::fetch::StatsSnapshot;

/// Response body for `GET /page`
#[derive(Debug, Clone, Serialize)]
pub struct PageResponse {
    /// The requested URL
    pub url: String,
    /// Page body, fresh or cached
    pub content: String,
}

impl PageResponse {
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
        }
    }
}

/// Response body for `GET /count`
#[derive(Debug, Clone, Serialize)]
pub struct CountResponse {
    /// The requested URL
    pub url: String,
    /// Times the URL has been requested through `/page`
    pub count: i64,
}

impl CountResponse {
    pub fn new(url: impl Into<String>, count: i64) -> Self {
        Self {
            url: url.into(),
            count,
        }
    }
}

/// Response body for `GET /stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of fetched pages written to the store
    pub stores: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<StatsSnapshot> for StatsResponse {
    fn from(stats: StatsSnapshot) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            stores: stats.stores,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Store backend in use
    pub store: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(store: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            store: store.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
