//! Page Cache - counted, TTL-cached page fetching
//!
//! Wraps a fetch in an access counter and an expiring cache, both backed by
//! a key-value store (in-memory or Redis). Also provides small query helpers
//! over document collections.

pub mod api;
pub mod config;
pub mod documents;
pub mod error;
pub mod fetch;
pub mod models;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use error::{Error, Result};
pub use fetch::{build_page_fetcher, CachingFetcher, CountingFetcher, Fetcher, HttpFetcher};
pub use store::{KeyValueStore, MemoryStore, RedisStore};
pub use tasks::spawn_cleanup_task;
