//! Store Module
//!
//! Key-value store abstraction used by the page cache, with an in-memory
//! backend and a Redis backend.

mod entry;
mod memory;
mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{Config, StoreBackend};
use crate::error::Result;

// Re-export public types
pub use entry::StoreEntry;
pub use memory::{KeySpace, MemoryStore};
pub use redis_store::RedisStore;

// == Key-Value Store ==
/// The three primitives the cache and counter need from a store.
///
/// `set_ex` overwrites and sets the expiration in one step. `incr` creates a
/// missing key from 0 and must not lose increments under concurrent callers.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// GET: returns the live value, or None when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// SETEX: stores `value` under `key`, expiring after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// INCR: atomically increments the integer at `key` and returns it.
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Opens the store selected by the configuration.
///
/// Returns the shared handle plus the concrete memory store when that backend
/// is in use, so the caller can attach the expiry sweeper to it.
pub async fn open_store(config: &Config) -> Result<(Arc<dyn KeyValueStore>, Option<MemoryStore>)> {
    match &config.store {
        StoreBackend::Memory => {
            let store = MemoryStore::new();
            Ok((Arc::new(store.clone()), Some(store)))
        }
        StoreBackend::Redis(url) => {
            let store = RedisStore::connect(url).await?;
            Ok((Arc::new(store), None))
        }
    }
}
