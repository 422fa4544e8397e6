//! Memory Store Module
//!
//! In-process key space with TTL expiration and Redis-style INCR.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::store::{KeyValueStore, StoreEntry};

// == Key Space ==
/// Plain key space; callers provide the locking.
#[derive(Debug, Default)]
pub struct KeySpace {
    entries: HashMap<String, StoreEntry>,
}

impl KeySpace {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Get ==
    /// Retrieves a live value by key.
    ///
    /// Expired entries are removed on the way and read as absent.
    pub fn get(&mut self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    // == Set With Expiration ==
    /// Stores a value, overwriting any previous value and its TTL.
    pub fn set_ex(&mut self, key: String, value: String, ttl: Duration) {
        self.entries.insert(key, StoreEntry::expiring(value, ttl));
    }

    // == Increment ==
    /// Increments the integer at `key`, starting from 0 when absent.
    ///
    /// An existing TTL is kept. Non-integer values and overflow are errors,
    /// as with Redis.
    pub fn incr(&mut self, key: &str) -> Result<i64> {
        let live = self.get(key);

        let current = match live {
            Some(text) => text.parse::<i64>().map_err(|_| {
                Error::WrongType(format!("value at '{}' is not an integer", key))
            })?,
            None => 0,
        };

        let next = current
            .checked_add(1)
            .ok_or_else(|| Error::WrongType(format!("increment of '{}' would overflow", key)))?;

        match self.entries.get_mut(key) {
            Some(entry) => entry.value = next.to_string(),
            None => {
                self.entries
                    .insert(key.to_string(), StoreEntry::persistent(next.to_string()));
            }
        }

        Ok(next)
    }

    // == Cleanup Expired ==
    /// Removes all expired entries.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before - self.entries.len()
    }

    // == Length ==
    /// Returns the number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Memory Store ==
/// Shared, thread-safe handle over a [`KeySpace`].
///
/// Every mutating command takes the write lock, which makes SETEX and INCR
/// atomic with respect to each other.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<KeySpace>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes expired entries, returning how many were dropped.
    pub async fn cleanup_expired(&self) -> usize {
        self.inner.write().await.cleanup_expired()
    }

    /// Number of entries currently held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        // Write lock: reads may drop an expired entry
        Ok(self.inner.write().await.get(key))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Err(Error::InvalidArgument(
                "expiration must be a positive duration".to_string(),
            ));
        }
        self.inner
            .write()
            .await
            .set_ex(key.to_string(), value.to_string(), ttl);
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.inner.write().await.incr(key)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
