//! Redis Store Module
//!
//! Key-value store backed by a Redis server over a multiplexed connection.

use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use tracing::info;

use crate::config::redact_url;
use crate::error::{Error, Result};
use crate::store::KeyValueStore;

// == Redis Store ==
/// Redis-backed store.
///
/// The multiplexed connection is cheap to clone; each command clones it and
/// Redis itself provides SETEX/INCR atomicity.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    /// Server URL with any password masked
    url: String,
}

impl RedisStore {
    /// Connects to the server at `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        let url = redact_url(url);
        info!("Connected to Redis at {}", url);

        Ok(Self { conn, url })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();

        // SETEX for whole seconds, PSETEX when sub-second precision matters
        if ttl.subsec_nanos() == 0 && ttl.as_secs() > 0 {
            let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        } else {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            if millis == 0 {
                return Err(Error::InvalidArgument(
                    "expiration must be at least one millisecond".to_string(),
                ));
            }
            let _: () = conn.pset_ex(key, value, millis).await?;
        }
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        let count: i64 = conn.incr(key, 1i64).await?;
        Ok(count)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("url", &self.url).finish()
    }
}
