//! Redis lock store
//!
//! Acquisition is a single `SET key token NX PX lease` so the value and its
//! expiry land together. Release runs a Lua script that compares and deletes
//! on the server; Redis executes scripts atomically, so no other client can
//! write between the read and the delete.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use tracing::debug;

use super::LockStore;
use crate::error::{StoreError, StoreResult};

const COMPARE_AND_DELETE: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// [`LockStore`] backed by a single Redis deployment
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    compare_and_delete: Script,
}

impl RedisStore {
    /// Connect to `url` (`redis://` or `rediss://`).
    pub async fn connect(url: &str) -> StoreResult<Self> {
        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(StoreError::rejected(
                "connect",
                "Redis URL must start with redis:// or rediss://",
            ));
        }

        let client = Client::open(url).map_err(|e| StoreError::from_redis("connect", e))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::from_redis("connect", e))?;
        debug!(url, "connected to redis lock store");
        Ok(Self::from_manager(manager))
    }

    /// Wrap an existing connection manager.
    pub fn from_manager(manager: ConnectionManager) -> Self {
        Self {
            manager,
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
        }
    }
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

fn expiry_millis(ttl: Duration) -> StoreResult<i64> {
    match i64::try_from(ttl.as_millis()) {
        Ok(0) => Err(StoreError::rejected("SET", "expiry must be at least 1ms")),
        Ok(ms) => Ok(ms),
        Err(_) => Err(StoreError::rejected("SET", "expiry out of range")),
    }
}

#[async_trait]
impl LockStore for RedisStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let px = expiry_millis(ttl)?;
        let mut conn = self.manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(px)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::from_redis("SET", e))?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::from_redis("GET", e))?;
        Ok(value)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let mut conn = self.manager.clone();
        let deleted: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::from_redis("EVALSHA", e))?;
        Ok(deleted == 1)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.manager.clone();
        let deleted: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::from_redis("DEL", e))?;
        Ok(deleted > 0)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
