//! Store adapter contract and backends
//!
//! The lock only needs four single-key primitives. Each must be atomic on
//! the store side; nothing local can stand in for that, because the
//! competing callers live in other processes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

/// Atomic single-key operations the lock manager is built on.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Set `key` to `value` with a `ttl` expiry, only if `key` is absent.
    ///
    /// Value and expiry are applied as one step. Returns `true` if the write
    /// happened.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Current value of `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Delete `key` only if its current value equals `expected`.
    ///
    /// Must run as one server-side step; a client-side read followed by a
    /// delete can remove a record another owner wrote in between.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool>;

    /// Delete `key` unconditionally. The lock manager never calls this.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str {
        "custom"
    }
}

#[async_trait]
impl<S: LockStore + ?Sized> LockStore for Arc<S> {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        (**self).set_if_absent(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool> {
        (**self).compare_and_delete(key, expected).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        (**self).delete(key).await
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}
