//! Test helpers
//!
//! [`FlakyStore`] wraps any [`LockStore`] with per-operation fault injection,
//! call counters, and an optional reply latency.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::store::LockStore;

/// Store operations that can be counted or failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// [`LockStore::set_if_absent`]
    SetIfAbsent,
    /// [`LockStore::get`]
    Get,
    /// [`LockStore::compare_and_delete`]
    CompareAndDelete,
    /// [`LockStore::delete`]
    Delete,
}

impl StoreOp {
    const ALL: [Self; 4] = [
        Self::SetIfAbsent,
        Self::Get,
        Self::CompareAndDelete,
        Self::Delete,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            Self::SetIfAbsent => "set_if_absent",
            Self::Get => "get",
            Self::CompareAndDelete => "compare_and_delete",
            Self::Delete => "delete",
        }
    }
}

/// Store wrapper that fails on demand.
///
/// A failing operation returns [`StoreError::Unavailable`] without reaching
/// the inner store. With a latency set, the inner operation runs first and
/// the reply is delayed, the way a remote store applies a command before
/// its answer arrives.
#[derive(Debug, Default)]
pub struct FlakyStore<S> {
    inner: S,
    failing: [AtomicBool; 4],
    calls: [AtomicU32; 4],
    latency: Option<Duration>,
}

impl<S: LockStore> FlakyStore<S> {
    /// Wrap `inner` with no faults.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing: Default::default(),
            calls: Default::default(),
            latency: None,
        }
    }

    /// Delay every reply by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make `op` fail (or stop failing).
    pub fn fail(&self, op: StoreOp, enabled: bool) {
        self.failing[op.index()].store(enabled, Ordering::SeqCst);
    }

    /// Make every operation fail (or stop failing).
    pub fn fail_all(&self, enabled: bool) {
        for op in StoreOp::ALL {
            self.fail(op, enabled);
        }
    }

    /// Calls made to `op`, including failed ones.
    pub fn calls(&self, op: StoreOp) -> u32 {
        self.calls[op.index()].load(Ordering::SeqCst)
    }

    /// Wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn enter(&self, op: StoreOp) -> StoreResult<()> {
        self.calls[op.index()].fetch_add(1, Ordering::SeqCst);
        if self.failing[op.index()].load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(format!(
                "injected {} failure",
                op.name()
            )));
        }
        Ok(())
    }

    async fn reply<T>(&self, value: T) -> T {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        value
    }
}

#[async_trait]
impl<S: LockStore> LockStore for FlakyStore<S> {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        self.enter(StoreOp::SetIfAbsent)?;
        let result = self.inner.set_if_absent(key, value, ttl).await;
        self.reply(result).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.enter(StoreOp::Get)?;
        let result = self.inner.get(key).await;
        self.reply(result).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool> {
        self.enter(StoreOp::CompareAndDelete)?;
        let result = self.inner.compare_and_delete(key, expected).await;
        self.reply(result).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.enter(StoreOp::Delete)?;
        let result = self.inner.delete(key).await;
        self.reply(result).await
    }

    fn backend(&self) -> &'static str {
        self.inner.backend()
    }
}
