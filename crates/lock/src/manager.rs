//! Lock manager: acquire, release, and guarded execution
//!
//! The store is the only arbiter. Acquisition retries a conditional set of a
//! fresh token through [`RetryExecutor`]; release hands the recorded token to
//! the store's compare-and-delete and never deletes unconditionally. The
//! local [`OwnershipRegistry`] only remembers which token to compare.
//!
//! # Caveats
//!
//! A lease can run out while the holder is still working. The store then
//! admits the next caller, and the original holder learns about it only at
//! release, as [`ReleaseOutcome::NotOwned`]. Pick a lease comfortably above
//! the critical section.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use warden_resilience::{RetryError, RetryExecutor, RetryOutcome};

use crate::config::{AcquireOptions, LockConfig};
use crate::context::LockContext;
use crate::error::{ConfigError, LockError, LockResult};
use crate::handle::{AcquireOutcome, LockHandle, LockState, OwnershipToken, ReleaseOutcome};
use crate::registry::OwnershipRegistry;
use crate::stats::{LockStats, StatsCollector};
use crate::store::LockStore;

/// Distributed mutual-exclusion lock over a [`LockStore`].
///
/// Cheap to clone; clones share the store, registry, and counters.
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn LockStore>,
    registry: Arc<OwnershipRegistry>,
    config: LockConfig,
    stats: Arc<StatsCollector>,
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("backend", &self.store.backend())
            .field("config", &self.config)
            .field("held", &self.registry.len())
            .finish()
    }
}

impl LockManager {
    /// Manager over `store` with default configuration.
    pub fn new(store: impl LockStore + 'static) -> Self {
        Self::from_parts(Arc::new(store), LockConfig::default())
    }

    /// Start building a manager.
    pub fn builder() -> LockManagerBuilder {
        LockManagerBuilder::new()
    }

    fn from_parts(store: Arc<dyn LockStore>, config: LockConfig) -> Self {
        Self {
            store,
            registry: Arc::new(OwnershipRegistry::new()),
            config,
            stats: Arc::new(StatsCollector::default()),
        }
    }

    /// Manager-wide defaults
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn LockStore> {
        &self.store
    }

    /// Acquire `key` for `context`.
    ///
    /// Every call generates a fresh token and retries a conditional set of
    /// it until the store accepts or the attempt budget is spent. Running
    /// out of attempts is [`AcquireOutcome::TimedOut`], not an error.
    ///
    /// # Errors
    ///
    /// - [`LockError::InvalidOptions`] for an empty key or a zero lease,
    ///   before the store is touched
    /// - [`LockError::Store`] as soon as the store fails; never retried
    /// - [`LockError::Interrupted`] when the context is cancelled before an
    ///   attempt or during a wait
    #[instrument(
        skip(self, context, options),
        fields(context = %context, backend = self.store.backend())
    )]
    pub async fn acquire(
        &self,
        context: &LockContext,
        key: &str,
        options: AcquireOptions,
    ) -> LockResult<AcquireOutcome> {
        validate_key(key)?;
        options.validate()?;

        let token = OwnershipToken::generate();
        let executor = RetryExecutor::new(options.retry_config())
            .with_cancellation(context.cancellation().clone());

        let store = &self.store;
        let token_ref = &token;
        let lease = options.lease;
        let result = executor
            .execute(
                move || async move {
                    let guard = OrphanGuard::arm(store, key, token_ref);
                    let accepted = store.set_if_absent(key, token_ref.as_str(), lease).await;
                    guard.disarm();
                    accepted
                },
                |accepted| *accepted,
                self.stats.as_ref(),
            )
            .await;

        match result {
            Ok(RetryOutcome::Completed { attempts, .. }) => {
                // No await between the store's reply and this write.
                if let Some(previous) = self.registry.record(context.id(), key, token.clone()) {
                    debug!(previous = %previous, "replaced older ownership entry");
                }
                info!(attempts, lease_ms = lease.as_millis() as u64, "lock acquired");
                Ok(AcquireOutcome::Acquired(LockHandle::new(
                    key.to_owned(),
                    token,
                    context.id(),
                    lease,
                    attempts,
                )))
            }
            Ok(RetryOutcome::Exhausted { attempts }) => {
                info!(attempts, "lock acquisition timed out");
                Ok(AcquireOutcome::TimedOut {
                    key: key.to_owned(),
                    attempts,
                })
            }
            Err(RetryError::Interrupted { attempts }) => {
                info!(attempts, "lock acquisition interrupted");
                Err(LockError::Interrupted {
                    key: key.to_owned(),
                    attempts,
                })
            }
            Err(RetryError::Operation { attempt, source }) => {
                self.stats.record_store_failure(true);
                warn!(attempt, error = %source, "store failed during acquisition");
                Err(LockError::store(key, source))
            }
        }
    }

    /// Acquire with the manager's configured defaults.
    pub async fn acquire_default(
        &self,
        context: &LockContext,
        key: &str,
    ) -> LockResult<AcquireOutcome> {
        self.acquire(context, key, self.config.acquire_options())
            .await
    }

    /// Release the lock `handle` proves.
    ///
    /// The store deletes the record only if it still holds the handle's
    /// token. The local entry is cleared before the store is called, so it
    /// is gone whatever the store answers.
    ///
    /// Returns [`ReleaseOutcome::NotOwned`] without touching the store when
    /// the handle's context has no entry for the key (already released) or
    /// has a newer one (the handle is stale; the newer entry is kept).
    ///
    /// # Errors
    ///
    /// [`LockError::Store`] if the compare-and-delete fails.
    #[instrument(
        skip(self, handle),
        fields(key = handle.key(), context = %handle.context(), backend = self.store.backend())
    )]
    pub async fn release(&self, handle: &LockHandle) -> LockResult<ReleaseOutcome> {
        let key = handle.key();
        let context = handle.context();

        if !self.registry.take_if(context, key, handle.token()) {
            if self.registry.token(context, key).is_some() {
                warn!("stale handle: key was re-acquired by the same context, keeping newer entry");
            } else {
                warn!("no local ownership entry, nothing to release");
            }
            self.stats.record_not_owned();
            return Ok(ReleaseOutcome::NotOwned);
        }

        match self
            .store
            .compare_and_delete(key, handle.token().as_str())
            .await
        {
            Ok(true) => {
                self.stats.record_release();
                debug!(
                    held_ms = handle.acquired_at().elapsed().as_millis() as u64,
                    "lock released"
                );
                Ok(ReleaseOutcome::Released)
            }
            Ok(false) => {
                self.stats.record_not_owned();
                warn!(
                    lease_ms = handle.lease().as_millis() as u64,
                    "lock no longer owned at release, lease expired or taken over"
                );
                Ok(ReleaseOutcome::NotOwned)
            }
            Err(source) => {
                self.stats.record_store_failure(false);
                warn!(error = %source, "store failed during release, local entry cleared");
                Err(LockError::store(key, source))
            }
        }
    }

    /// Whether the store still holds this context's token for `key`.
    ///
    /// Advisory only. The answer can be stale by the time it is read, and
    /// a replicated store may briefly show our token after a failover has
    /// already lost it. Never use this as proof of exclusivity.
    ///
    /// # Errors
    ///
    /// [`LockError::Store`] if the read fails.
    pub async fn check_ownership(&self, context: &LockContext, key: &str) -> LockResult<bool> {
        let Some(token) = self.registry.token(context.id(), key) else {
            return Ok(false);
        };
        let current = self
            .store
            .get(key)
            .await
            .map_err(|source| {
                self.stats.record_store_failure(false);
                LockError::store(key, source)
            })?;
        Ok(current.as_deref() == Some(token.as_str()))
    }

    /// Local view of `key` for `context`: [`LockState::Held`] while an
    /// entry exists, otherwise [`LockState::Unlocked`].
    pub fn local_state(&self, context: &LockContext, key: &str) -> LockState {
        if self.registry.token(context.id(), key).is_some() {
            LockState::Held
        } else {
            LockState::Unlocked
        }
    }

    /// Keys `context` believes it holds, sorted.
    pub fn held_keys(&self, context: &LockContext) -> Vec<String> {
        self.registry.held_keys(context.id())
    }

    /// Acquire `key`, run `work`, and release.
    ///
    /// Returns `None` without running `work` if the acquisition timed out.
    /// The release outcome is logged; a lost lock does not discard the
    /// work's output.
    ///
    /// # Errors
    ///
    /// Acquisition errors, and [`LockError::Store`] if the release fails
    /// after `work` ran.
    pub async fn with_lock<F, Fut, T>(
        &self,
        context: &LockContext,
        key: &str,
        options: AcquireOptions,
        work: F,
    ) -> LockResult<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let handle = match self.acquire(context, key, options).await? {
            AcquireOutcome::Acquired(handle) => handle,
            AcquireOutcome::TimedOut { attempts, .. } => {
                debug!(key, attempts, "skipping guarded work, lock not acquired");
                return Ok(None);
            }
        };

        let output = work().await;

        let outcome = self.release(&handle).await?;
        match outcome {
            ReleaseOutcome::Released => debug!(key, "guarded work finished"),
            ReleaseOutcome::NotOwned => {
                warn!(key, "guarded work outlived its lease");
            }
        }
        Ok(Some(output))
    }

    /// Counter snapshot
    pub fn stats(&self) -> LockStats {
        self.stats.snapshot()
    }

    /// Number of local ownership entries across all contexts.
    pub fn held_count(&self) -> usize {
        self.registry.len()
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &OwnershipRegistry {
        &self.registry
    }
}

fn validate_key(key: &str) -> LockResult<()> {
    if key.is_empty() {
        return Err(LockError::InvalidOptions("lock key must not be empty".into()));
    }
    Ok(())
}

/// Cleans up a conditional set whose future was dropped mid-flight.
///
/// If the acquire future is dropped while the store call is pending, the
/// store may still accept our token with nobody left to record it. The
/// guard then spawns a compare-and-delete for that token on the current
/// runtime. Deleting only on a token match makes this a no-op when the set
/// never landed.
struct OrphanGuard<'a> {
    store: &'a Arc<dyn LockStore>,
    key: &'a str,
    token: &'a OwnershipToken,
    armed: bool,
}

impl<'a> OrphanGuard<'a> {
    fn arm(store: &'a Arc<dyn LockStore>, key: &'a str, token: &'a OwnershipToken) -> Self {
        Self {
            store,
            key,
            token,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for OrphanGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(key = self.key, "acquire dropped outside a runtime, record left to expire");
            return;
        };

        let store = Arc::clone(self.store);
        let key = self.key.to_owned();
        let token = self.token.clone();
        debug!(key = %key, "acquire dropped mid-attempt, scheduling cleanup");
        runtime.spawn(async move {
            if let Err(error) = store.compare_and_delete(&key, token.as_str()).await {
                warn!(key = %key, %error, "orphan cleanup failed, record left to expire");
            }
        });
    }
}

/// Builder for [`LockManager`]
#[derive(Default)]
pub struct LockManagerBuilder {
    store: Option<Arc<dyn LockStore>>,
    config: LockConfig,
}

impl LockManagerBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store.
    #[must_use]
    pub fn with_store(mut self, store: impl LockStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set a store shared with other components.
    #[must_use]
    pub fn with_shared_store(mut self, store: Arc<dyn LockStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set manager-wide defaults.
    #[must_use]
    pub fn with_config(mut self, config: LockConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the manager.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingStore`] without a store, or a validation error
    /// from the configuration.
    pub fn build(self) -> Result<LockManager, ConfigError> {
        let store = self.store.ok_or(ConfigError::MissingStore)?;
        self.config.validate()?;
        Ok(LockManager::from_parts(store, self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{FlakyStore, StoreOp};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn options() -> AcquireOptions {
        AcquireOptions::new()
            .with_lease(Duration::from_secs(5))
            .with_max_attempts(3)
            .with_retry_delay(Duration::from_millis(500))
    }

    #[test]
    fn builder_requires_a_store() {
        let err = LockManager::builder().build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingStore));
    }

    #[test]
    fn builder_validates_config() {
        let config = LockConfig {
            lease: Duration::ZERO,
            ..LockConfig::default()
        };
        let err = LockManager::builder()
            .with_store(MemoryStore::new())
            .with_config(config)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_key_is_rejected_before_the_store() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let manager = LockManager::new(Arc::clone(&store));

        let err = manager
            .acquire(&LockContext::new(), "", options())
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::InvalidOptions(_)));
        assert_eq!(store.calls(StoreOp::SetIfAbsent), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_records_the_token_it_wrote() {
        let store = Arc::new(MemoryStore::new());
        let manager = LockManager::new(Arc::clone(&store));
        let ctx = LockContext::new();

        let handle = manager
            .acquire(&ctx, "job:1", options())
            .await
            .unwrap()
            .into_handle()
            .unwrap();

        assert_eq!(
            manager.registry().token(ctx.id(), "job:1").as_ref(),
            Some(handle.token())
        );
        assert_eq!(
            store.get("job:1").await.unwrap().as_deref(),
            Some(handle.token().as_str())
        );
        assert_eq!(store.ttl("job:1"), Some(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_are_fresh_per_acquisition() {
        let manager = LockManager::new(MemoryStore::new());
        let ctx = LockContext::new();

        let first = manager
            .acquire(&ctx, "k", options())
            .await
            .unwrap()
            .into_handle()
            .unwrap();
        assert!(manager.release(&first).await.unwrap().is_released());

        let second = manager
            .acquire(&ctx, "k", options())
            .await
            .unwrap()
            .into_handle()
            .unwrap();
        assert_ne!(first.token(), second.token());
    }

    #[tokio::test(start_paused = true)]
    async fn release_store_failure_still_clears_the_entry() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let manager = LockManager::new(Arc::clone(&store));
        let ctx = LockContext::new();

        let handle = manager
            .acquire(&ctx, "k", options())
            .await
            .unwrap()
            .into_handle()
            .unwrap();

        store.fail(StoreOp::CompareAndDelete, true);
        let err = manager.release(&handle).await.unwrap_err();
        assert!(err.is_store_unavailable());
        assert_eq!(manager.local_state(&ctx, "k"), LockState::Unlocked);
        assert_eq!(manager.stats().store_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_acquire_cleans_up_its_record() {
        let store = Arc::new(
            FlakyStore::new(MemoryStore::new()).with_latency(Duration::from_millis(100)),
        );
        let manager = LockManager::new(Arc::clone(&store));
        let ctx = LockContext::new();

        let attempt = manager.acquire(&ctx, "k", options());
        let timed = tokio::time::timeout(Duration::from_millis(50), attempt).await;
        assert!(timed.is_err());

        // The set landed before its reply was lost with the future.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.inner().get("k").await.unwrap(), None);
        assert_eq!(store.calls(StoreOp::CompareAndDelete), 1);
        assert_eq!(manager.local_state(&ctx, "k"), LockState::Unlocked);
    }
}
