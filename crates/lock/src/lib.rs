//! # Warden Lock
//!
//! Owner-verified, lease-based mutual exclusion across processes that share
//! a key-value store.
//!
//! - **Acquire**: a fresh random token is written with `set_if_absent` and a
//!   lease, retried through [`warden_resilience::RetryExecutor`] until the
//!   store accepts it or the attempt budget runs out.
//! - **Release**: the store deletes the record only if it still holds our
//!   token, so a lock that expired and was taken over is never deleted from
//!   under its new owner.
//! - **Contexts**: ownership is filed per [`LockContext`], passed explicitly
//!   to every call. One context may hold many keys.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use warden_lock::{AcquireOptions, LockContext, LockManager, MemoryStore, ReleaseOutcome};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), warden_lock::LockError> {
//! let manager = LockManager::new(MemoryStore::new());
//! let ctx = LockContext::named("worker-1");
//! let options = AcquireOptions::new()
//!     .with_lease(Duration::from_secs(5))
//!     .with_max_attempts(3);
//!
//! if let Some(handle) = manager.acquire(&ctx, "job:42", options).await?.into_handle() {
//!     // ... critical section ...
//!     assert_eq!(manager.release(&handle).await?, ReleaseOutcome::Released);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod context;
mod error;
pub mod handle;
mod manager;
pub mod registry;
mod stats;
pub mod store;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::{
    AcquireOptions, ContentionPolicy, DEFAULT_LEASE, DEFAULT_RETRY_DELAY, LockConfig, MAX_LEASE,
};
pub use context::{ContextId, LockContext};
pub use error::{ConfigError, LockError, LockResult, StoreError, StoreResult};
pub use handle::{AcquireOutcome, LockHandle, LockState, OwnershipToken, ReleaseOutcome};
pub use manager::{LockManager, LockManagerBuilder};
pub use registry::OwnershipRegistry;
pub use stats::LockStats;
pub use store::{LockStore, MemoryStore};
#[cfg(feature = "redis")]
pub use store::RedisStore;

pub use warden_resilience::UNBOUNDED_ATTEMPTS;
