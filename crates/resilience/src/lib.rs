//! # Warden Resilience
//!
//! A bounded retry-with-backoff driver. It runs an async operation, checks
//! the result against a completion predicate, and waits out the rest of a
//! fixed period between attempts. It knows nothing about locks; the lock
//! manager in `warden-lock` is just one caller.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::convert::Infallible;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//! use warden_resilience::{NoopHooks, RetryConfig, RetryExecutor, RetryOutcome};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let calls = AtomicU32::new(0);
//! let executor = RetryExecutor::new(RetryConfig::new(5, Duration::from_millis(10)));
//!
//! let outcome = executor
//!     .execute(
//!         || async { Ok::<_, Infallible>(calls.fetch_add(1, Ordering::SeqCst) + 1) },
//!         |n| *n == 3,
//!         &NoopHooks,
//!     )
//!     .await
//!     .unwrap();
//!
//! assert_eq!(outcome, RetryOutcome::Completed { value: 3, attempts: 3 });
//! # }
//! ```

#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod cancellation;
mod error;
pub mod retry;

pub use cancellation::{Cancelled, sleep_or_cancel};
pub use error::{ConfigError, ConfigResult, RetryError};
pub use retry::{
    MAX_DELAY, NoopHooks, RetryConfig, RetryExecutor, RetryHooks, RetryOutcome,
    UNBOUNDED_ATTEMPTS, retry_until,
};

/// Re-exported so callers can build tokens without naming `tokio-util`.
pub use tokio_util::sync::CancellationToken;
