//! Bounded retry with fixed-period backoff
//!
//! [`RetryExecutor`] drives an async operation until a caller-supplied
//! completion predicate accepts its result or the attempt budget runs out.
//! The executor knows nothing about what it is retrying: the lock manager
//! plugs in a conditional store write, tests plug in counters.
//!
//! The wait after an incomplete attempt is `delay - elapsed`, where
//! `elapsed` is the time the attempt itself took. One loop iteration
//! therefore lasts roughly `delay` no matter how slow the operation is,
//! instead of stacking the delay on top of the work.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cancellation::sleep_or_cancel;
use crate::error::{ConfigError, ConfigResult, RetryError};

/// Attempt budget used for "keep waiting" policies.
///
/// A finite bound keeps every loop terminating even when the caller asked
/// to wait indefinitely.
pub const UNBOUNDED_ATTEMPTS: u32 = i32::MAX as u32;

/// Longest inter-attempt delay a [`RetryConfig`] accepts.
pub const MAX_DELAY: Duration = Duration::from_secs(300);

/// Attempt budget and inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetryConfig {
    /// Maximum number of attempts. `0` behaves like `1`: one attempt, no wait.
    pub max_attempts: u32,

    /// Target period of one attempt plus its following wait
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

impl RetryConfig {
    /// Create a config with an explicit budget and delay.
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A single attempt and no wait.
    pub const fn fail_fast() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Retry with `delay` until the [`UNBOUNDED_ATTEMPTS`] budget is spent.
    pub const fn unbounded(delay: Duration) -> Self {
        Self::new(UNBOUNDED_ATTEMPTS, delay)
    }

    /// Attempts the executor will actually make.
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Upper bound on the time spent waiting between attempts.
    pub fn max_total_wait(&self) -> Duration {
        self.delay
            .saturating_mul(self.effective_attempts().saturating_sub(1))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.delay > MAX_DELAY {
            return Err(ConfigError::DelayTooLong {
                delay: self.delay,
                max: MAX_DELAY,
            });
        }
        Ok(())
    }
}

/// Result of a retry loop that ran to completion or exhaustion.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum RetryOutcome<T> {
    /// The predicate accepted a result.
    Completed {
        /// Accepted result
        value: T,
        /// 1-based attempt that produced it
        attempts: u32,
    },
    /// Every attempt produced an incomplete result.
    Exhausted {
        /// Attempts made
        attempts: u32,
    },
}

impl<T> RetryOutcome<T> {
    /// The accepted value, or `None` when the budget ran out.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Completed { value, .. } => Some(value),
            Self::Exhausted { .. } => None,
        }
    }

    /// Attempts made by the loop.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Completed { attempts, .. } | Self::Exhausted { attempts } => *attempts,
        }
    }

    /// Returns `true` if a result was accepted.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Callbacks fired at the loop's decision points.
///
/// Every method defaults to a no-op.
pub trait RetryHooks<T>: Send + Sync {
    /// An attempt returned a result the predicate rejected.
    fn on_attempt_incomplete(&self, attempt: u32, elapsed: Duration) {
        let _ = (attempt, elapsed);
    }

    /// The predicate accepted `value` on attempt `attempts`.
    fn on_success(&self, value: &T, attempts: u32) {
        let _ = (value, attempts);
    }

    /// The budget ran out.
    fn on_exhausted(&self, attempts: u32) {
        let _ = attempts;
    }

    /// Cancellation stopped the loop.
    fn on_interrupted(&self, attempts: u32) {
        let _ = attempts;
    }
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl<T> RetryHooks<T> for NoopHooks {}

/// Drives an operation until it completes, fails, is cancelled, or runs out
/// of attempts.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
    cancellation: Option<CancellationToken>,
}

impl RetryExecutor {
    /// Create an executor for `config`.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            cancellation: None,
        }
    }

    /// Abort the loop when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Get configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until `is_complete` accepts its output.
    ///
    /// An `Err` from the operation ends the loop at once; errors are
    /// surfaced, never retried. Cancellation is observed before every
    /// attempt and during every wait, but never while an attempt is in
    /// flight, so an attempt that started always has its result delivered.
    pub async fn execute<T, E, F, Fut, P, H>(
        &self,
        mut operation: F,
        is_complete: P,
        hooks: &H,
    ) -> Result<RetryOutcome<T>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&T) -> bool,
        H: RetryHooks<T> + ?Sized,
    {
        let max_attempts = self.config.effective_attempts();
        let token = self.cancellation.as_ref();
        let mut attempt = 0;

        loop {
            if token.is_some_and(CancellationToken::is_cancelled) {
                hooks.on_interrupted(attempt);
                return Err(RetryError::Interrupted { attempts: attempt });
            }

            attempt += 1;
            let started = Instant::now();
            let value = operation()
                .await
                .map_err(|source| RetryError::Operation { attempt, source })?;

            if is_complete(&value) {
                debug!(attempt, "attempt completed");
                hooks.on_success(&value, attempt);
                return Ok(RetryOutcome::Completed {
                    value,
                    attempts: attempt,
                });
            }

            let elapsed = started.elapsed();
            hooks.on_attempt_incomplete(attempt, elapsed);

            if attempt >= max_attempts {
                warn!(
                    attempts = attempt,
                    delay_ms = self.config.delay.as_millis() as u64,
                    "retry budget exhausted"
                );
                hooks.on_exhausted(attempt);
                return Ok(RetryOutcome::Exhausted { attempts: attempt });
            }

            let wait = self.config.delay.saturating_sub(elapsed);
            if wait.is_zero() && !self.config.delay.is_zero() {
                info!(
                    attempt,
                    elapsed_ms = elapsed.as_millis() as u64,
                    delay_ms = self.config.delay.as_millis() as u64,
                    "attempt outlasted the retry delay, retrying without waiting"
                );
            } else {
                debug!(
                    attempt,
                    elapsed_ms = elapsed.as_millis() as u64,
                    wait_ms = wait.as_millis() as u64,
                    "attempt incomplete, backing off"
                );
            }

            if sleep_or_cancel(wait, token).await.is_err() {
                hooks.on_interrupted(attempt);
                return Err(RetryError::Interrupted { attempts: attempt });
            }
        }
    }
}

/// Standalone retry with no hooks and no cancellation.
///
/// Returns the accepted value, or `None` once the budget is spent.
pub async fn retry_until<T, E, F, Fut, P>(
    config: RetryConfig,
    operation: F,
    is_complete: P,
) -> Result<Option<T>, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    RetryExecutor::new(config)
        .execute(operation, is_complete, &NoopHooks)
        .await
        .map(RetryOutcome::into_value)
}
