//! Error types for retry execution

use std::time::Duration;

use thiserror::Error;

/// Errors that end a retry loop before it runs to exhaustion.
///
/// Running out of attempts is *not* an error; see
/// [`RetryOutcome::Exhausted`](crate::RetryOutcome::Exhausted).
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The wait between attempts was cancelled.
    ///
    /// The loop is abandoned immediately; no further attempt is made with a
    /// truncated wait.
    #[error("retry interrupted after {attempts} attempt(s)")]
    Interrupted {
        /// Attempts completed before the interruption
        attempts: u32,
    },

    /// The operation itself failed; failures are never retried.
    #[error("operation failed on attempt {attempt}")]
    Operation {
        /// 1-based attempt that produced the error
        attempt: u32,
        /// Error returned by the operation
        #[source]
        source: E,
    },
}

impl<E> RetryError<E> {
    /// Returns `true` if the loop stopped because its wait was cancelled.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    /// Number of attempts made before the loop stopped.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Interrupted { attempts } => *attempts,
            Self::Operation { attempt, .. } => *attempt,
        }
    }

    /// Unwraps the operation error, if that is what stopped the loop.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation { source, .. } => Some(source),
            Self::Interrupted { .. } => None,
        }
    }
}

/// Invalid retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The inter-attempt delay is longer than the executor accepts.
    #[error("retry delay {delay:?} exceeds the maximum of {max:?}")]
    DelayTooLong {
        /// Requested delay
        delay: Duration,
        /// Largest accepted delay
        max: Duration,
    },
}

/// Result alias for configuration validation
pub type ConfigResult<T> = Result<T, ConfigError>;
