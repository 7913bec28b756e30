//! Error types for lock operations
//!
//! Only real faults are errors here. Losing a race for a key is reported
//! through [`AcquireOutcome::TimedOut`](crate::AcquireOutcome::TimedOut) and
//! releasing a lock that is no longer ours through
//! [`ReleaseOutcome::NotOwned`](crate::ReleaseOutcome::NotOwned); callers
//! branch on those instead of matching errors.

use std::error::Error as StdError;

use thiserror::Error;

/// Failures reported by a [`LockStore`](crate::LockStore) backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or did not answer.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// What went wrong
        message: String,
        /// Underlying client error, if any
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// The store refused the command (for example an invalid expiry).
    #[error("store rejected {command}: {reason}")]
    Rejected {
        /// Command that was refused
        command: &'static str,
        /// Reason given by the store
        reason: String,
    },
}

impl StoreError {
    /// Create an [`StoreError::Unavailable`] without a source.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create a [`StoreError::Rejected`].
    pub fn rejected(command: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            command,
            reason: reason.into(),
        }
    }
}

#[cfg(feature = "redis")]
impl StoreError {
    /// Classify a Redis client error raised while running `command`.
    ///
    /// Transport failures are [`StoreError::Unavailable`]; anything the
    /// server or client refused is [`StoreError::Rejected`].
    pub(crate) fn from_redis(command: &'static str, err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
            Self::Unavailable {
                message: format!("{command} failed"),
                source: Some(Box::new(err)),
            }
        } else {
            Self::rejected(command, err.to_string())
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::from_redis("redis", err)
    }
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the [`LockManager`](crate::LockManager)
#[derive(Debug, Error)]
pub enum LockError {
    /// The store failed while working on `key`. Never retried, never
    /// reported as "not acquired".
    #[error("store failure on lock '{key}'")]
    Store {
        /// Lock key being worked on
        key: String,
        /// Backend failure
        #[source]
        source: StoreError,
    },

    /// The wait between acquisition attempts was cancelled.
    #[error("acquisition of lock '{key}' interrupted after {attempts} attempt(s)")]
    Interrupted {
        /// Lock key being acquired
        key: String,
        /// Attempts made before cancellation
        attempts: u32,
    },

    /// The key or acquisition options were rejected before touching the store.
    #[error("invalid lock request: {0}")]
    InvalidOptions(String),
}

impl LockError {
    /// Returns `true` if the store itself failed.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::Store { .. })
    }

    /// Returns `true` if cancellation stopped an acquisition.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    pub(crate) fn store(key: &str, source: StoreError) -> Self {
        Self::Store {
            key: key.to_owned(),
            source,
        }
    }
}

/// Result alias for lock operations
pub type LockResult<T> = Result<T, LockError>;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration text could not be parsed.
    #[error("failed to parse lock configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid lock configuration: {0}")]
    Invalid(String),

    /// A builder was finished without a store.
    #[error("a lock store is required")]
    MissingStore,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn store_error_messages() {
        assert_eq!(
            StoreError::unavailable("connection refused").to_string(),
            "store unavailable: connection refused"
        );
        assert_eq!(
            StoreError::rejected("SET", "invalid expire time").to_string(),
            "store rejected SET: invalid expire time"
        );
    }

    #[test]
    fn lock_error_classification() {
        let err = LockError::store("job:42", StoreError::unavailable("down"));
        assert!(err.is_store_unavailable());
        assert!(!err.is_interrupted());
        assert_eq!(err.to_string(), "store failure on lock 'job:42'");
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("store unavailable: down")
        );

        let err = LockError::Interrupted {
            key: "job:42".into(),
            attempts: 2,
        };
        assert!(err.is_interrupted());
        assert!(!err.is_store_unavailable());
    }

    #[cfg(feature = "redis")]
    #[test]
    fn redis_transport_errors_are_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = StoreError::from_redis("SET", redis::RedisError::from(io));
        assert!(matches!(err, StoreError::Unavailable { .. }));
        assert_eq!(err.to_string(), "store unavailable: SET failed");
        assert!(err.source().is_some());
    }

    #[cfg(feature = "redis")]
    #[test]
    fn redis_refusals_are_rejected() {
        let refused = redis::Client::open("redis://localhost:notaport").unwrap_err();
        let err = StoreError::from(refused);
        assert!(matches!(err, StoreError::Rejected { command: "redis", .. }));
    }
}
