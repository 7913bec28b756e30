//! Lock handles, tokens, and operation outcomes

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::context::ContextId;

/// Random value proving which acquisition wrote a store record.
///
/// Generated fresh for every acquisition and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnershipToken(Arc<str>);

impl OwnershipToken {
    /// Generate a new random token (UUID v4, hyphenated).
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().hyphenated().to_string()))
    }

    /// Token as stored
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnershipToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proof of a successful acquisition, required to release.
///
/// A handle is not a guard: dropping it does not release the lock. Pass it
/// to [`LockManager::release`](crate::LockManager::release), or use
/// [`LockManager::with_lock`](crate::LockManager::with_lock).
#[derive(Debug, Clone)]
#[must_use = "a held lock stays held until released or its lease expires"]
pub struct LockHandle {
    key: String,
    token: OwnershipToken,
    context: ContextId,
    lease: Duration,
    acquired_at: Instant,
    attempts: u32,
}

impl LockHandle {
    pub(crate) fn new(
        key: String,
        token: OwnershipToken,
        context: ContextId,
        lease: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            key,
            token,
            context,
            lease,
            acquired_at: Instant::now(),
            attempts,
        }
    }

    /// Locked key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Token written to the store
    pub fn token(&self) -> &OwnershipToken {
        &self.token
    }

    /// Context that acquired the lock
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Lease requested at acquisition
    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// Local instant the store accepted the record
    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    /// Attempts it took to acquire
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Lease time left by the local clock.
    ///
    /// Only an estimate: the store's clock decides when the record expires.
    pub fn remaining_lease(&self) -> Duration {
        self.lease.saturating_sub(self.acquired_at.elapsed())
    }
}

/// Per-key, per-context lock lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockState {
    /// No acquisition recorded
    Unlocked,
    /// Attempts in progress
    Acquiring,
    /// Store accepted our token
    Held,
    /// Released by us
    Released,
    /// Record expired or was taken over; found out at release
    Lost,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unlocked => "unlocked",
            Self::Acquiring => "acquiring",
            Self::Held => "held",
            Self::Released => "released",
            Self::Lost => "lost",
        };
        f.write_str(s)
    }
}

/// Result of an acquisition that did not fail
#[derive(Debug)]
#[must_use]
pub enum AcquireOutcome {
    /// The store accepted our token.
    Acquired(LockHandle),
    /// Every attempt found the key held. Not an error.
    TimedOut {
        /// Contended key
        key: String,
        /// Attempts made
        attempts: u32,
    },
}

impl AcquireOutcome {
    /// Returns `true` if the lock was acquired.
    pub fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired(_))
    }

    /// The handle, if acquired.
    pub fn into_handle(self) -> Option<LockHandle> {
        match self {
            Self::Acquired(handle) => Some(handle),
            Self::TimedOut { .. } => None,
        }
    }

    /// Attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Acquired(handle) => handle.attempts,
            Self::TimedOut { attempts, .. } => *attempts,
        }
    }
}

/// Result of a release that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub enum ReleaseOutcome {
    /// Our record was deleted.
    Released,
    /// We no longer owned the key; the store was left untouched.
    NotOwned,
}

impl ReleaseOutcome {
    /// Lifecycle state this release ended in
    pub fn final_state(self) -> LockState {
        match self {
            Self::Released => LockState::Released,
            Self::NotOwned => LockState::Lost,
        }
    }

    /// Returns `true` if the record was ours and is gone.
    pub fn is_released(self) -> bool {
        self == Self::Released
    }
}

impl fmt::Display for ReleaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Released => f.write_str("released"),
            Self::NotOwned => f.write_str("not owned"),
        }
    }
}
