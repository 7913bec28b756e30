//! Lock manager counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use warden_resilience::RetryHooks;

/// Point-in-time snapshot of a manager's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStats {
    /// Successful acquisitions
    pub acquisitions: u64,
    /// Acquisitions that ran out of attempts
    pub timeouts: u64,
    /// Acquisitions stopped by cancellation
    pub interrupted: u64,
    /// Releases that deleted our record
    pub releases: u64,
    /// Releases that found the lock no longer ours
    pub not_owned: u64,
    /// Store calls that failed
    pub store_failures: u64,
    /// Conditional-set attempts, including failed ones
    pub attempts: u64,
}

impl LockStats {
    /// Share of finished acquisitions that succeeded, in `0.0..=1.0`.
    pub fn success_rate(&self) -> f64 {
        let finished = self.acquisitions + self.timeouts + self.interrupted;
        if finished == 0 {
            return 0.0;
        }
        self.acquisitions as f64 / finished as f64
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCollector {
    acquisitions: AtomicU64,
    timeouts: AtomicU64,
    interrupted: AtomicU64,
    releases: AtomicU64,
    not_owned: AtomicU64,
    store_failures: AtomicU64,
    attempts: AtomicU64,
}

impl StatsCollector {
    pub(crate) fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_not_owned(&self) {
        self.not_owned.fetch_add(1, Ordering::Relaxed);
    }

    /// A store call failed; `during_attempt` marks a failed conditional set.
    pub(crate) fn record_store_failure(&self, during_attempt: bool) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
        if during_attempt {
            self.attempts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> LockStats {
        LockStats {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            interrupted: self.interrupted.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            not_owned: self.not_owned.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
        }
    }
}

/// Acquisition loop hooks feeding the collector
impl RetryHooks<bool> for StatsCollector {
    fn on_attempt_incomplete(&self, _attempt: u32, _elapsed: Duration) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn on_success(&self, _value: &bool, _attempts: u32) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    fn on_exhausted(&self, _attempts: u32) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    fn on_interrupted(&self, _attempts: u32) {
        self.interrupted.fetch_add(1, Ordering::Relaxed);
    }
}
