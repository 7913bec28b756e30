//! Subcommand implementations

use std::time::Duration;

use warden_lock::{AcquireOptions, LockManager};

pub mod contend;
pub mod probe;

/// Manager defaults with per-command overrides applied.
fn acquire_options(
    manager: &LockManager,
    lease: Option<Duration>,
    attempts: Option<u32>,
    delay: Option<Duration>,
) -> AcquireOptions {
    let mut options = manager.config().acquire_options();
    if let Some(lease) = lease {
        options = options.with_lease(lease);
    }
    if let Some(attempts) = attempts {
        options = options.with_max_attempts(attempts);
    }
    if let Some(delay) = delay {
        options = options.with_retry_delay(delay);
    }
    options
}
