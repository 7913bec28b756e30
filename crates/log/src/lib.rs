//! # Warden Log
//!
//! Subscriber setup shared by the warden binary and test suites. Libraries
//! only emit `tracing` events; whoever owns `main` picks a configuration
//! here and installs it once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! fn main() -> Result<(), warden_log::LogError> {
//!     let _guard = warden_log::auto_init()?;
//!
//!     tracing::info!(key = "job:42", "lock acquired");
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod builder;
mod config;
mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, DisplayConfig, Fields, Format, Writer};
pub use error::{LogError, LogResult};

/// Pick a configuration from the environment and install it.
///
/// `WARDEN_LOG` or `RUST_LOG` selects [`Config::from_env`]; otherwise debug
/// builds get [`Config::development`] and release builds
/// [`Config::production`].
///
/// # Errors
///
/// See [`LoggerBuilder::build`].
pub fn auto_init() -> LogResult<LoggerGuard> {
    if std::env::var("WARDEN_LOG").is_ok() || std::env::var("RUST_LOG").is_ok() {
        init_with(Config::from_env())
    } else if cfg!(debug_assertions) {
        init_with(Config::development())
    } else {
        init_with(Config::production())
    }
}

/// Install the default configuration.
///
/// # Errors
///
/// See [`LoggerBuilder::build`].
pub fn init() -> LogResult<LoggerGuard> {
    init_with(Config::default())
}

/// Install `config`.
///
/// # Errors
///
/// See [`LoggerBuilder::build`].
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}

/// Install [`Config::test`] unless some subscriber is already set.
///
/// Safe to call from every test in a binary.
pub fn init_test() -> LoggerGuard {
    if tracing::dispatcher::has_been_set() {
        return LoggerGuard::noop();
    }
    init_with(Config::test()).unwrap_or_else(|_| LoggerGuard::noop())
}
