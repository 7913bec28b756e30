//! # warden-cli
//!
//! Operator tool for warden locks.
//!
//! ## Commands
//!
//! - `warden contend` - race N workers for one key and report the winners
//! - `warden probe` - acquire, check ownership, and release a key
//!
//! ## Configuration
//!
//! Settings are layered: built-in defaults, then `--config <file>` (TOML),
//! then `WARDEN_` variables (`WARDEN_BACKEND`, `WARDEN_REDIS_URL`,
//! `WARDEN_LOCK__LEASE`, `WARDEN_LOGGING__LEVEL`, ...), then flags.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]

pub mod commands;
pub mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use warden_lock::{LockManager, LockStore, MemoryStore};
use warden_log::Format;

pub use config::{Backend, Settings};

/// Warden - distributed lock operator tool.
#[derive(Debug, Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML).
    #[arg(long, short = 'c', global = true, env = "WARDEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Store backend.
    #[arg(long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Redis connection URL (with `--backend redis`).
    #[arg(long, global = true)]
    pub redis_url: Option<String>,

    /// Log filter directives (e.g. `debug`, `warden_lock=trace`).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format: pretty, compact, or json.
    #[arg(long, global = true)]
    pub log_format: Option<Format>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Race several workers for one key.
    Contend(commands::contend::ContendArgs),
    /// Acquire, check, and release a key.
    Probe(commands::probe::ProbeArgs),
}

/// Build a lock manager over the configured backend.
///
/// # Errors
///
/// Returns an error if the backend is unavailable or the lock settings are
/// invalid.
pub async fn build_manager(settings: &Settings) -> Result<LockManager> {
    let store: Arc<dyn LockStore> = match settings.backend {
        Backend::Memory => Arc::new(MemoryStore::new()),
        Backend::Redis => open_redis(&settings.redis_url).await?,
    };
    LockManager::builder()
        .with_shared_store(store)
        .with_config(settings.lock.clone())
        .build()
        .context("invalid lock settings")
}

#[cfg(feature = "redis")]
async fn open_redis(url: &str) -> Result<Arc<dyn LockStore>> {
    let store = warden_lock::RedisStore::connect(url)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
#[allow(clippy::unused_async)]
async fn open_redis(_url: &str) -> Result<Arc<dyn LockStore>> {
    anyhow::bail!("the redis backend is not compiled in; rebuild with `--features redis`")
}

/// Parse a human-readable duration such as `500ms` or `5s`.
pub(crate) fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from([
            "warden",
            "probe",
            "--key",
            "job:42",
            "--backend",
            "memory",
            "--log-format",
            "json",
        ]);
        assert_eq!(cli.backend, Some(Backend::Memory));
        assert_eq!(cli.log_format, Some(Format::Json));
        assert!(matches!(cli.command, Commands::Probe(ref args) if args.key == "job:42"));
    }

    #[test]
    fn durations_are_human_readable() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert!(parse_duration("soon").is_err());
    }

    #[cfg(not(feature = "redis"))]
    #[tokio::test]
    async fn redis_backend_needs_the_feature() {
        let settings = Settings {
            backend: Backend::Redis,
            ..Settings::default()
        };
        let err = build_manager(&settings).await.unwrap_err();
        assert!(err.to_string().contains("--features redis"));
    }
}
