//! Layered settings: defaults, then a TOML file, then `WARDEN_` variables,
//! then command-line flags.

use std::path::Path;

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format as _, Serialized, Toml};
use serde::{Deserialize, Serialize};
use warden_lock::LockConfig;
use warden_log::Format;

use crate::Cli;

/// Environment variables read as settings, after the `WARDEN_` prefix.
///
/// Other `WARDEN_*` variables belong to the logger and are not settings.
const ENV_KEYS: &[&str] = &[
    "backend",
    "redis_url",
    "logging__level",
    "logging__format",
    "lock__lease",
    "lock__retry_delay",
    "lock__policy",
    "lock__max_attempts",
];

/// Store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process store; locks are shared only within this run.
    #[default]
    Memory,
    /// Redis server at `redis_url`.
    Redis,
}

/// Logger settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directives
    pub level: String,
    /// Output format
    pub format: Format,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: Format::Compact,
        }
    }
}

/// Effective CLI settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Store backend
    pub backend: Backend,
    /// Redis connection URL
    pub redis_url: String,
    /// Logger settings
    pub logging: LoggingSettings,
    /// Lock defaults
    pub lock: LockConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            logging: LoggingSettings::default(),
            lock: LockConfig::default(),
        }
    }
}

impl Settings {
    /// Resolve settings for `cli`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is missing or malformed, or the
    /// merged lock settings are invalid.
    pub fn load(cli: &Cli) -> Result<Self> {
        let settings: Self = Self::figment(cli)?
            .extract()
            .context("failed to load settings")?;
        settings.lock.validate()?;
        Ok(settings)
    }

    fn figment(cli: &Cli) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = &cli.config {
            figment = figment.merge(Toml::file(require_file(path)?));
        }

        figment = figment.merge(
            Env::prefixed("WARDEN_")
                .filter(|key| ENV_KEYS.iter().any(|k| key.as_str().eq_ignore_ascii_case(k)))
                .split("__"),
        );

        if let Some(backend) = cli.backend {
            figment = figment.merge(Serialized::default("backend", backend));
        }
        if let Some(url) = &cli.redis_url {
            figment = figment.merge(Serialized::default("redis_url", url));
        }
        if let Some(level) = &cli.log_level {
            figment = figment.merge(Serialized::default("logging.level", level));
        }
        if let Some(format) = cli.log_format {
            figment = figment.merge(Serialized::default("logging.format", format));
        }
        Ok(figment)
    }

    /// Logger configuration for these settings
    pub fn log_config(&self) -> warden_log::Config {
        warden_log::Config::default()
            .with_level(self.logging.level.clone())
            .with_format(self.logging.format)
    }
}

fn require_file(path: &Path) -> Result<&Path> {
    if !path.is_file() {
        bail!("config file {} does not exist", path.display());
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use clap::Parser;
    use warden_lock::ContentionPolicy;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("warden").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_without_file_or_flags() {
        let settings = Settings::load(&cli(&["probe", "--key", "k"])).unwrap();
        assert_eq!(settings.backend, Backend::Memory);
        assert_eq!(settings.lock, LockConfig::default());
    }

    #[test]
    fn file_then_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            backend = "redis"

            [logging]
            level = "debug"

            [lock]
            lease = "5s"
            policy = "fail-fast"
            "#
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let settings = Settings::load(&cli(&[
            "--config",
            path,
            "--backend",
            "memory",
            "--log-format",
            "json",
            "probe",
            "--key",
            "k",
        ]))
        .unwrap();

        assert_eq!(settings.backend, Backend::Memory);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, Format::Json);
        assert_eq!(settings.lock.lease, Duration::from_secs(5));
        assert_eq!(settings.lock.policy, ContentionPolicy::FailFast);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = Settings::load(&cli(&["--config", "/nonexistent/warden.toml", "probe", "--key", "k"]))
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn invalid_lock_settings_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[lock]\nlease = \"0s\"").unwrap();

        let path = file.path().to_str().unwrap();
        assert!(Settings::load(&cli(&["--config", path, "probe", "--key", "k"])).is_err());
    }
}
