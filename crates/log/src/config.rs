//! Logging configuration and presets

use std::fmt;
use std::io::IsTerminal;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LogError;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filter directives (e.g. `"info"`, `"warden_lock=debug,warn"`)
    pub level: String,

    /// Output format
    pub format: Format,

    /// Output destination
    pub writer: Writer,

    /// Display configuration
    pub display: DisplayConfig,

    /// Fields attached to a root span around everything logged
    pub fields: Fields,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Compact,
            writer: Writer::Stderr,
            display: DisplayConfig::default(),
            fields: Fields::default(),
        }
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Multi-line, human-readable
    Pretty,
    /// Single line per event
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

impl FromStr for Format {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(LogError::Config(format!(
                "unknown log format '{other}', expected pretty, compact or json"
            ))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Compact => f.write_str("compact"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Writer {
    /// Standard error
    #[default]
    Stderr,
    /// Standard output
    Stdout,
    /// libtest's captured output
    Test,
}

/// Display toggles
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show timestamps
    pub time: bool,
    /// Show `file:line`
    pub source: bool,
    /// Show target module
    pub target: bool,
    /// Show thread ids
    pub thread_ids: bool,
    /// Use ANSI colors
    pub colors: bool,
    /// Include the span list in JSON output
    pub span_list: bool,
    /// Put event fields at the top level of JSON output
    pub flatten: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time: true,
            source: cfg!(debug_assertions),
            target: true,
            thread_ids: false,
            colors: std::io::stderr().is_terminal(),
            span_list: true,
            flatten: true,
        }
    }
}

impl DisplayConfig {
    fn parse_env(&mut self) {
        if let Some(v) = env_flag("WARDEN_LOG_TIME") {
            self.time = v;
        }
        if let Some(v) = env_flag("WARDEN_LOG_SOURCE") {
            self.source = v;
        }
        if let Some(v) = env_flag("WARDEN_LOG_COLORS") {
            self.colors = v;
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| v != "0" && v != "false")
}

/// Fields recorded on the root span
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fields {
    /// Service name
    pub service: Option<String>,
    /// Environment (dev/staging/prod)
    pub env: Option<String>,
    /// Version
    pub version: Option<String>,
    /// Instance id
    pub instance: Option<String>,
}

impl Fields {
    /// Read fields from `WARDEN_SERVICE`, `WARDEN_ENV`, `WARDEN_VERSION` and
    /// `WARDEN_INSTANCE`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            service: std::env::var("WARDEN_SERVICE").ok(),
            env: std::env::var("WARDEN_ENV").ok(),
            version: std::env::var("WARDEN_VERSION").ok(),
            instance: std::env::var("WARDEN_INSTANCE").ok(),
        }
    }

    /// Check if fields are empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.service.is_none()
            && self.env.is_none()
            && self.version.is_none()
            && self.instance.is_none()
    }
}

impl Config {
    /// Defaults overridden by `WARDEN_LOG` (or `RUST_LOG`), `WARDEN_LOG_FORMAT`,
    /// the display flags, and the field variables.
    ///
    /// An unknown `WARDEN_LOG_FORMAT` falls back to compact.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("WARDEN_LOG") {
            config.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            config.level = level;
        }

        if let Ok(format) = std::env::var("WARDEN_LOG_FORMAT") {
            config.format = format.parse().unwrap_or_default();
        }

        config.display.parse_env();
        config.fields = Fields::from_env();
        config
    }

    /// Pretty, debug level, with source locations
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: Format::Pretty,
            display: DisplayConfig {
                source: true,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }

    /// JSON, info level, no colors
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Json,
            display: DisplayConfig {
                colors: false,
                source: false,
                flatten: true,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }

    /// Compact trace output captured by the test harness
    #[must_use]
    pub fn test() -> Self {
        Self {
            level: "trace".to_string(),
            format: Format::Compact,
            writer: Writer::Test,
            display: DisplayConfig {
                colors: false,
                time: false,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }

    /// Set filter directives.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }
}
