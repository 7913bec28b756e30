//! Lock configuration and per-call acquisition options

use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_resilience::{MAX_DELAY, RetryConfig, UNBOUNDED_ATTEMPTS};

use crate::error::{ConfigError, LockError};

/// Default lease on an acquired lock
pub const DEFAULT_LEASE: Duration = Duration::from_millis(30_000);

/// Longest lease a lock may be taken with
pub const MAX_LEASE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default wait between acquisition attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// What to do when the key is already held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentionPolicy {
    /// Keep retrying until the attempt budget runs out.
    #[default]
    Wait,
    /// Give up after a single attempt.
    FailFast,
}

impl ContentionPolicy {
    /// Attempt budget this policy implies.
    pub fn max_attempts(self) -> u32 {
        match self {
            Self::Wait => UNBOUNDED_ATTEMPTS,
            Self::FailFast => 0,
        }
    }
}

/// Manager-wide lock defaults
///
/// ```toml
/// lease = "30s"
/// retry_delay = "500ms"
/// policy = "wait"        # or "fail-fast"
/// max_attempts = 20      # optional, overrides the policy budget
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Expiry written with every lock record
    #[serde(with = "humantime_serde")]
    pub lease: Duration,

    /// Period between acquisition attempts
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Contention policy
    pub policy: ContentionPolicy,

    /// Explicit attempt budget, overriding `policy`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease: DEFAULT_LEASE,
            retry_delay: DEFAULT_RETRY_DELAY,
            policy: ContentionPolicy::Wait,
            max_attempts: None,
        }
    }
}

impl LockConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lease.is_zero() {
            return Err(ConfigError::Invalid("lease must be positive".into()));
        }
        if self.lease > MAX_LEASE {
            return Err(ConfigError::Invalid(format!(
                "lease {:?} exceeds maximum {:?}",
                self.lease, MAX_LEASE
            )));
        }
        if self.lease.subsec_nanos() % 1_000_000 != 0 {
            return Err(ConfigError::Invalid(
                "lease must be a whole number of milliseconds".into(),
            ));
        }
        if self.retry_delay > MAX_DELAY {
            return Err(ConfigError::Invalid(format!(
                "retry_delay {:?} exceeds maximum {:?}",
                self.retry_delay, MAX_DELAY
            )));
        }
        Ok(())
    }

    /// Attempt budget after applying the override.
    pub fn effective_max_attempts(&self) -> u32 {
        self.max_attempts
            .unwrap_or_else(|| self.policy.max_attempts())
    }

    /// Per-call options seeded from these defaults.
    pub fn acquire_options(&self) -> AcquireOptions {
        AcquireOptions {
            lease: self.lease,
            max_attempts: self.effective_max_attempts(),
            retry_delay: self.retry_delay,
        }
    }
}

/// Options for one acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireOptions {
    /// Record expiry
    pub lease: Duration,
    /// Attempt budget; `0` means a single attempt
    pub max_attempts: u32,
    /// Period between attempts
    pub retry_delay: Duration,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        LockConfig::default().acquire_options()
    }
}

impl AcquireOptions {
    /// Default lease and delay with an unbounded budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lease.
    #[must_use]
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Set the attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the delay between attempts.
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Single attempt, no wait.
    #[must_use]
    pub fn fail_fast(self) -> Self {
        self.with_max_attempts(0)
    }

    /// Retry settings for the executor.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_attempts, self.retry_delay)
    }

    pub(crate) fn validate(&self) -> Result<(), LockError> {
        if self.lease < Duration::from_millis(1) {
            return Err(LockError::InvalidOptions(
                "lease must be at least 1ms".into(),
            ));
        }
        if self.lease > MAX_LEASE {
            return Err(LockError::InvalidOptions(format!(
                "lease {:?} exceeds maximum {:?}",
                self.lease, MAX_LEASE
            )));
        }
        self.retry_config()
            .validate()
            .map_err(|e| LockError::InvalidOptions(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn defaults_match_documented_values() {
        let options = LockConfig::default().acquire_options();
        assert_eq!(options.lease, Duration::from_secs(30));
        assert_eq!(options.retry_delay, Duration::from_millis(500));
        assert_eq!(options.max_attempts, UNBOUNDED_ATTEMPTS);
    }

    #[rstest]
    #[case(ContentionPolicy::Wait, None, UNBOUNDED_ATTEMPTS)]
    #[case(ContentionPolicy::FailFast, None, 0)]
    #[case(ContentionPolicy::Wait, Some(5), 5)]
    #[case(ContentionPolicy::FailFast, Some(5), 5)]
    fn override_beats_policy(
        #[case] policy: ContentionPolicy,
        #[case] max_attempts: Option<u32>,
        #[case] expected: u32,
    ) {
        let config = LockConfig {
            policy,
            max_attempts,
            ..LockConfig::default()
        };
        assert_eq!(config.effective_max_attempts(), expected);
    }

    #[test]
    fn parses_humantime_toml() {
        let config = LockConfig::from_toml_str(
            r#"
            lease = "5s"
            retry_delay = "250ms"
            policy = "fail-fast"
            "#,
        )
        .unwrap();

        assert_eq!(config.lease, Duration::from_secs(5));
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert_eq!(config.policy, ContentionPolicy::FailFast);
        assert_eq!(config.max_attempts, None);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = LockConfig::from_toml_str("max_attempts = 3").unwrap();
        assert_eq!(config.lease, DEFAULT_LEASE);
        assert_eq!(config.effective_max_attempts(), 3);
    }

    #[rstest]
    #[case(r#"lease = "0s""#)]
    #[case(r#"lease = "1500us""#)]
    #[case(r#"retry_delay = "10m""#)]
    #[case(r#"lease = "31days""#)]
    #[case(r#"lease = "500000000000years""#)]
    fn invalid_values_are_rejected(#[case] source: &str) {
        let err = LockConfig::from_toml_str(source).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = LockConfig::from_toml_str("lease = 30").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn builder_adjusts_options() {
        let options = AcquireOptions::new()
            .with_lease(Duration::from_secs(5))
            .with_retry_delay(Duration::from_millis(100))
            .with_max_attempts(3);
        assert_eq!(
            options.retry_config(),
            RetryConfig::new(3, Duration::from_millis(100))
        );
        assert_eq!(options.fail_fast().max_attempts, 0);
    }

    #[rstest]
    #[case(Duration::ZERO)]
    #[case(MAX_LEASE + Duration::from_millis(1))]
    #[case(Duration::from_secs(u64::MAX / 2))]
    fn out_of_range_lease_options_are_invalid(#[case] lease: Duration) {
        let err = AcquireOptions::new().with_lease(lease).validate().unwrap_err();
        assert!(matches!(err, LockError::InvalidOptions(_)));
    }

    #[test]
    fn maximum_lease_is_accepted() {
        assert!(AcquireOptions::new().with_lease(MAX_LEASE).validate().is_ok());
        let config = LockConfig {
            lease: MAX_LEASE,
            ..LockConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
