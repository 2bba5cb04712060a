// Engine configuration
//
// Timing constants for the alerting rules. Values come from environment
// variables with the defaults below.

use chrono::Duration;
use std::str::FromStr;

use crate::error::ConfigError;

/// Configuration for the reconciliation engine and its sweeps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long paper must stay out (with no reserve) before an Empty alert
    pub empty_alert_delay: Duration,
    /// How long without telemetry before a device is marked offline
    pub offline_threshold: Duration,
    /// Confirmation delay when the reserve drops while the main roll is empty
    pub theft_confirm_delay_short: std::time::Duration,
    /// Confirmation delay when the reserve drops while paper is still present
    pub theft_confirm_delay_long: std::time::Duration,
    /// How long audit log rows are kept
    pub retention_window: Duration,
    /// Maximum audit log rows purged per retention run
    pub retention_purge_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            empty_alert_delay: Duration::minutes(30),
            offline_threshold: Duration::minutes(30),
            theft_confirm_delay_short: std::time::Duration::from_secs(20),
            theft_confirm_delay_long: std::time::Duration::from_secs(60),
            retention_window: Duration::days(30),
            retention_purge_limit: 500,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `EMPTY_ALERT_DELAY_SECS`: dwell time before an Empty alert (default: 1800)
    /// - `OFFLINE_THRESHOLD_SECS`: silence before a device is offline (default: 1800)
    /// - `THEFT_CONFIRM_DELAY_SHORT_SECS`: confirmation delay, main roll empty (default: 20)
    /// - `THEFT_CONFIRM_DELAY_LONG_SECS`: confirmation delay, main roll present (default: 60)
    /// - `AUDIT_RETENTION_DAYS`: audit log retention (default: 30)
    /// - `RETENTION_PURGE_LIMIT`: rows deleted per retention run (default: 500)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            empty_alert_delay: duration_secs("EMPTY_ALERT_DELAY_SECS")?
                .unwrap_or(defaults.empty_alert_delay),
            offline_threshold: duration_secs("OFFLINE_THRESHOLD_SECS")?
                .unwrap_or(defaults.offline_threshold),
            theft_confirm_delay_short: env_bounded::<u64>(
                "THEFT_CONFIRM_DELAY_SHORT_SECS",
                1,
                MAX_DELAY_SECS as u64,
            )?
            .map(std::time::Duration::from_secs)
            .unwrap_or(defaults.theft_confirm_delay_short),
            theft_confirm_delay_long: env_bounded::<u64>(
                "THEFT_CONFIRM_DELAY_LONG_SECS",
                1,
                MAX_DELAY_SECS as u64,
            )?
            .map(std::time::Duration::from_secs)
            .unwrap_or(defaults.theft_confirm_delay_long),
            retention_window: match env_bounded::<i64>(
                "AUDIT_RETENTION_DAYS",
                1,
                MAX_RETENTION_DAYS,
            )? {
                Some(days) => Duration::try_days(days)
                    .ok_or_else(|| invalid("AUDIT_RETENTION_DAYS", days))?,
                None => defaults.retention_window,
            },
            retention_purge_limit: env_bounded::<usize>(
                "RETENTION_PURGE_LIMIT",
                1,
                MAX_PURGE_LIMIT,
            )?
            .unwrap_or(defaults.retention_purge_limit),
        })
    }

    /// Set the empty-paper dwell time
    pub fn with_empty_alert_delay(mut self, delay: Duration) -> Self {
        self.empty_alert_delay = delay;
        self
    }

    /// Set the offline threshold
    pub fn with_offline_threshold(mut self, threshold: Duration) -> Self {
        self.offline_threshold = threshold;
        self
    }

    /// Set both theft confirmation delays
    pub fn with_theft_confirm_delays(
        mut self,
        short: std::time::Duration,
        long: std::time::Duration,
    ) -> Self {
        self.theft_confirm_delay_short = short;
        self.theft_confirm_delay_long = long;
        self
    }

    /// Set audit retention window and per-run purge limit
    pub fn with_retention(mut self, window: Duration, purge_limit: usize) -> Self {
        self.retention_window = window;
        self.retention_purge_limit = purge_limit.max(1);
        self
    }
}

/// Upper bound for any configured delay or threshold (30 days)
const MAX_DELAY_SECS: i64 = 30 * 24 * 60 * 60;
/// Upper bound for audit retention (10 years)
const MAX_RETENTION_DAYS: i64 = 3650;
const MAX_PURGE_LIMIT: usize = 100_000;

fn invalid(name: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// Like [`env_parse`], but values outside `min..=max` are an error.
pub fn env_bounded<T>(name: &str, min: T, max: T) -> Result<Option<T>, ConfigError>
where
    T: FromStr + PartialOrd + ToString,
{
    match env_parse::<T>(name)? {
        Some(value) if value < min || value > max => Err(invalid(name, value)),
        other => Ok(other),
    }
}

/// Positive number of seconds as a chrono duration
fn duration_secs(name: &str) -> Result<Option<Duration>, ConfigError> {
    env_bounded::<i64>(name, 1, MAX_DELAY_SECS)?
        .map(|secs| Duration::try_seconds(secs).ok_or_else(|| invalid(name, secs)))
        .transpose()
}

/// Read and parse an optional environment variable.
///
/// Unset or blank variables yield `None`; unparsable values are an error.
pub fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    name: name.to_string(),
                    value,
                })
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.empty_alert_delay, Duration::minutes(30));
        assert_eq!(config.offline_threshold, Duration::minutes(30));
        assert_eq!(
            config.theft_confirm_delay_short,
            std::time::Duration::from_secs(20)
        );
        assert_eq!(
            config.theft_confirm_delay_long,
            std::time::Duration::from_secs(60)
        );
        assert_eq!(config.retention_window, Duration::days(30));
        assert_eq!(config.retention_purge_limit, 500);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::default()
            .with_empty_alert_delay(Duration::minutes(5))
            .with_offline_threshold(Duration::minutes(10))
            .with_retention(Duration::days(7), 0);
        assert_eq!(config.empty_alert_delay, Duration::minutes(5));
        assert_eq!(config.offline_threshold, Duration::minutes(10));
        assert_eq!(config.retention_window, Duration::days(7));
        assert_eq!(config.retention_purge_limit, 1);
    }

    #[test]
    fn test_from_env_rejects_out_of_range_values() {
        let cases = [
            ("EMPTY_ALERT_DELAY_SECS", "9223372036854775807"),
            ("OFFLINE_THRESHOLD_SECS", "-600"),
            ("OFFLINE_THRESHOLD_SECS", "0"),
            ("THEFT_CONFIRM_DELAY_LONG_SECS", "0"),
            ("AUDIT_RETENTION_DAYS", "100000000"),
            ("AUDIT_RETENTION_DAYS", "-1"),
            ("RETENTION_PURGE_LIMIT", "0"),
        ];

        for (name, value) in cases {
            std::env::set_var(name, value);
            let err = EngineConfig::from_env().unwrap_err();
            std::env::remove_var(name);
            assert!(
                matches!(&err, ConfigError::InvalidValue { name: n, .. } if n == name),
                "{name}={value} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_env_bounded() {
        std::env::set_var("PAPERWATCH_TEST_BOUNDED_IN", "10");
        std::env::set_var("PAPERWATCH_TEST_BOUNDED_LOW", "-3");
        std::env::set_var("PAPERWATCH_TEST_BOUNDED_HIGH", "11");
        assert_eq!(
            env_bounded::<i64>("PAPERWATCH_TEST_BOUNDED_IN", 1, 10).unwrap(),
            Some(10)
        );
        assert!(env_bounded::<i64>("PAPERWATCH_TEST_BOUNDED_LOW", 1, 10).is_err());
        assert!(env_bounded::<i64>("PAPERWATCH_TEST_BOUNDED_HIGH", 1, 10).is_err());
        assert_eq!(
            env_bounded::<i64>("PAPERWATCH_TEST_BOUNDED_UNSET", 1, 10).unwrap(),
            None
        );
    }

    #[test]
    fn test_env_parse() {
        std::env::set_var("PAPERWATCH_TEST_ENV_PARSE_OK", " 42 ");
        std::env::set_var("PAPERWATCH_TEST_ENV_PARSE_BAD", "forty");
        assert_eq!(
            env_parse::<u64>("PAPERWATCH_TEST_ENV_PARSE_OK").unwrap(),
            Some(42)
        );
        assert!(env_parse::<u64>("PAPERWATCH_TEST_ENV_PARSE_BAD").is_err());
        assert_eq!(
            env_parse::<u64>("PAPERWATCH_TEST_ENV_PARSE_UNSET").unwrap(),
            None
        );
    }
}
