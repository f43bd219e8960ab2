//! Runtime-adjustable service settings
//!
//! Mirrors the key/value settings an operator can change while the monitor
//! runs. The tier and its derived values are read from the bound rate
//! limiter, so a deferred tier change shows up as pending until the limiter
//! actually switches at its next reset.

use super::schema::MonitorConfig;
use crate::rate_limit::{RateLimiter, Tier, WINDOW_MINUTES};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const TWITTER_API_TIER: &str = "TWITTER_API_TIER";
pub const DATA_RETENTION_DAYS: &str = "DATA_RETENTION_DAYS";
pub const MONITORING_INTERVAL: &str = "MONITORING_INTERVAL";
pub const TWEETS_PER_HOUR: &str = "TWEETS_PER_HOUR";
pub const ENABLE_MONITORING: &str = "ENABLE_MONITORING";
pub const MAX_HISTORICAL_DAYS: &str = "MAX_HISTORICAL_DAYS";
pub const RATE_LIMIT_REQUESTS: &str = "RATE_LIMIT_REQUESTS";
pub const RATE_LIMIT_WINDOW: &str = "RATE_LIMIT_WINDOW";

/// Keys derived from the tier
pub const TIER_DERIVED_KEYS: [&str; 3] = [MAX_HISTORICAL_DAYS, RATE_LIMIT_REQUESTS, RATE_LIMIT_WINDOW];

/// Rejected setting change
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("unknown setting '{key}'")]
    UnknownKey { key: String },

    #[error("setting '{key}' is derived from the API tier and cannot be set directly")]
    ReadOnly { key: String },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// A validated change to one setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingChange {
    Tier(Tier),
    DataRetentionDays(u32),
    MonitoringInterval(u64),
    TweetsPerHour(u32),
    EnableMonitoring(bool),
}

impl SettingChange {
    /// Parse a raw key/value pair
    pub fn parse(key: &str, value: &str) -> Result<Self, SettingsError> {
        let value = value.trim();
        match key {
            TWITTER_API_TIER => value
                .parse::<Tier>()
                .map(SettingChange::Tier)
                .map_err(|e| invalid(key, e.to_string())),
            DATA_RETENTION_DAYS => positive(key, value).map(SettingChange::DataRetentionDays),
            MONITORING_INTERVAL => positive(key, value).map(SettingChange::MonitoringInterval),
            TWEETS_PER_HOUR => positive(key, value).map(SettingChange::TweetsPerHour),
            ENABLE_MONITORING => match value.to_ascii_lowercase().as_str() {
                "true" => Ok(SettingChange::EnableMonitoring(true)),
                "false" => Ok(SettingChange::EnableMonitoring(false)),
                _ => Err(invalid(key, "must be 'true' or 'false'")),
            },
            k if TIER_DERIVED_KEYS.contains(&k) => Err(SettingsError::ReadOnly {
                key: key.to_string(),
            }),
            _ => Err(SettingsError::UnknownKey {
                key: key.to_string(),
            }),
        }
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> SettingsError {
    SettingsError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn positive<T>(key: &str, value: &str) -> Result<T, SettingsError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match value.parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => Err(invalid(key, "must be a positive integer")),
    }
}

/// Snapshot of every setting, including the tier-derived ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    pub tier: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_tier: Option<Tier>,
    pub data_retention_days: u32,
    pub monitoring_interval_secs: u64,
    pub tweets_per_hour: u32,
    pub enable_monitoring: bool,
    pub max_historical_days: u32,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
}

#[derive(Debug, Clone)]
struct Values {
    data_retention_days: u32,
    monitoring_interval_secs: u64,
    tweets_per_hour: u32,
    enable_monitoring: bool,
}

/// Shared, validated service settings
#[derive(Debug)]
pub struct ServiceSettings {
    values: RwLock<Values>,
    limiter: RateLimiter,
}

impl ServiceSettings {
    /// Settings bound to `limiter` with stock defaults
    pub fn new(limiter: RateLimiter) -> Self {
        let tier = limiter.tier();
        Self {
            limiter,
            values: RwLock::new(Values {
                data_retention_days: 7,
                monitoring_interval_secs: 3_600,
                tweets_per_hour: default_tweets_per_hour(tier),
                enable_monitoring: true,
            }),
        }
    }

    /// Settings seeded from a loaded configuration
    pub fn from_config(config: &MonitorConfig, limiter: RateLimiter) -> Self {
        limiter.configure(config.api.tier);
        let settings = Self::new(limiter);
        {
            let mut values = settings.values.write();
            values.data_retention_days = config.monitoring.data_retention_days;
            values.monitoring_interval_secs = config.monitoring.interval_secs;
            values.enable_monitoring = config.monitoring.enabled;
        }
        settings
    }

    /// The limiter this instance reads its tier from
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Validate and apply a raw key/value change
    ///
    /// A tier change is handed to the limiter, which may defer it until the
    /// current window resets.
    pub fn apply(&self, key: &str, value: &str) -> Result<SettingChange, SettingsError> {
        let change = SettingChange::parse(key, value)?;
        let mut values = self.values.write();
        match change {
            SettingChange::Tier(tier) => {
                self.limiter.configure(tier);
                values.tweets_per_hour = default_tweets_per_hour(tier);
            }
            SettingChange::DataRetentionDays(days) => values.data_retention_days = days,
            SettingChange::MonitoringInterval(secs) => values.monitoring_interval_secs = secs,
            SettingChange::TweetsPerHour(n) => values.tweets_per_hour = n,
            SettingChange::EnableMonitoring(enabled) => values.enable_monitoring = enabled,
        }
        info!(key, value, "Service setting updated");
        Ok(change)
    }

    /// Current value of a setting as a string
    pub fn get(&self, key: &str) -> Option<String> {
        let snapshot = self.snapshot();
        let value = match key {
            TWITTER_API_TIER => snapshot.tier.to_string(),
            DATA_RETENTION_DAYS => snapshot.data_retention_days.to_string(),
            MONITORING_INTERVAL => snapshot.monitoring_interval_secs.to_string(),
            TWEETS_PER_HOUR => snapshot.tweets_per_hour.to_string(),
            ENABLE_MONITORING => snapshot.enable_monitoring.to_string(),
            MAX_HISTORICAL_DAYS => snapshot.max_historical_days.to_string(),
            RATE_LIMIT_REQUESTS => snapshot.rate_limit_requests.to_string(),
            RATE_LIMIT_WINDOW => snapshot.rate_limit_window_secs.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Copy of all settings
    pub fn snapshot(&self) -> SettingsSnapshot {
        let status = self.limiter.status();
        let values = self.values.read();
        SettingsSnapshot {
            tier: status.tier,
            pending_tier: status.pending_tier,
            data_retention_days: values.data_retention_days,
            monitoring_interval_secs: values.monitoring_interval_secs,
            tweets_per_hour: values.tweets_per_hour,
            enable_monitoring: values.enable_monitoring,
            max_historical_days: status.max_historical_days,
            rate_limit_requests: status.ceiling_per_window,
            rate_limit_window_secs: (WINDOW_MINUTES * 60) as u64,
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::new(RateLimiter::new(Tier::default()))
    }
}

fn default_tweets_per_hour(tier: Tier) -> u32 {
    match tier {
        Tier::Free => 10,
        Tier::Basic => 15,
        Tier::Pro => 30,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;
    use test_case::test_case;

    #[test_case(DATA_RETENTION_DAYS, "0")]
    #[test_case(DATA_RETENTION_DAYS, "-3")]
    #[test_case(MONITORING_INTERVAL, "soon")]
    #[test_case(TWEETS_PER_HOUR, "1.5")]
    #[test_case(ENABLE_MONITORING, "yes")]
    #[test_case(TWITTER_API_TIER, "enterprise")]
    fn test_invalid_values_rejected(key: &str, value: &str) {
        let settings = ServiceSettings::default();
        assert!(matches!(
            settings.apply(key, value),
            Err(SettingsError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_tier_derived_keys_are_read_only() {
        let settings = ServiceSettings::default();
        for key in TIER_DERIVED_KEYS {
            assert!(matches!(
                settings.apply(key, "10"),
                Err(SettingsError::ReadOnly { .. })
            ));
        }
    }

    #[test]
    fn test_tier_change_updates_derived_values() {
        let settings = ServiceSettings::default();
        settings.apply(TWITTER_API_TIER, "basic").unwrap();
        assert_eq!(settings.get(MAX_HISTORICAL_DAYS).as_deref(), Some("30"));
        assert_eq!(settings.get(RATE_LIMIT_REQUESTS).as_deref(), Some("150"));
        assert_eq!(settings.get(RATE_LIMIT_WINDOW).as_deref(), Some("900"));
        assert_eq!(settings.get(TWEETS_PER_HOUR).as_deref(), Some("15"));
    }

    #[test]
    fn test_deferred_tier_change_reported_as_pending() {
        let clock = ManualClock::starting_now();
        let limiter = RateLimiter::with_clock(Tier::Free, Arc::new(clock.clone()));
        let settings = ServiceSettings::new(limiter.clone());
        assert!(limiter.try_consume(1).accepted);

        settings.apply(TWITTER_API_TIER, "pro").unwrap();
        let snapshot = settings.snapshot();
        assert_eq!(snapshot.tier, Tier::Free);
        assert_eq!(snapshot.pending_tier, Some(Tier::Pro));
        assert_eq!(settings.get(RATE_LIMIT_REQUESTS).as_deref(), Some("50"));
        assert_eq!(settings.get(MAX_HISTORICAL_DAYS).as_deref(), Some("7"));

        clock.advance(chrono::Duration::minutes(WINDOW_MINUTES + 1));
        assert_eq!(settings.get(TWITTER_API_TIER).as_deref(), Some("pro"));
        assert_eq!(settings.get(RATE_LIMIT_REQUESTS).as_deref(), Some("300"));
        assert_eq!(settings.snapshot().pending_tier, None);
    }

    #[test]
    fn test_boolean_is_case_insensitive() {
        let settings = ServiceSettings::default();
        assert_eq!(
            settings.apply(ENABLE_MONITORING, "FALSE").unwrap(),
            SettingChange::EnableMonitoring(false)
        );
        assert!(!settings.snapshot().enable_monitoring);
    }

    #[test]
    fn test_unknown_key() {
        let settings = ServiceSettings::default();
        assert!(matches!(
            settings.apply("TWITTER_BEARER_TOKEN", "x"),
            Err(SettingsError::UnknownKey { .. })
        ));
    }
}
