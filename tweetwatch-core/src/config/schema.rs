//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::SecretString;
use crate::rate_limit::Tier;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The only schema version this crate understands
pub const SUPPORTED_VERSION: &str = "0.1";

/// Root configuration of the monitor
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Schema version (required - no default)
    pub version: String,

    /// Upstream API access
    pub api: ApiConfig,

    /// Conversation retention and persistence
    #[serde(default)]
    pub conversations: ConversationConfig,

    /// Engine runtime knobs
    #[serde(default)]
    pub engine: EngineSection,

    /// Scheduled collection
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Upstream social-media API settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Access tier, determines the rate-limit ceiling
    #[serde(default)]
    pub tier: Tier,

    /// Bearer token (supports environment variable interpolation)
    pub bearer_token: SecretString,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Search keywords used by scheduled collection
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Page size requested from the upstream search endpoint
    #[serde(default = "default_tweets_per_request")]
    pub tweets_per_request: u32,
}

/// Conversation store settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationConfig {
    /// Idle time after which a conversation is evicted
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Require conversations to be opened before use
    #[serde(default)]
    pub strict: bool,

    /// Where conversations are saved, if anywhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence_path: Option<PathBuf>,

    /// Save conversations when the engine shuts down
    #[serde(default = "default_true")]
    pub flush_on_shutdown: bool,
}

/// Engine settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// How long a caller waits for an adapter before getting a timeout
    #[serde(default = "default_adapter_timeout_ms")]
    pub adapter_timeout_ms: u64,

    /// Period of the background eviction sweep
    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,
}

/// Scheduled monitoring settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MonitoringConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between scheduled collections
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Days harvested data is kept before cleanup
    #[serde(default = "default_data_retention_days")]
    pub data_retention_days: u32,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            strict: false,
            persistence_path: None,
            flush_on_shutdown: true,
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            adapter_timeout_ms: default_adapter_timeout_ms(),
            eviction_interval_secs: default_eviction_interval_secs(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
            data_retention_days: default_data_retention_days(),
        }
    }
}

fn default_true() -> bool { true }
fn default_base_url() -> String { "https://api.twitter.com/2".to_string() }
fn default_tweets_per_request() -> u32 { 20 }
fn default_retention_secs() -> u64 { 86_400 }
fn default_adapter_timeout_ms() -> u64 { 30_000 }
fn default_eviction_interval_secs() -> u64 { 300 }
fn default_interval_secs() -> u64 { 3_600 }
fn default_data_retention_days() -> u32 { 7 }

impl MonitorConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::missing("version"));
        }
        if self.version != SUPPORTED_VERSION {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::UnsupportedVersion {
                    expected: SUPPORTED_VERSION,
                    found: self.version.clone(),
                },
            ));
        }

        self.api.validate("api")?;
        self.conversations.validate("conversations")?;
        self.engine.validate("engine")?;
        self.monitoring.validate("monitoring")?;
        Ok(())
    }

    /// Conversation retention as a duration
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.conversations.retention_secs)
    }
}

impl ApiConfig {
    /// Validate API settings
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.bearer_token.expose_secret().trim().is_empty() {
            return Err(ValidationError::missing(format!("{}.bearer_token", path)));
        }

        if self.base_url.is_empty() {
            return Err(ValidationError::missing(format!("{}.base_url", path)));
        }
        match url::Url::parse(&self.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => {
                return Err(ValidationError::new(
                    format!("{}.base_url", path),
                    ValidationErrorKind::InvalidUrl(format!(
                        "scheme must be http or https, got {}",
                        url.scheme()
                    )),
                ));
            }
            Err(e) => {
                return Err(ValidationError::new(
                    format!("{}.base_url", path),
                    ValidationErrorKind::InvalidUrl(e.to_string()),
                ));
            }
        }

        let max = self.tier.limits().max_tweets_per_request;
        if self.tweets_per_request == 0 || self.tweets_per_request > max {
            return Err(ValidationError::out_of_range(
                format!("{}.tweets_per_request", path),
                format!(
                    "must be between 1 and {} for the {} tier, got {}",
                    max, self.tier, self.tweets_per_request
                ),
            ));
        }

        Ok(())
    }
}

impl ConversationConfig {
    /// Validate conversation settings
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.retention_secs == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.retention_secs", path),
                "must be greater than 0",
            ));
        }
        if let Some(persistence) = &self.persistence_path {
            if persistence.as_os_str().is_empty() {
                return Err(ValidationError::missing(format!(
                    "{}.persistence_path",
                    path
                )));
            }
        }
        Ok(())
    }
}

impl EngineSection {
    /// Validate engine settings
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.adapter_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.adapter_timeout_ms", path),
                "must be greater than 0",
            ));
        }
        if self.eviction_interval_secs == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.eviction_interval_secs", path),
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl MonitoringConfig {
    /// Validate monitoring settings
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.interval_secs", path),
                "must be greater than 0",
            ));
        }
        if self.data_retention_days == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.data_retention_days", path),
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}
