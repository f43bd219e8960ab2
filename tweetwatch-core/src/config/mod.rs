//! Configuration for the monitor
//!
//! Loads a [`MonitorConfig`] from YAML or JSON, interpolating `${VAR}`
//! placeholders from the environment before parsing, then runs the
//! [`ConfigValidator`].

mod env;
mod error;
mod schema;
mod secrets;
mod settings;
mod validator;

pub use env::interpolate_env_vars;
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{
    ApiConfig, ConversationConfig, EngineSection, MonitorConfig, MonitoringConfig,
    SUPPORTED_VERSION,
};
pub use secrets::SecretString;
pub use settings::{
    ServiceSettings, SettingChange, SettingsError, SettingsSnapshot, DATA_RETENTION_DAYS,
    ENABLE_MONITORING, MAX_HISTORICAL_DAYS, MONITORING_INTERVAL, RATE_LIMIT_REQUESTS,
    RATE_LIMIT_WINDOW, TIER_DERIVED_KEYS, TWEETS_PER_HOUR, TWITTER_API_TIER,
};
pub use validator::ConfigValidator;

use std::fs;
use std::path::Path;
use tracing::info;

fn read_interpolated(path: &Path) -> ConfigResult<String> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    env::interpolate_env_vars(&content)
}

fn finish(path: &Path, config: MonitorConfig) -> ConfigResult<MonitorConfig> {
    ConfigValidator::new()?.validate(&config)?;
    info!(
        path = %path.display(),
        tier = %config.api.tier,
        token = %config.api.bearer_token.partial_redact(),
        keywords = config.api.keywords.len(),
        "Loaded monitor configuration"
    );
    Ok(config)
}

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<MonitorConfig> {
    let path = path.as_ref();
    let interpolated = read_interpolated(path)?;

    let config: MonitorConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            format: "yaml",
            line: e.location().map_or(0, |l| l.line()),
            column: e.location().map_or(0, |l| l.column()),
            message: e.to_string(),
        })?;

    finish(path, config)
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<MonitorConfig> {
    let path = path.as_ref();
    let interpolated = read_interpolated(path)?;

    let config: MonitorConfig =
        serde_json::from_str(&interpolated).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            format: "json",
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        })?;

    finish(path, config)
}
