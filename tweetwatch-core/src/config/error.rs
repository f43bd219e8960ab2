//! Errors raised while loading a monitor configuration

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why a configuration file could not be turned into a [`MonitorConfig`]
///
/// [`MonitorConfig`]: super::MonitorConfig
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML/JSON or does not match the schema
    #[error("{} ({format}) line {line}, column {column}: {message}", path.display())]
    Parse {
        path: PathBuf,
        format: &'static str,
        line: usize,
        column: usize,
        message: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("environment variable '{var}' is not set")]
    MissingEnvVar { var: String },

    #[error("placeholder pattern failed to compile: {0}")]
    Pattern(#[from] regex::Error),
}

/// A value that parsed but is not acceptable, located by its dotted path
#[derive(Debug, Error)]
#[error("{field_path}: {kind}")]
pub struct ValidationError {
    /// e.g. `api.tweets_per_request` or `api.keywords[2]`
    pub field_path: String,
    pub kind: ValidationErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationErrorKind {
    #[error("required")]
    Missing,

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("'{0}' is listed more than once")]
    Duplicate(String),

    #[error("not a usable URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported version '{found}', expected '{expected}'")]
    UnsupportedVersion {
        expected: &'static str,
        found: String,
    },

    #[error("{0}")]
    Rejected(String),
}

impl ValidationError {
    pub fn new(field_path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            field_path: field_path.into(),
            kind,
        }
    }

    pub fn missing(field_path: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::Missing)
    }

    pub fn out_of_range(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::OutOfRange(message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = ValidationError::out_of_range("engine.adapter_timeout_ms", "must be positive");
        assert_eq!(
            err.to_string(),
            "engine.adapter_timeout_ms: out of range: must be positive"
        );
        let wrapped: ConfigError = err.into();
        assert!(wrapped.to_string().starts_with("engine.adapter_timeout_ms"));
    }
}
