//! Cross-field configuration checks

use super::env::env_var_regex;
use super::error::{ConfigError, ValidationError, ValidationErrorKind};
use super::schema::MonitorConfig;
use regex::Regex;
use std::collections::HashSet;
use tracing::warn;

/// Configuration validator with rules spanning several sections
pub struct ConfigValidator {
    /// Pattern for environment variable placeholders
    env_var_pattern: Regex,
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            env_var_pattern: env_var_regex()?,
        })
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &MonitorConfig) -> Result<(), ValidationError> {
        config.validate()?;

        self.validate_token(config)?;
        self.validate_keywords(config)?;
        self.validate_persistence(config);
        Ok(())
    }

    /// A placeholder left in the token means interpolation never ran
    fn validate_token(&self, config: &MonitorConfig) -> Result<(), ValidationError> {
        let token = config.api.bearer_token.expose_secret();
        if let Some(cap) = self.env_var_pattern.captures(token) {
            return Err(ValidationError::new(
                "api.bearer_token",
                ValidationErrorKind::Rejected(format!(
                    "unresolved environment variable '{}'",
                    &cap[1]
                )),
            ));
        }
        Ok(())
    }

    fn validate_keywords(&self, config: &MonitorConfig) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for (i, keyword) in config.api.keywords.iter().enumerate() {
            let normalized = keyword.trim().to_lowercase();
            if normalized.is_empty() {
                continue;
            }
            if !seen.insert(normalized) {
                return Err(ValidationError::new(
                    format!("api.keywords[{}]", i),
                    ValidationErrorKind::Duplicate(keyword.clone()),
                ));
            }
        }

        if config.monitoring.enabled && seen.is_empty() {
            // scheduled collection has nothing to search for
            return Err(ValidationError::missing("api.keywords"));
        }
        Ok(())
    }

    fn validate_persistence(&self, config: &MonitorConfig) {
        if config.conversations.persistence_path.is_none() && config.conversations.flush_on_shutdown
        {
            warn!("conversations.flush_on_shutdown is set but no persistence_path is configured");
        }
    }

    /// Extract environment variable names referenced in `text`
    pub fn extract_env_vars(&self, text: &str) -> Vec<String> {
        self.env_var_pattern
            .captures_iter(text)
            .map(|cap| cap[1].to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretString;

    fn config(yaml: &str) -> MonitorConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_env_var_extraction() {
        let validator = ConfigValidator::new().unwrap();
        let vars = validator.extract_env_vars("token: ${TWITTER_BEARER_TOKEN}, url: ${API_URL}");
        assert_eq!(vars, vec!["TWITTER_BEARER_TOKEN", "API_URL"]);
    }

    #[test]
    fn test_monitoring_requires_keywords() {
        let validator = ConfigValidator::new().unwrap();
        let cfg = config("version: \"0.1\"\napi:\n  bearer_token: abc\n  keywords: [\"  \"]\n");
        let err = validator.validate(&cfg).unwrap_err();
        assert_eq!(err.field_path, "api.keywords");

        let cfg = config(
            "version: \"0.1\"\napi:\n  bearer_token: abc\nmonitoring:\n  enabled: false\n",
        );
        assert!(validator.validate(&cfg).is_ok());
    }

    #[test]
    fn test_duplicate_keywords_rejected() {
        let validator = ConfigValidator::new().unwrap();
        let cfg = config(
            "version: \"0.1\"\napi:\n  bearer_token: abc\n  keywords: [Incendio, incendio]\n",
        );
        let err = validator.validate(&cfg).unwrap_err();
        assert_eq!(err.field_path, "api.keywords[1]");
    }

    #[test]
    fn test_unresolved_token_rejected() {
        let validator = ConfigValidator::new().unwrap();
        let mut cfg = config("version: \"0.1\"\napi:\n  bearer_token: abc\n  keywords: [x]\n");
        cfg.api.bearer_token = SecretString::new("${TWITTER_BEARER_TOKEN}");
        let err = validator.validate(&cfg).unwrap_err();
        assert_eq!(err.field_path, "api.bearer_token");
    }
}
