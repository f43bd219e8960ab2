//! Environment variable interpolation for configuration files

use super::error::ConfigError;
use regex::Regex;
use std::env;

/// Matches `${VAR}` placeholders
pub(crate) const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

pub(crate) fn env_var_regex() -> Result<Regex, ConfigError> {
    Ok(Regex::new(ENV_VAR_PATTERN)?)
}

/// Replace every `${VAR}` in `content` with the variable's value
///
/// Fails on the first placeholder whose variable is not set.
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    let pattern = env_var_regex()?;

    if let Some(missing) = pattern
        .captures_iter(content)
        .map(|cap| cap[1].to_string())
        .find(|var| env::var(var).is_err())
    {
        return Err(ConfigError::MissingEnvVar { var: missing });
    }

    let result = pattern.replace_all(content, |cap: &regex::Captures<'_>| {
        env::var(&cap[1]).unwrap_or_default()
    });
    Ok(result.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_env_vars() {
        env::set_var("TWEETWATCH_ENV_TEST_TOKEN", "secret-value");

        let content = "bearer_token: ${TWEETWATCH_ENV_TEST_TOKEN}";
        let result = interpolate_env_vars(content).unwrap();
        assert_eq!(result, "bearer_token: secret-value");

        env::remove_var("TWEETWATCH_ENV_TEST_TOKEN");
    }

    #[test]
    fn test_missing_env_var() {
        let content = "bearer_token: ${TWEETWATCH_ENV_TEST_MISSING}";
        match interpolate_env_vars(content) {
            Err(ConfigError::MissingEnvVar { var }) => {
                assert_eq!(var, "TWEETWATCH_ENV_TEST_MISSING")
            }
            other => panic!("Expected MissingEnvVar error, got {other:?}"),
        }
    }

    #[test]
    fn test_text_without_placeholders_unchanged() {
        let content = "keywords: [\"$HOME\", \"{braces}\"]";
        assert_eq!(interpolate_env_vars(content).unwrap(), content);
    }
}
