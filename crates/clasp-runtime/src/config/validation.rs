//! Checks a loaded configuration before the runtime uses it.

use std::collections::HashSet;

use clasp_framework::command::CompletionConfig;

use super::error::{ConfigError, ConfigResult};
use super::schema::{ClaspConfig, LogOutput, LoggingConfig};

pub fn validate_config(config: &ClaspConfig) -> ConfigResult<()> {
    validate_logging(&config.logging)?;
    if config.command.cache_capacity == 0 {
        return Err(ConfigError::validation(
            "command.cache_capacity must be at least 1",
        ));
    }
    if let Some(completion) = &config.command.completion {
        validate_completion(completion)?;
    }
    Ok(())
}

fn validate_logging(config: &LoggingConfig) -> ConfigResult<()> {
    if config.output == LogOutput::File && config.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }
    if let Some(target) = config.filters.keys().find(|t| t.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "logging.filters contains an empty target: {target:?}"
        )));
    }
    Ok(())
}

fn validate_completion(config: &CompletionConfig) -> ConfigResult<()> {
    let controls = [
        ("tab", &config.tab),
        ("enter", &config.enter),
        ("exit", &config.exit),
    ];
    let mut seen = HashSet::new();
    for (name, token) in controls {
        if token.trim().is_empty() || token.chars().any(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "command.completion.{name} must be a single non-empty word"
            )));
        }
        if !seen.insert(token.as_str()) {
            return Err(ConfigError::validation(format!(
                "command.completion.{name} reuses the control token {token:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let mut config = ClaspConfig::default();
        config.command.completion = Some(CompletionConfig::default());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let mut config = ClaspConfig::default();
        config.command.cache_capacity = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_rejects_clashing_controls() {
        let mut config = ClaspConfig::default();
        config.command.completion = Some(CompletionConfig {
            exit: ".tab".into(),
            ..Default::default()
        });
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("command.completion.exit"));
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = ClaspConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());
        config.logging.file_path = Some("logs/clasp.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
