//! Configuration loading and validation.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::RefractConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load full Refract configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<RefractConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: RefractConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &RefractConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(ConfigError::Invalid(
            "version must be greater than 0".to_string(),
        ));
    }

    if config.app.name.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "app.name must not be empty".to_string(),
        ));
    }

    if config.engine.stage_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "engine.stage_timeout_secs must be > 0".to_string(),
        ));
    }

    if config.targets.is_empty() {
        return Err(ConfigError::Invalid(
            "targets must not be empty".to_string(),
        ));
    }

    for (name, profile) in &config.targets {
        if profile.max_chars == 0 {
            return Err(ConfigError::Invalid(format!(
                "targets.{}.max_chars must be > 0",
                name
            )));
        }
        if profile.min_chars > profile.max_chars {
            return Err(ConfigError::Invalid(format!(
                "targets.{}.min_chars exceeds max_chars",
                name
            )));
        }
    }

    if !(0.0..=100.0).contains(&config.verification.score_threshold) {
        return Err(ConfigError::Invalid(
            "verification.score_threshold must be within 0..=100".to_string(),
        ));
    }

    if config.event_bus.channel_capacity == 0 {
        return Err(ConfigError::Invalid(
            "event_bus.channel_capacity must be > 0".to_string(),
        ));
    }

    if config.event_bus.max_subscribers == 0 {
        return Err(ConfigError::Invalid(
            "event_bus.max_subscribers must be > 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let file = write_config("{}");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.version, 1);
        assert_eq!(config.engine.max_retries, 3);
        assert!(config.targets.contains_key("twitter"));
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let file = write_config(
            "engine:\n  max_retries: 5\nverification:\n  forbidden_phrases:\n    - guaranteed returns\n",
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.engine.max_retries, 5);
        assert_eq!(config.engine.stage_timeout_secs, 30);
        assert_eq!(
            config.verification.forbidden_phrases,
            vec!["guaranteed returns"]
        );
    }

    #[test]
    fn test_explicit_targets_replace_catalog() {
        let file = write_config(
            "targets:\n  twitter:\n    max_chars: 280\n    min_chars: 50\n",
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.targets["twitter"].style, "clear and direct");
    }

    #[test]
    fn test_invalid_length_window_is_rejected() {
        let file = write_config(
            "targets:\n  twitter:\n    max_chars: 40\n    min_chars: 50\n",
        );
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("min_chars exceeds max_chars"));
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected() {
        let file = write_config("verification:\n  score_threshold: 140\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_zero_version_is_rejected() {
        let file = write_config("version: 0\n");
        assert!(load_config(file.path()).is_err());
    }
}
