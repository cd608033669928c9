use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid budget {0}: {1}. Must be positive")]
    InvalidBudget(&'static str, f64),

    #[error("Invalid cost_per_million_tokens: {0}. Must be positive")]
    InvalidTokenCost(f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database URL cannot be empty")]
    EmptyDatabaseUrl,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Stage base_url cannot be empty")]
    EmptyStageUrl,

    #[error("Invalid stage timeout: {0}. Must be at least 1 second")]
    InvalidStageTimeout(u64),

    #[error("Blob root cannot be empty")]
    EmptyBlobRoot,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .tribunal/config.yaml (project config)
    /// 3. .tribunal/local.yaml (project local overrides, optional)
    /// 4. Environment variables (TRIBUNAL_* prefix, highest priority)
    ///
    /// Configuration is always project-local (pwd/.tribunal/) so several
    /// evaluation workspaces can coexist on one machine.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".tribunal/config.yaml"))
            .merge(Yaml::file(".tribunal/local.yaml"))
            .merge(Env::prefixed("TRIBUNAL_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.url.is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        if config.budget.max_judge_budget_usd <= 0.0 {
            return Err(ConfigError::InvalidBudget(
                "max_judge_budget_usd",
                config.budget.max_judge_budget_usd,
            ));
        }

        if config.budget.max_parse_budget_usd <= 0.0 {
            return Err(ConfigError::InvalidBudget(
                "max_parse_budget_usd",
                config.budget.max_parse_budget_usd,
            ));
        }

        if config.budget.cost_per_million_tokens <= 0.0 {
            return Err(ConfigError::InvalidTokenCost(
                config.budget.cost_per_million_tokens,
            ));
        }

        if config.stage.base_url.is_empty() {
            return Err(ConfigError::EmptyStageUrl);
        }

        if config.stage.timeout_secs == 0 {
            return Err(ConfigError::InvalidStageTimeout(config.stage.timeout_secs));
        }

        if config.blob.root.is_empty() {
            return Err(ConfigError::EmptyBlobRoot);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.database.url, "sqlite:.tribunal/tribunal.db");
        assert_eq!(config.stage.base_url, "http://localhost:8787");
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_validate_zero_judge_budget() {
        let mut config = Config::default();
        config.budget.max_judge_budget_usd = 0.0;

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidBudget("max_judge_budget_usd", _)
        ));
    }

    #[test]
    fn test_validate_negative_token_cost() {
        let mut config = Config::default();
        config.budget.cost_per_million_tokens = -0.1;

        let result = ConfigLoader::validate(&config);
        assert!(matches!(result.unwrap_err(), ConfigError::InvalidTokenCost(_)));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();

        let result = ConfigLoader::validate(&config);
        match result.unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "verbose"),
            other => panic!("Expected InvalidLogLevel, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        let result = ConfigLoader::validate(&config);
        assert!(matches!(result.unwrap_err(), ConfigError::InvalidLogFormat(_)));
    }

    #[test]
    fn test_validate_empty_database_url() {
        let mut config = Config::default();
        config.database.url = String::new();

        let result = ConfigLoader::validate(&config);
        assert!(matches!(result.unwrap_err(), ConfigError::EmptyDatabaseUrl));
    }

    #[test]
    fn test_validate_zero_stage_timeout() {
        let mut config = Config::default();
        config.stage.timeout_secs = 0;

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidStageTimeout(0)
        ));
    }

    #[test]
    fn test_hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "budget:\n  max_judge_budget_usd: 5.0\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(
            override_file,
            "budget:\n  max_judge_budget_usd: 8.0\nlogging:\n  level: debug"
        )
        .unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert!(
            (config.budget.max_judge_budget_usd - 8.0).abs() < f64::EPSILON,
            "Override should win"
        );
        assert_eq!(
            config.logging.level, "debug",
            "Override should win for nested fields"
        );
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
        assert!(
            (config.budget.max_parse_budget_usd - 1.0).abs() < f64::EPSILON,
            "Defaults should fill unspecified fields"
        );
    }
}
