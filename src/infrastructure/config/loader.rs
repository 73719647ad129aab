//! Layered configuration loading with figment.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::{Config, StorageBackend};

/// Project-local configuration directory.
pub const CONFIG_DIR: &str = ".cadence";

/// Prefix of environment overrides, e.g. `CADENCE_EXECUTION__ENDPOINT`.
pub const ENV_PREFIX: &str = "CADENCE_";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Log level is not one of trace, debug, info, warn or error.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// A timeout that must be positive was zero. Holds the setting name.
    #[error("Invalid {0}: must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must not exceed max_backoff_ms ({1})"
    )]
    /// Initial backoff exceeds the maximum backoff.
    InvalidBackoff(u64, u64),

    /// Realtime channel capacity was zero.
    #[error("Invalid channel_capacity: must be at least 1")]
    ZeroChannelCapacity,

    /// SQLite storage selected without a database path.
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    /// Remote execution endpoint is not an http(s) URL.
    #[error("Invalid execution endpoint: {0}. Must be an http(s) URL")]
    InvalidEndpoint(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .cadence/config.yaml
    /// 3. .cadence/local.yaml (optional local overrides)
    /// 4. Environment variables (CADENCE_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(CONFIG_DIR)
    }

    /// Same as [`load`](Self::load) with the YAML files read from `dir`.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, without environment overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.execution.health_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("health_timeout_secs"));
        }
        if config.execution.execution_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("execution_timeout_secs"));
        }

        if let Some(endpoint) = config.execution.endpoint.as_deref().filter(|e| !e.is_empty()) {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ConfigError::InvalidEndpoint(endpoint.to_string()));
            }
        }

        if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        if config.realtime.channel_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }

        if config.storage.backend == StorageBackend::Sqlite && config.storage.path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::LogFormat;
    use std::fs;

    const ENV_KEYS: [&str; 4] = [
        "CADENCE_SERVER__PORT",
        "CADENCE_EXECUTION__ENDPOINT",
        "CADENCE_EXECUTION__API_KEY",
        "CADENCE_LOGGING__LEVEL",
    ];

    /// Run `f` with every override this module uses cleared, then `vars` applied.
    fn with_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let mut all: Vec<(&str, Option<&str>)> = ENV_KEYS.iter().map(|k| (*k, None)).collect();
        for &(key, value) in vars {
            all.retain(|(k, _)| *k != key);
            all.push((key, Some(value)));
        }
        temp_env::with_vars(all, f)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.logging.level, "info");
        assert!(config.execution.remote().is_none());
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
server:
  port: 8080
execution:
  endpoint: https://agent.example.com
  api_key: secret
  mock_delay_ms: 10
storage:
  backend: sqlite
  path: /var/lib/cadence.db
logging:
  level: debug
  format: pretty
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.execution.remote(), Some(("https://agent.example.com", "secret")));
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.retry.initial_backoff_ms, 1000);
    }

    #[test]
    fn test_missing_files_yield_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = with_env(&[], || ConfigLoader::load_from_dir(dir.path())).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_local_file_overrides_project_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), "server:\n  port: 4000\nlogging:\n  level: warn\n").unwrap();
        fs::write(dir.path().join("local.yaml"), "server:\n  port: 5000\n").unwrap();

        let config = with_env(&[], || ConfigLoader::load_from_dir(dir.path())).unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_env_overrides_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), "server:\n  port: 4000\n").unwrap();

        let config = with_env(
            &[
                ("CADENCE_SERVER__PORT", "6000"),
                ("CADENCE_EXECUTION__ENDPOINT", "http://localhost:8787"),
                ("CADENCE_EXECUTION__API_KEY", "k"),
            ],
            || ConfigLoader::load_from_dir(dir.path()),
        )
        .unwrap();

        assert_eq!(config.server.port, 6000);
        assert_eq!(config.execution.remote(), Some(("http://localhost:8787", "k")));
    }

    #[test]
    fn test_invalid_env_value_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = with_env(&[("CADENCE_LOGGING__LEVEL", "loud")], || {
            ConfigLoader::load_from_dir(dir.path())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        fs::write(&path, "realtime:\n  channel_capacity: 8\n").unwrap();
        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.realtime.channel_capacity, 8);
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel("verbose".to_string()))
        );
    }

    #[test]
    fn test_validate_zero_timeouts() {
        let mut config = Config::default();
        config.execution.health_timeout_secs = 0;
        assert_eq!(ConfigLoader::validate(&config), Err(ConfigError::ZeroTimeout("health_timeout_secs")));

        let mut config = Config::default();
        config.execution.execution_timeout_secs = 0;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ZeroTimeout("execution_timeout_secs"))
        );
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = Config::default();
        config.retry.initial_backoff_ms = 5000;
        config.retry.max_backoff_ms = 1000;
        assert_eq!(ConfigLoader::validate(&config), Err(ConfigError::InvalidBackoff(5000, 1000)));
    }

    #[test]
    fn test_validate_zero_channel_capacity() {
        let mut config = Config::default();
        config.realtime.channel_capacity = 0;
        assert_eq!(ConfigLoader::validate(&config), Err(ConfigError::ZeroChannelCapacity));
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.storage.path = String::new();
        assert!(ConfigLoader::validate(&config).is_ok());

        config.storage.backend = StorageBackend::Sqlite;
        assert_eq!(ConfigLoader::validate(&config), Err(ConfigError::EmptyDatabasePath));
    }

    #[test]
    fn test_validate_endpoint_scheme() {
        let mut config = Config::default();
        config.execution.endpoint = Some("ftp://agent".to_string());
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidEndpoint("ftp://agent".to_string()))
        );
    }
}
