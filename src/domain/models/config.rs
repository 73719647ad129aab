//! Configuration model.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for Cadence
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// HTTP/WebSocket server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Execution backend configuration
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Retry policy for transient execution failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Task storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Realtime fan-out configuration
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allow cross-origin requests from any origin.
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_cors: true,
        }
    }
}

/// Execution backend configuration.
///
/// When either `endpoint` or `api_key` is unset the bridge runs in mock mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionConfig {
    /// Base URL of the remote execution backend
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer credential for the backend
    #[serde(default)]
    pub api_key: Option<String>,

    /// Timeout for `GET {endpoint}/health`
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,

    /// Timeout for a whole task execution
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: u64,

    /// Simulated duration of a mock execution
    #[serde(default = "default_mock_delay_ms")]
    pub mock_delay_ms: u64,

    /// Use the streaming endpoint when dispatching tasks
    #[serde(default = "default_true")]
    pub streaming: bool,
}

const fn default_health_timeout_secs() -> u64 {
    5
}

const fn default_execution_timeout_secs() -> u64 {
    600
}

const fn default_mock_delay_ms() -> u64 {
    2000
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            health_timeout_secs: default_health_timeout_secs(),
            execution_timeout_secs: default_execution_timeout_secs(),
            mock_delay_ms: default_mock_delay_ms(),
            streaming: true,
        }
    }
}

impl ExecutionConfig {
    /// Endpoint and credential, when both are configured.
    pub fn remote(&self) -> Option<(&str, &str)> {
        match (self.endpoint.as_deref(), self.api_key.as_deref()) {
            (Some(endpoint), Some(key)) if !endpoint.is_empty() && !key.is_empty() => {
                Some((endpoint, key))
            }
            _ => None,
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound on any single retry delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    1000
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Which task repository backs the task store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process memory; tasks are lost on exit.
    #[default]
    Memory,
    /// SQLite file at `storage.path`.
    Sqlite,
}

/// Task storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StorageConfig {
    /// Repository implementation.
    #[serde(default)]
    pub backend: StorageBackend,

    /// Path to the `SQLite` database file (sqlite backend only)
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    ".cadence/cadence.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_database_path(),
        }
    }
}

/// Realtime fan-out configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RealtimeConfig {
    /// Outbound buffer per connection; a connection whose buffer is full is dropped
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

const fn default_channel_capacity() -> usize {
    256
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Encoding of log records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable, multi-line.
    Pretty,
}

/// How often log files roll over.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    /// New file each day.
    #[default]
    Daily,
    /// New file each hour.
    Hourly,
    /// Single file.
    Never,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Record encoding.
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rollover of files under `log_dir`.
    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}
