//! CLI command implementations.

pub mod config;
pub mod health;
pub mod parse;
pub mod serve;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::adapters::memory::InMemoryTaskRepository;
use crate::adapters::sqlite::{database_url, initialize_database, SqliteTaskRepository};
use crate::domain::models::{Config, StorageBackend, StorageConfig};
use crate::domain::ports::TaskRepository;
use crate::services::{ExecutionBridge, RetryPolicy, StreamManager, TaskDispatcher, TaskStore};

/// Open the task repository selected by `storage.backend`.
pub async fn build_repository(config: &StorageConfig) -> Result<Arc<dyn TaskRepository>> {
    match config.backend {
        StorageBackend::Memory => {
            info!("using in-memory task storage");
            Ok(Arc::new(InMemoryTaskRepository::new()))
        }
        StorageBackend::Sqlite => {
            let pool = initialize_database(&database_url(&config.path))
                .await
                .with_context(|| format!("Failed to initialize database at {}", config.path))?;
            info!(path = %config.path, "using SQLite task storage");
            Ok(Arc::new(SqliteTaskRepository::new(pool)))
        }
    }
}

/// Execution bridge for the configured backend and retry policy.
pub fn build_bridge(config: &Config) -> Result<ExecutionBridge> {
    ExecutionBridge::from_config(&config.execution, RetryPolicy::from_config(&config.retry))
        .context("Failed to create execution backend")
}

/// Wire the whole task pipeline from configuration.
pub async fn build_dispatcher(config: &Config) -> Result<Arc<TaskDispatcher>> {
    let store = TaskStore::new(build_repository(&config.storage).await?);
    let bridge = build_bridge(config)?;
    let streams = StreamManager::new(config.realtime.channel_capacity);

    Ok(Arc::new(TaskDispatcher::new(
        Arc::new(store),
        Arc::new(bridge),
        Arc::new(streams),
        config.execution.streaming,
    )))
}
