//! SQLite task storage.
//!
//! [`initialize_database`] opens the file-backed pool the server uses and
//! brings its schema up to date; [`SqliteTaskRepository`] reads and writes
//! tasks through it.

mod connection;
mod migrations;
mod task_repository;

pub use connection::{database_url, ConnectionError};
pub use migrations::MigrationError;
pub use task_repository::SqliteTaskRepository;

use sqlx::SqlitePool;

/// Failure opening the task database.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// The pool could not be opened.
    #[error("could not open database: {0}")]
    Connection(#[from] ConnectionError),
    /// The schema could not be brought up to date.
    #[error("could not migrate schema: {0}")]
    Migration(#[from] MigrationError),
}

/// Open the database at `url`, creating the file if needed, and migrate it.
pub async fn initialize_database(url: &str) -> Result<SqlitePool, DatabaseError> {
    let pool = connection::open_file(url).await?;
    migrations::migrate(&pool).await?;
    Ok(pool)
}

/// Migrated in-memory database, private to the returned pool.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = connection::open_memory().await?;
    migrations::migrate(&pool).await?;
    Ok(pool)
}
