//! Pool construction for file and in-memory databases.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure opening a pool.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Not a usable `sqlite:` URL.
    #[error("invalid database URL: {0}")]
    InvalidUrl(String),
    /// The directory holding the database file could not be created.
    #[error("could not create {}: {source}", path.display())]
    CreateDirectory {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// SQLite refused the connection.
    #[error("could not connect: {0}")]
    Open(#[source] sqlx::Error),
}

/// Turn a configured storage path into a `sqlite:` URL. URLs pass through unchanged.
pub fn database_url(path: &str) -> String {
    if path.starts_with("sqlite:") {
        path.to_string()
    } else {
        format!("sqlite:{path}")
    }
}

/// File path named by a `sqlite:` URL, if it names one.
fn database_file(url: &str) -> Option<&Path> {
    let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(Path::new(path))
}

/// WAL-mode pool over a database file, creating the file and its directory.
pub(super) async fn open_file(url: &str) -> Result<SqlitePool, ConnectionError> {
    if let Some(parent) = database_file(url).and_then(Path::parent) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| ConnectionError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(url)
        .map_err(|_| ConnectionError::InvalidUrl(url.to_string()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await
        .map_err(ConnectionError::Open)
}

/// In-memory database on one connection that is never recycled, since
/// closing it would discard the data.
pub(super) async fn open_memory() -> Result<SqlitePool, ConnectionError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|_| ConnectionError::InvalidUrl("sqlite::memory:".to_string()))?;

    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(ConnectionError::Open)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_and_file() {
        assert_eq!(database_url(".cadence/cadence.db"), "sqlite:.cadence/cadence.db");
        assert_eq!(database_url("sqlite::memory:"), "sqlite::memory:");

        assert_eq!(database_file("sqlite:.cadence/cadence.db"), Some(Path::new(".cadence/cadence.db")));
        assert_eq!(database_file("sqlite:///tmp/c.db?mode=rwc"), Some(Path::new("/tmp/c.db")));
        assert_eq!(database_file("sqlite::memory:"), None);
        assert_eq!(database_file("postgres://db"), None);
    }

    #[tokio::test]
    async fn test_file_pool_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state/cadence.db");
        let pool = open_file(&database_url(&path.to_string_lossy())).await.unwrap();

        let (one,): (i64,) = sqlx::query_as("SELECT 1").fetch_one(&pool).await.unwrap();
        assert_eq!(one, 1);
        assert!(path.exists());
    }
}
