//! Schema migrations compiled into the binary.
//!
//! Applied versions are recorded in `schema_migrations`; each migration runs
//! in its own transaction together with its version row.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

struct Migration {
    version: i64,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "create tasks table",
    sql: include_str!("../../../migrations/001_create_tasks.sql"),
}];

/// Failure bringing the schema up to date.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The version table could not be created or read.
    #[error("could not read schema version: {0}")]
    Version(#[source] sqlx::Error),
    /// A migration failed and was rolled back.
    #[error("migration {version} failed: {source}")]
    Apply {
        /// Version of the failed migration.
        version: i64,
        /// Underlying database error.
        #[source]
        source: sqlx::Error,
    },
}

/// Apply every migration newer than the recorded version. Returns how many ran.
pub(super) async fn migrate(pool: &SqlitePool) -> Result<usize, MigrationError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await
    .map_err(MigrationError::Version)?;

    let current = current_version(pool).await?;
    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(pool, migration).await?;
        info!(version = migration.version, description = migration.description, "applied migration");
        applied += 1;
    }
    Ok(applied)
}

async fn current_version(pool: &SqlitePool) -> Result<i64, MigrationError> {
    let (version,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
        .fetch_one(pool)
        .await
        .map_err(MigrationError::Version)?;
    Ok(version)
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<(), MigrationError> {
    let failed = |source| MigrationError::Apply {
        version: migration.version,
        source,
    };

    let mut tx = pool.begin().await.map_err(failed)?;
    sqlx::raw_sql(migration.sql).execute(&mut *tx).await.map_err(failed)?;
    sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.description)
        .execute(&mut *tx)
        .await
        .map_err(failed)?;
    tx.commit().await.map_err(failed)
}
