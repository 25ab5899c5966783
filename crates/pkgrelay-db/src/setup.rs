//! Database setup and initialization.
//!
//! This module provides the `setup_database()` function for initializing
//! the `SQLite` database with full schema. Entry points call this with the
//! resolved database path.

use std::path::Path;

use anyhow::Result;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

/// Sets up the `SQLite` database connection and ensures the schema exists.
///
/// This function:
/// 1. Creates the parent directory and database file if missing
/// 2. Enables WAL journaling so readers don't block the dispatcher
/// 3. Creates all tables and indexes
///
/// # Example
///
/// ```rust,no_run
/// use pkgrelay_db::setup_database;
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// let pool = setup_database(Path::new("/var/lib/pkgrelay/pkgrelay.db")).await?;
/// # Ok(())
/// # }
/// ```
pub async fn setup_database(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal),
    )
    .await?;

    create_schema(&pool).await?;
    tracing::debug!(path = %db_path.display(), "Database ready");

    Ok(pool)
}

/// Sets up an in-memory `SQLite` database for testing.
///
/// Creates a fresh in-memory database with the full production schema.
/// The pool holds a single connection so every query sees the same database.
#[cfg(any(test, feature = "test-utils"))]
pub async fn setup_test_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Creates the complete database schema.
///
/// It is safe to call multiple times as all operations use IF NOT EXISTS.
async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS relay_jobs (
            id TEXT PRIMARY KEY NOT NULL,
            asset_id TEXT NOT NULL,
            version TEXT NOT NULL,
            variant TEXT NOT NULL,
            channel TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'queued',
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            seq INTEGER NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_relay_jobs_request
        ON relay_jobs(asset_id, version, variant, channel)
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_relay_jobs_seq ON relay_jobs(seq)")
        .execute(pool)
        .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS credential_cache (
            domain TEXT PRIMARY KEY NOT NULL,
            sealed_token TEXT NOT NULL,
            scope TEXT NOT NULL,
            issued_at INTEGER NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await?;

    Ok(())
}
