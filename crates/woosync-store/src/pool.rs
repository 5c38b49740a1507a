//! Database connection pool management
//!
//! Wraps SQLx's `SqlitePool`:
//! - parent directories of the database file are created on demand
//! - WAL journal mode, so the CLI can read while the daemon writes
//! - the schema is applied on every open (statements are idempotent)
//! - an in-memory mode for tests

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::StoreError;

/// Full schema; every statement is `IF NOT EXISTS`
const SCHEMA: &str = include_str!("migrations/0001_woosync_schema.sql");

/// Pool of SQLite connections to the WooSync database
///
/// File databases get 5 connections and a 5 second busy timeout. In-memory
/// databases are per connection, so they get exactly one.
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the database at `db_path`
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConnectionFailed` if the file cannot be opened,
    /// or `StoreError::MigrationFailed` if the schema cannot be applied.
    pub async fn new(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::ConnectionFailed(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                StoreError::ConnectionFailed(format!(
                    "Failed to connect to database at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        Self::apply_schema(&pool).await?;
        tracing::info!(path = %db_path.display(), "Opened WooSync database");

        Ok(Self { pool })
    }

    /// Creates an in-memory database for tests
    ///
    /// # Errors
    ///
    /// Same as [`DatabasePool::new`].
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                StoreError::ConnectionFailed(format!("Failed to create in-memory database: {}", e))
            })?;

        Self::apply_schema(&pool).await?;
        tracing::debug!("In-memory database ready");

        Ok(Self { pool })
    }

    /// The underlying SQLite pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn apply_schema(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("Failed to apply schema: {}", e)))?;
        Ok(())
    }
}
