//! WooSync Store - Local record and sync-state persistence
//!
//! SQLite-backed storage for:
//! - ERP records (items, attributes, customers, addresses, contacts,
//!   sales orders, stock levels) together with their sync links
//! - Per-scope checkpoints and pass locks
//! - The error log
//!
//! ## Architecture
//!
//! This crate implements the `ILocalStore` and `ISyncStateRepository` ports
//! from `woosync-core`. It is a driven (secondary) adapter in the hexagonal
//! architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteStore`] - Implementation of both ports over one pool
//! - [`StoreError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use woosync_store::{DatabasePool, SqliteStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/woosync/woosync.db")).await?;
//! let store = SqliteStore::new(pool.pool().clone());
//! // Use store as ILocalStore and ISyncStateRepository...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;
mod rows;
pub mod state;

pub use pool::DatabasePool;
pub use repository::SqliteStore;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be converted to or from its domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::SerializationError(e.to_string())
    }
}
