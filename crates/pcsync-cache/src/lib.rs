//! pcsync Cache - Local metadata store
//!
//! SQLite-based persistence for:
//! - The remote metadata cache (`pcs_cache`)
//! - The Action Ledger (`pcs_action`)
//! - The scheduler's task table (`pcs_task`)
//!
//! ## Architecture
//!
//! This crate implements the metadata store ports from `pcsync-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration and version gate
//! - [`SqliteCacheRepository`] - `ICacheRepository` implementation
//! - [`SqliteActionLedger`] - `IActionLedger` implementation
//! - [`SqliteTaskRepository`] - `ITaskRepository` implementation
//! - [`CacheError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use pcsync_cache::{DatabasePool, SqliteActionLedger, SqliteCacheRepository};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/pcsync/cache.db")).await?;
//! let cache = SqliteCacheRepository::new(pool.pool().clone(), "pcsync");
//! let ledger = SqliteActionLedger::new(pool.pool().clone(), "pcsync");
//! # Ok(())
//! # }
//! ```

pub mod action_ledger;
pub mod cache_repository;
pub mod pool;
pub mod task_repository;

pub use action_ledger::SqliteActionLedger;
pub use cache_repository::SqliteCacheRepository;
pub use pool::{DatabasePool, SCHEMA_VERSION};
pub use task_repository::SqliteTaskRepository;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be turned back into a domain value
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}

/// Current time in seconds since the Unix epoch
pub(crate) fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
