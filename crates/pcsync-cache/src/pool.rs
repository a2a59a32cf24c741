//! Database connection pool management
//!
//! Provides a wrapper around SQLx's SqlitePool with:
//! - Automatic directory creation for database files
//! - WAL journal mode for concurrent reads
//! - Automatic schema creation on first connection
//! - A version gate that applies upgrade statements to older stores
//! - In-memory mode for testing

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use pcsync_core::domain::DB_VERSION_KEY;

use crate::CacheError;

/// Schema version written to the version row of `pcs_action`
pub const SCHEMA_VERSION: i64 = 2;

/// Manages a pool of SQLite connections for the pcsync metadata store
///
/// The pool is configured with:
/// - WAL journal mode for concurrent read access
/// - Case-sensitive `LIKE`, since remote paths are case-sensitive
/// - 5 max connections for file-based databases
/// - 1 connection for in-memory databases (required for data persistence)
/// - 5-second busy timeout to handle write contention between the CLI and the daemon
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Creates a new database pool connected to the specified file
    ///
    /// This will:
    /// 1. Create parent directories if they don't exist
    /// 2. Create the database file if it doesn't exist
    /// 3. Enable WAL journal mode
    /// 4. Create missing tables and upgrade older schemas
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the connection cannot be established,
    /// or `CacheError::MigrationFailed` if schema migrations fail.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .pragma("case_sensitive_like", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to connect to database at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::info!(
            path = %db_path.display(),
            "Metadata store opened"
        );

        Ok(Self { pool })
    }

    /// Creates an in-memory database pool for testing
    ///
    /// Uses a single connection to ensure data persistence across queries
    /// (SQLite in-memory databases are per-connection).
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the connection cannot be established,
    /// or `CacheError::MigrationFailed` if schema migrations fail.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("Invalid in-memory database URL: {}", e))
            })?
            .pragma("case_sensitive_like", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("Failed to create in-memory database: {}", e))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::debug!("In-memory metadata store initialized");

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates missing tables, then applies the version gate
    ///
    /// The version row is only written when `pcs_action` did not exist
    /// before, so a store created by an older build keeps version 0 and
    /// gets the upgrade statements.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), CacheError> {
        let action_table_existed: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'pcs_action'",
        )
        .fetch_optional(pool)
        .await
        .map_err(|e| CacheError::MigrationFailed(format!("Failed to inspect schema: {}", e)))?;

        sqlx::raw_sql(include_str!("migrations/0001_initial.sql"))
            .execute(pool)
            .await
            .map_err(|e| {
                CacheError::MigrationFailed(format!("Failed to run initial migration: {}", e))
            })?;

        if action_table_existed.is_none() {
            Self::write_version(pool, SCHEMA_VERSION).await?;
        }

        let version: i64 = sqlx::query_scalar("SELECT status FROM pcs_action WHERE action = ?")
            .bind(DB_VERSION_KEY)
            .fetch_optional(pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(format!("Failed to read version: {}", e)))?
            .unwrap_or(0);

        if version < SCHEMA_VERSION {
            tracing::info!(from = version, to = SCHEMA_VERSION, "Upgrading metadata store");
            sqlx::raw_sql(include_str!("migrations/0002_path_prefix.sql"))
                .execute(pool)
                .await
                .map_err(|e| {
                    CacheError::MigrationFailed(format!("Failed to upgrade schema: {}", e))
                })?;
            Self::write_version(pool, SCHEMA_VERSION).await?;
        }

        tracing::debug!(version = SCHEMA_VERSION, "Database migrations completed");
        Ok(())
    }

    async fn write_version(pool: &SqlitePool, version: i64) -> Result<(), CacheError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO pcs_action (action, status, start_time, end_time, create_app, modify_app) \
             VALUES (?, ?, ?, ?, '', '') \
             ON CONFLICT(action) DO UPDATE SET status = excluded.status, end_time = excluded.end_time",
        )
        .bind(DB_VERSION_KEY)
        .bind(version)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(|e| CacheError::MigrationFailed(format!("Failed to write version: {}", e)))?;
        Ok(())
    }
}
