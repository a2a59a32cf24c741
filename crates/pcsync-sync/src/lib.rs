//! pcsync Sync - synchronization algorithms and task scheduler
//!
//! Provides:
//! - Update: refresh the remote metadata cache for a subtree
//! - Backup, Restore and Combine between a local and a remote tree
//! - Compare: a dry-run plan of what a sync would change
//! - Reset of stale ledger rows
//! - The scheduler that runs configured items on a fixed timetable
//!
//! ## Modules
//!
//! - [`engine`] - [`SyncEngine`], ledger handling, Combine and Reset
//! - [`update`] - cache refresh by paginated listing
//! - [`backup`] - local to remote with mark-and-sweep deletion
//! - [`restore`] - remote to local, driven by the cache
//! - [`compare`] - dry-run comparison report
//! - [`filesystem`] - local filesystem adapter
//! - [`scheduler`] - timed execution of configured items

pub mod backup;
pub mod compare;
pub mod engine;
pub mod filesystem;
pub mod restore;
pub mod scheduler;
pub mod update;

pub use engine::{CombineStats, SyncEngine, TransferStats};
pub use filesystem::LocalFileSystemAdapter;
pub use scheduler::{TaskRunner, TaskScheduler};
pub use update::UpdateSummary;

use pcsync_core::domain::DomainError;
use thiserror::Error;

/// Errors that can end a sync operation
#[derive(Debug, Error)]
pub enum SyncError {
    /// No valid remote session
    #[error("Not logged in or session timed out: {0}")]
    Auth(String),

    /// Another run holds the ledger row for the same signature
    #[error("Another run of '{action}' is in progress, started by {created_by} at {started_at}")]
    Busy {
        action: String,
        created_by: String,
        started_at: String,
    },

    /// Metadata store failure
    #[error("Metadata store error: {0}")]
    Store(String),

    /// Remote storage failure
    #[error("Remote storage error: {0}")]
    Remote(String),

    /// The remote root is not in the cache
    #[error("The remote path does not exist: {0}")]
    RemoteNotFound(String),

    /// Less free remote space than a Backup requires
    #[error("Insufficient remote space: {free} bytes free, at least {required} required")]
    InsufficientQuota { free: i64, required: i64 },

    /// Same mtime but different content; neither side can win
    #[error("Cannot tell which file is newer: {local} and {remote} differ but share mtime {mtime}")]
    Conflict {
        local: String,
        remote: String,
        mtime: String,
    },

    /// Local filesystem failure
    #[error("Local I/O error: {0}")]
    LocalIo(String),

    /// Invalid configuration or arguments
    #[error("Configuration error: {0}")]
    Config(String),

    /// A path could not be mapped between the two trees
    #[error(transparent)]
    Path(#[from] DomainError),
}

impl SyncError {
    pub(crate) fn store(err: anyhow::Error) -> Self {
        SyncError::Store(format!("{err:#}"))
    }

    pub(crate) fn remote(err: anyhow::Error) -> Self {
        SyncError::Remote(format!("{err:#}"))
    }

    pub(crate) fn local(err: anyhow::Error) -> Self {
        SyncError::LocalIo(format!("{err:#}"))
    }

    /// Whether running the whole operation again could succeed
    ///
    /// Session, lock and configuration problems will not go away on their own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SyncError::Auth(_) | SyncError::Busy { .. } | SyncError::Config(_)
        )
    }
}

/// Result alias for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
