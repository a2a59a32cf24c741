//! Metadata store ports (driven/secondary ports)
//!
//! The persistent store holds three record families, each behind its own
//! trait so the sync layer depends only on what it uses:
//!
//! - [`ICacheRepository`] - remote metadata cache keyed by remote path
//! - [`IActionLedger`] - one row per operation signature, used as a lock
//! - [`ITaskRepository`] - the scheduler's task table
//!
//! Subtree operations never touch the entry equal to the given path, and
//! never match a sibling that merely shares its string prefix.

use crate::domain::action::{ActionRecord, ActionStatus, StartOutcome};
use crate::domain::entry::{CacheEntry, RemoteEntry, SyncFlag};
use crate::domain::newtypes::RemotePath;
use crate::domain::task::{Method, TaskRecord, TaskRun};

/// Ordering of [`ICacheRepository::list_subtree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtreeOrder {
    /// Plain path order
    ByPath,
    /// All directories first, then files, each group in path order
    DirsFirst,
}

// ============================================================================
// ICacheRepository
// ============================================================================

/// Remote Metadata Cache
#[async_trait::async_trait]
pub trait ICacheRepository: Send + Sync {
    /// Entry stored for exactly `path`
    async fn get(&self, path: &RemotePath) -> anyhow::Result<Option<CacheEntry>>;

    /// Inserts an entry, replacing any row with the same path
    async fn add(&self, entry: &RemoteEntry, flag: SyncFlag) -> anyhow::Result<()>;

    /// Rewrites the row for `entry.path`, inserting it when absent
    async fn update(&self, entry: &RemoteEntry, flag: SyncFlag) -> anyhow::Result<()>;

    /// Deletes exactly `path`; descendants are left alone
    ///
    /// # Returns
    /// Number of rows removed
    async fn remove_one(&self, path: &RemotePath) -> anyhow::Result<u64>;

    /// Deletes every strict descendant of `path`
    ///
    /// # Returns
    /// Number of rows removed
    async fn remove_subtree(&self, path: &RemotePath) -> anyhow::Result<u64>;

    /// Sets the flag of exactly `path`
    async fn set_flag(&self, path: &RemotePath, flag: SyncFlag) -> anyhow::Result<u64>;

    /// Sets the flag of every strict descendant of `path`
    async fn set_flags_for_subtree(&self, path: &RemotePath, flag: SyncFlag)
        -> anyhow::Result<u64>;

    /// Every strict descendant of `path`
    async fn list_subtree(
        &self,
        path: &RemotePath,
        order: SubtreeOrder,
    ) -> anyhow::Result<Vec<CacheEntry>>;

    /// Strict descendants of `path` whose flag is not SUCC, in path order
    async fn list_untracked(&self, path: &RemotePath) -> anyhow::Result<Vec<CacheEntry>>;

    /// Total number of cached entries
    async fn count(&self) -> anyhow::Result<i64>;
}

// ============================================================================
// IActionLedger
// ============================================================================

/// Action Ledger
///
/// There is no heartbeat: a process that dies mid-run leaves its row RUNNING
/// until [`IActionLedger::reset_running`] is called.
#[async_trait::async_trait]
pub trait IActionLedger: Send + Sync {
    /// Claims `action` for the calling application
    ///
    /// A missing row is inserted as RUNNING, a RUNNING row yields
    /// [`StartOutcome::Busy`], any other row is switched to RUNNING with a
    /// fresh start time.
    async fn try_start(&self, action: &str) -> anyhow::Result<StartOutcome>;

    /// Records the terminal status and end time of `action`
    async fn finish(&self, action: &str, status: ActionStatus) -> anyhow::Result<()>;

    async fn get(&self, action: &str) -> anyhow::Result<Option<ActionRecord>>;

    async fn remove(&self, action: &str) -> anyhow::Result<()>;

    /// Every row, including the schema version row, by row id
    async fn list_all(&self) -> anyhow::Result<Vec<ActionRecord>>;

    /// Flips every RUNNING row except the version row to ERROR
    ///
    /// # Returns
    /// Number of rows changed
    async fn reset_running(&self) -> anyhow::Result<u64>;

    /// Schema version stored in the version row (0 when absent)
    async fn schema_version(&self) -> anyhow::Result<i64>;
}

// ============================================================================
// ITaskRepository
// ============================================================================

/// Scheduler task table
#[async_trait::async_trait]
pub trait ITaskRepository: Send + Sync {
    /// Row previously stored for the same method and path pair
    async fn find_by_signature(
        &self,
        method: Method,
        local_path: &str,
        remote_path: &str,
    ) -> anyhow::Result<Option<TaskRecord>>;

    /// Replaces the whole table with `tasks`
    async fn rebuild(&self, tasks: &[TaskRecord]) -> anyhow::Result<()>;

    /// Marks a task as running from `start_time`
    async fn mark_running(&self, id: i64, start_time: i64) -> anyhow::Result<()>;

    /// Persists the outcome of one execution
    async fn record_run(&self, id: i64, run: &TaskRun) -> anyhow::Result<()>;

    /// Every task row by id
    async fn list_all(&self) -> anyhow::Result<Vec<TaskRecord>>;
}
