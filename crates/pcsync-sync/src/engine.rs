//! Synchronization engine
//!
//! The [`SyncEngine`] owns the four ports every algorithm works through and
//! the steps the algorithms share:
//!
//! 1. **Session check**: every operation except Reset requires a login
//! 2. **Ledger claim**: the operation signature is switched to RUNNING, or the
//!    operation aborts as busy without touching the holder's row
//! 3. **Cache freshness**: Backup, Restore and Compare run Update first unless
//!    the `UPDATE: <remote>` row is FINISHED
//! 4. **Settle**: the signature row ends FINISHED on success, ERROR otherwise
//!
//! The algorithms themselves live in [`crate::update`], [`crate::backup`],
//! [`crate::restore`] and [`crate::compare`] as further `impl SyncEngine`
//! blocks. All calls are awaited in order; nothing runs in parallel.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use pcsync_core::domain::action::update_signature;
use pcsync_core::domain::schedule::format_timestamp;
use pcsync_core::domain::{ActionRecord, ActionStatus, RemotePath, StartOutcome};
use pcsync_core::ports::{
    IActionLedger, ICacheRepository, ILocalFileSystem, IRemoteStorage, LocalEntry, LocalState,
};

use crate::filesystem::is_download_temp;
use crate::{SyncError, SyncResult};

/// Backup refuses to start with less free remote space than this (10 MiB)
pub const MIN_FREE_BYTES: i64 = 10 * 1024 * 1024;

// ============================================================================
// Statistics
// ============================================================================

/// Counters reported by Backup and Restore
///
/// `transferred_*` counts uploads for Backup and downloads for Restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub transferred_files: u64,
    pub skipped_files: u64,
    pub removed_files: u64,
    pub total_files: u64,
    pub transferred_dirs: u64,
    pub skipped_dirs: u64,
    pub removed_dirs: u64,
    pub total_dirs: u64,
}

/// Counters of both halves of a Combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CombineStats {
    pub backup: TransferStats,
    pub restore: TransferStats,
}

/// Flags that change how Backup and Restore decide per file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Mode {
    /// Compare content digests instead of relying on mtimes alone
    pub md5: bool,
    /// Two-way merge: newer side wins, nothing is swept
    pub combine: bool,
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Runs the sync algorithms against a remote storage, a local filesystem and
/// the metadata store
///
/// ## Dependencies
///
/// - `remote`: session, quota, listings and transfers
/// - `local`: stat, listing, hashing and writes on the local tree
/// - `cache`: remote metadata cache
/// - `ledger`: Action Ledger; its application name is the one recorded in rows
pub struct SyncEngine {
    pub(crate) remote: Arc<dyn IRemoteStorage>,
    pub(crate) local: Arc<dyn ILocalFileSystem>,
    pub(crate) cache: Arc<dyn ICacheRepository>,
    pub(crate) ledger: Arc<dyn IActionLedger>,
}

impl SyncEngine {
    /// Creates a new `SyncEngine` with the given dependencies
    ///
    /// # Arguments
    /// * `remote` - Remote storage operations (IRemoteStorage)
    /// * `local` - Local file operations (ILocalFileSystem)
    /// * `cache` - Remote metadata cache (ICacheRepository)
    /// * `ledger` - Action Ledger (IActionLedger)
    pub fn new(
        remote: Arc<dyn IRemoteStorage>,
        local: Arc<dyn ILocalFileSystem>,
        cache: Arc<dyn ICacheRepository>,
        ledger: Arc<dyn IActionLedger>,
    ) -> Self {
        Self {
            remote,
            local,
            cache,
            ledger,
        }
    }

    // ========================================================================
    // Combine / Reset
    // ========================================================================

    /// Backup then Restore in combine mode over the same pair
    ///
    /// Neither half sweeps; where both sides hold a different file, the one
    /// with the newer mtime wins. Restore only runs if Backup succeeded.
    #[tracing::instrument(skip(self), fields(local = %local.display(), remote = %remote))]
    pub async fn combine(
        &self,
        local: &Path,
        remote: &RemotePath,
        md5: bool,
    ) -> SyncResult<CombineStats> {
        let mode = Mode { md5, combine: true };
        let backup = self.backup_with(local, remote, mode).await?;
        let restore = self.restore_with(local, remote, mode).await?;
        Ok(CombineStats { backup, restore })
    }

    /// Flips every RUNNING ledger row except the version row to ERROR
    ///
    /// Used after a crash left rows stuck in RUNNING. Needs no login.
    ///
    /// # Returns
    /// Number of rows changed
    #[tracing::instrument(skip(self))]
    pub async fn reset(&self) -> SyncResult<u64> {
        let changed = self.ledger.reset_running().await.map_err(SyncError::store)?;
        info!(changed, "Reset finished");
        Ok(changed)
    }

    // ========================================================================
    // Shared steps
    // ========================================================================

    pub(crate) async fn ensure_logged_in(&self) -> SyncResult<()> {
        let logged_in = self.remote.is_logged_in().await.map_err(SyncError::remote)?;
        if !logged_in {
            return Err(SyncError::Auth("no valid session".to_string()));
        }
        match self.remote.user_id().await {
            Ok(uid) => info!(uid = %uid, "Session valid"),
            Err(e) => warn!(error = %format!("{e:#}"), "Cannot read user id"),
        }
        Ok(())
    }

    /// Fails when the remote has less than [`MIN_FREE_BYTES`] free
    ///
    /// A quota query that fails is logged and ignored.
    pub(crate) async fn check_quota(&self) -> SyncResult<()> {
        match self.remote.quota().await {
            Ok(quota) => {
                info!(used = quota.used, total = quota.total, "Quota");
                if quota.free() < MIN_FREE_BYTES {
                    return Err(SyncError::InsufficientQuota {
                        free: quota.free(),
                        required: MIN_FREE_BYTES,
                    });
                }
            }
            Err(e) => warn!(error = %format!("{e:#}"), "Quota query failed, continuing"),
        }
        Ok(())
    }

    /// Claims the ledger row for `action`
    pub(crate) async fn begin(&self, action: &str) -> SyncResult<()> {
        match self.ledger.try_start(action).await.map_err(SyncError::store)? {
            StartOutcome::Started => Ok(()),
            StartOutcome::Busy(holder) => Err(busy(&holder)),
        }
    }

    /// Records how `action` ended and passes the outcome through
    ///
    /// If the ledger write fails after a successful run, the run fails with a
    /// store error; after a failed run the original error is kept.
    pub(crate) async fn settle<T>(&self, action: &str, outcome: SyncResult<T>) -> SyncResult<T> {
        let status = if outcome.is_ok() {
            ActionStatus::Finished
        } else {
            ActionStatus::Error
        };

        match self.ledger.finish(action, status).await {
            Ok(()) => {
                if let Err(ref e) = outcome {
                    warn!(action, error = %e, "Action failed");
                }
                outcome
            }
            Err(ledger_err) => match outcome {
                Ok(_) => Err(SyncError::store(ledger_err)),
                Err(e) => {
                    warn!(action, error = %format!("{ledger_err:#}"), "Cannot record failure");
                    Err(e)
                }
            },
        }
    }

    /// Runs Update for `remote` unless its ledger row says the cache is current
    pub(crate) async fn ensure_fresh(&self, remote: &RemotePath) -> SyncResult<()> {
        let signature = update_signature(remote);
        let row = self.ledger.get(&signature).await.map_err(SyncError::store)?;
        match row {
            Some(row) if row.is_running() => Err(busy(&row)),
            Some(row) if row.is_finished() => Ok(()),
            _ => {
                info!(remote = %remote, "Updating local cache");
                self.update(remote).await.map(|_| ())
            }
        }
    }

    pub(crate) async fn stat_local(&self, path: &Path) -> SyncResult<LocalState> {
        self.local.stat(path).await.map_err(SyncError::local)
    }

    /// Children of a local directory, without in-flight download files
    pub(crate) async fn list_local(&self, dir: &Path) -> SyncResult<Vec<LocalEntry>> {
        let mut children = self.local.list_dir(dir).await.map_err(SyncError::local)?;
        children.retain(|child| !is_download_temp(&child.name));
        Ok(children)
    }
}

fn busy(holder: &ActionRecord) -> SyncError {
    SyncError::Busy {
        action: holder.action.clone(),
        created_by: holder.created_by_app.clone(),
        started_at: format_timestamp(holder.start_time),
    }
}
