//! Restore: make the local tree match the cached remote tree
//!
//! Restore never lists the remote itself. It trusts the metadata cache, which
//! is refreshed first unless the last Update of the remote root finished.
//! Directories come before files so every parent exists when a file lands.
//! Downloads go to a sibling temp file and are renamed into place, so an
//! interrupted transfer never leaves a truncated file under the real name.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use pcsync_core::domain::action::restore_signature;
use pcsync_core::domain::schedule::format_timestamp;
use pcsync_core::domain::{local_path_for, remote_path_for, CacheEntry, RemotePath};
use pcsync_core::ports::{LocalKind, LocalState, SubtreeOrder};

use crate::engine::{Mode, SyncEngine, TransferStats};
use crate::{SyncError, SyncResult};

impl SyncEngine {
    /// Downloads `remote` into `local` and removes local paths the remote
    /// does not have
    ///
    /// # Arguments
    /// * `local` - Local destination
    /// * `remote` - Remote file or directory to restore
    /// * `md5` - Compare content digests instead of mtimes alone
    #[tracing::instrument(skip(self), fields(local = %local.display(), remote = %remote))]
    pub async fn restore(
        &self,
        local: &Path,
        remote: &RemotePath,
        md5: bool,
    ) -> SyncResult<TransferStats> {
        self.restore_with(local, remote, Mode { md5, combine: false })
            .await
    }

    pub(crate) async fn restore_with(
        &self,
        local: &Path,
        remote: &RemotePath,
        mode: Mode,
    ) -> SyncResult<TransferStats> {
        self.ensure_logged_in().await?;

        let signature = restore_signature(local, remote);
        self.begin(&signature).await?;
        let outcome = self.run_restore(local, remote, mode).await;
        let stats = self.settle(&signature, outcome).await?;

        info!(
            downloaded = stats.transferred_files,
            skipped = stats.skipped_files,
            removed = stats.removed_files,
            total = stats.total_files,
            "Restore files"
        );
        info!(
            created = stats.transferred_dirs,
            skipped = stats.skipped_dirs,
            removed = stats.removed_dirs,
            total = stats.total_dirs,
            "Restore dirs"
        );
        Ok(stats)
    }

    async fn run_restore(
        &self,
        local: &Path,
        remote: &RemotePath,
        mode: Mode,
    ) -> SyncResult<TransferStats> {
        self.ensure_fresh(remote).await?;

        let root = self
            .cache
            .get(remote)
            .await
            .map_err(SyncError::store)?
            .ok_or_else(|| SyncError::RemoteNotFound(remote.to_string()))?;

        let mut stats = TransferStats::default();
        if !root.is_dir() {
            self.restore_file(local, &root, mode, &mut stats).await?;
            return Ok(stats);
        }

        self.restore_mkdir(local, &mut stats).await?;

        let entries = self
            .cache
            .list_subtree(remote, SubtreeOrder::DirsFirst)
            .await
            .map_err(SyncError::store)?;
        for entry in &entries {
            let target = local_path_for(entry.path(), remote, local)?;
            if entry.is_dir() {
                self.restore_mkdir(&target, &mut stats).await?;
            } else {
                self.restore_file(&target, entry, mode, &mut stats).await?;
            }
        }

        if !mode.combine {
            self.sweep_local(local, remote, &mut stats).await?;
        }
        Ok(stats)
    }

    /// Makes sure `local` is a directory
    async fn restore_mkdir(&self, local: &Path, stats: &mut TransferStats) -> SyncResult<()> {
        let state = self.stat_local(local).await?;
        stats.total_dirs += 1;

        match state.kind {
            LocalKind::Directory => {
                stats.skipped_dirs += 1;
                return Ok(());
            }
            LocalKind::File => {
                self.local.remove(local).await.map_err(SyncError::local)?;
                stats.removed_files += 1;
            }
            LocalKind::Missing => {}
        }

        self.local
            .create_dir_all(local)
            .await
            .map_err(SyncError::local)?;
        stats.transferred_dirs += 1;
        debug!(local = %local.display(), "Created local directory");
        Ok(())
    }

    /// Downloads one cached file unless the local copy is current
    async fn restore_file(
        &self,
        local: &Path,
        entry: &CacheEntry,
        mode: Mode,
        stats: &mut TransferStats,
    ) -> SyncResult<()> {
        let mut state = self.stat_local(local).await?;

        if state.is_dir() {
            self.local.remove(local).await.map_err(SyncError::local)?;
            stats.removed_dirs += 1;
            state = LocalState::missing();
        }

        let meta = &entry.meta;
        let download = if mode.md5 && state.is_file() && meta.md5.is_some() {
            let digest = self.local.md5(local).await.map_err(SyncError::local)?;
            if meta.md5_matches(&digest) {
                false
            } else if state.mtime == meta.server_mtime {
                return Err(SyncError::Conflict {
                    local: local.display().to_string(),
                    remote: meta.path.to_string(),
                    mtime: format_timestamp(state.mtime),
                });
            } else {
                !mode.combine || state.mtime < meta.server_mtime
            }
        } else if mode.md5 {
            true
        } else {
            !state.exists() || state.mtime < meta.server_mtime
        };

        stats.total_files += 1;
        if !download {
            stats.skipped_files += 1;
            return Ok(());
        }

        let temp = self.local.temp_path_for(local);
        if let Err(e) = self.remote.download(&meta.path, &temp).await {
            if let Err(cleanup) = self.local.remove(&temp).await {
                warn!(
                    temp = %temp.display(),
                    error = %format!("{cleanup:#}"),
                    "Cannot remove partial download"
                );
            }
            return Err(SyncError::remote(
                e.context(format!("Cannot restore {}", meta.path)),
            ));
        }
        self.local
            .replace(&temp, local)
            .await
            .map_err(SyncError::local)?;
        self.local
            .set_mtime(local, meta.server_mtime)
            .await
            .map_err(SyncError::local)?;

        stats.transferred_files += 1;
        info!(remote = %meta.path, local = %local.display(), "Restored");
        Ok(())
    }

    /// Removes every local path under `local` that has no cache entry
    async fn sweep_local(
        &self,
        local: &Path,
        remote: &RemotePath,
        stats: &mut TransferStats,
    ) -> SyncResult<()> {
        let mut pending: Vec<PathBuf> = vec![local.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let children = self.list_local(&dir).await?;
            for child in children {
                let remote_child = remote_path_for(&child.path, local, remote)?;
                let cached = self
                    .cache
                    .get(&remote_child)
                    .await
                    .map_err(SyncError::store)?;

                match cached {
                    Some(entry) if entry.is_dir() && child.state.is_dir() => {
                        pending.push(child.path);
                    }
                    Some(_) => {}
                    None => {
                        self.local
                            .remove(&child.path)
                            .await
                            .map_err(SyncError::local)?;
                        if child.state.is_dir() {
                            stats.removed_dirs += 1;
                        } else {
                            stats.removed_files += 1;
                        }
                        info!(local = %child.path.display(), "Removed");
                    }
                }
            }
        }
        Ok(())
    }
}
