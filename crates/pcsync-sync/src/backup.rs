//! Backup: make the remote tree match the local tree
//!
//! Mark-and-sweep over the cache:
//!
//! 1. Clear the flag on the remote root and everything cached under it
//! 2. Walk the local tree; every path that ends up present remotely, whether
//!    uploaded, created or already current, gets its flag set to SUCC
//! 3. Outside combine mode, delete every cached path still unflagged, in
//!    batches of [`DELETE_BATCH`]
//!
//! A local directory where the cache has a file (or the reverse) replaces the
//! remote object.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use pcsync_core::domain::action::backup_signature;
use pcsync_core::domain::schedule::format_timestamp;
use pcsync_core::domain::{CacheEntry, RemoteEntry, RemotePath, SyncFlag};
use pcsync_core::ports::{LocalKind, LocalState};

use crate::engine::{Mode, SyncEngine, TransferStats};
use crate::{SyncError, SyncResult};

/// Paths per remote delete call during the sweep
pub const DELETE_BATCH: usize = 10;

impl SyncEngine {
    /// Uploads `local` to `remote` and deletes remote objects that no longer
    /// exist locally
    ///
    /// # Arguments
    /// * `local` - Local file or directory to back up
    /// * `remote` - Remote destination
    /// * `md5` - Compare content digests instead of mtimes alone
    #[tracing::instrument(skip(self), fields(local = %local.display(), remote = %remote))]
    pub async fn backup(
        &self,
        local: &Path,
        remote: &RemotePath,
        md5: bool,
    ) -> SyncResult<TransferStats> {
        self.backup_with(local, remote, Mode { md5, combine: false })
            .await
    }

    pub(crate) async fn backup_with(
        &self,
        local: &Path,
        remote: &RemotePath,
        mode: Mode,
    ) -> SyncResult<TransferStats> {
        self.ensure_logged_in().await?;
        self.check_quota().await?;

        let signature = backup_signature(local, remote);
        self.begin(&signature).await?;
        let outcome = self.run_backup(local, remote, mode).await;
        let stats = self.settle(&signature, outcome).await?;

        info!(
            uploaded = stats.transferred_files,
            skipped = stats.skipped_files,
            removed = stats.removed_files,
            total = stats.total_files,
            "Backup files"
        );
        info!(
            created = stats.transferred_dirs,
            skipped = stats.skipped_dirs,
            removed = stats.removed_dirs,
            total = stats.total_dirs,
            "Backup dirs"
        );
        Ok(stats)
    }

    async fn run_backup(
        &self,
        local: &Path,
        remote: &RemotePath,
        mode: Mode,
    ) -> SyncResult<TransferStats> {
        self.ensure_fresh(remote).await?;

        self.cache
            .set_flag(remote, SyncFlag::Unset)
            .await
            .map_err(SyncError::store)?;
        self.cache
            .set_flags_for_subtree(remote, SyncFlag::Unset)
            .await
            .map_err(SyncError::store)?;

        let root = self.stat_local(local).await?;
        let mut stats = TransferStats::default();
        match root.kind {
            LocalKind::Missing => {
                return Err(SyncError::LocalIo(format!(
                    "local path does not exist: {}",
                    local.display()
                )))
            }
            LocalKind::File => {
                self.backup_file(local, &root, remote, mode, &mut stats)
                    .await?
            }
            LocalKind::Directory => self.backup_tree(local, remote, mode, &mut stats).await?,
        }

        if !mode.combine {
            self.sweep_remote(remote, &mut stats).await?;
        }
        Ok(stats)
    }

    async fn backup_tree(
        &self,
        local: &Path,
        remote: &RemotePath,
        mode: Mode,
        stats: &mut TransferStats,
    ) -> SyncResult<()> {
        self.backup_mkdir(remote, stats).await?;

        let mut pending: Vec<(PathBuf, RemotePath)> = vec![(local.to_path_buf(), remote.clone())];
        while let Some((local_dir, remote_dir)) = pending.pop() {
            let children = self.list_local(&local_dir).await?;

            let mut subdirs = Vec::new();
            for child in children {
                let remote_child = remote_dir.join(&child.name)?;
                if child.state.is_dir() {
                    self.backup_mkdir(&remote_child, stats).await?;
                    subdirs.push((child.path, remote_child));
                } else {
                    self.backup_file(&child.path, &child.state, &remote_child, mode, stats)
                        .await?;
                }
            }
            pending.extend(subdirs.into_iter().rev());
        }
        Ok(())
    }

    /// Makes sure a directory exists at `remote`
    async fn backup_mkdir(&self, remote: &RemotePath, stats: &mut TransferStats) -> SyncResult<()> {
        let mut cached = self.cache.get(remote).await.map_err(SyncError::store)?;

        if cached.as_ref().is_some_and(|entry| !entry.is_dir()) {
            self.delete_remote_one(remote).await?;
            stats.removed_files += 1;
            cached = None;
        }

        stats.total_dirs += 1;
        if cached.is_some() {
            self.cache
                .set_flag(remote, SyncFlag::Succ)
                .await
                .map_err(SyncError::store)?;
            stats.skipped_dirs += 1;
            return Ok(());
        }

        self.remote.mkdir(remote).await.map_err(SyncError::remote)?;
        let entry = RemoteEntry::synthetic_dir(remote.clone(), Utc::now().timestamp());
        self.cache
            .add(&entry, SyncFlag::Succ)
            .await
            .map_err(SyncError::store)?;
        stats.transferred_dirs += 1;
        debug!(remote = %remote, "Created remote directory");
        Ok(())
    }

    /// Uploads one file unless the cached copy is current
    async fn backup_file(
        &self,
        local: &Path,
        state: &LocalState,
        remote: &RemotePath,
        mode: Mode,
        stats: &mut TransferStats,
    ) -> SyncResult<()> {
        let mut cached = self.cache.get(remote).await.map_err(SyncError::store)?;

        if cached.as_ref().is_some_and(CacheEntry::is_dir) {
            self.delete_remote_one(remote).await?;
            stats.removed_dirs += 1;
            cached = None;
        }

        let upload = match cached.as_ref() {
            Some(entry) if mode.md5 && entry.meta.md5.is_some() => {
                let digest = self.local.md5(local).await.map_err(SyncError::local)?;
                if entry.meta.md5_matches(&digest) {
                    false
                } else if state.mtime == entry.meta.server_mtime {
                    return Err(SyncError::Conflict {
                        local: local.display().to_string(),
                        remote: remote.to_string(),
                        mtime: format_timestamp(state.mtime),
                    });
                } else {
                    !mode.combine || state.mtime > entry.meta.server_mtime
                }
            }
            _ if mode.md5 => true,
            entry => state.mtime > entry.map_or(0, |e| e.meta.server_mtime),
        };

        stats.total_files += 1;
        if !upload {
            self.cache
                .set_flag(remote, SyncFlag::Succ)
                .await
                .map_err(SyncError::store)?;
            stats.skipped_files += 1;
            return Ok(());
        }

        let stored = self
            .remote
            .upload(local, remote, true, state.mtime)
            .await
            .map_err(|e| SyncError::remote(e.context(format!("Cannot back up {}", local.display()))))?;

        let written = if cached.is_some() {
            self.cache.update(&stored, SyncFlag::Succ).await
        } else {
            self.cache.add(&stored, SyncFlag::Succ).await
        };
        written.map_err(SyncError::store)?;

        stats.transferred_files += 1;
        info!(local = %local.display(), remote = %stored.path, "Backed up");
        Ok(())
    }

    /// Deletes every cached path under `remote` the walk did not mark
    ///
    /// Descendants of a deleted directory go with it and are not sent again.
    async fn sweep_remote(&self, remote: &RemotePath, stats: &mut TransferStats) -> SyncResult<()> {
        let untracked = self
            .cache
            .list_untracked(remote)
            .await
            .map_err(SyncError::store)?;

        let mut removed_dirs: Vec<RemotePath> = Vec::new();
        let mut batch: Vec<RemotePath> = Vec::with_capacity(DELETE_BATCH);

        for entry in untracked {
            if entry.is_dir() {
                stats.removed_dirs += 1;
            } else {
                stats.removed_files += 1;
            }

            let path = entry.meta.path;
            if removed_dirs.iter().any(|dir| path.relative_to(dir).is_some()) {
                continue;
            }
            if entry.meta.is_dir {
                removed_dirs.push(path.clone());
            }

            batch.push(path);
            if batch.len() >= DELETE_BATCH {
                self.delete_batch(&batch).await?;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.delete_batch(&batch).await?;
        }
        Ok(())
    }

    /// Deletes `paths` remotely and drops them from the cache
    ///
    /// Any per-path failure aborts the sweep.
    async fn delete_batch(&self, paths: &[RemotePath]) -> SyncResult<()> {
        let outcomes = self.remote.delete(paths).await.map_err(SyncError::remote)?;

        for outcome in outcomes {
            if let Some(error) = outcome.error {
                return Err(SyncError::Remote(format!(
                    "cannot remove {}: {error}",
                    outcome.path
                )));
            }
            self.cache
                .remove_subtree(&outcome.path)
                .await
                .map_err(SyncError::store)?;
            self.cache
                .remove_one(&outcome.path)
                .await
                .map_err(SyncError::store)?;
            info!(remote = %outcome.path, "Removed");
        }
        Ok(())
    }

    /// Removes the object at `remote` and its cache rows
    async fn delete_remote_one(&self, remote: &RemotePath) -> SyncResult<()> {
        self.delete_batch(std::slice::from_ref(remote)).await
    }
}
