//! Compare: what Combine would do, without doing it
//!
//! Two passes over the same pair:
//!
//! 1. Every cached remote path (the root first, then its subtree in path
//!    order) is checked against the local path it maps to
//! 2. Every local path is looked up in the cache; paths the cache does not
//!    know are reported as remote creations
//!
//! Neither pass writes to the local tree, the remote or the cache flags. Only
//! the ledger row of the comparison itself changes.

use std::path::{Path, PathBuf};

use tracing::info;

use pcsync_core::domain::action::compare_signature;
use pcsync_core::domain::schedule::format_timestamp;
use pcsync_core::domain::{
    local_path_for, remote_path_for, CacheEntry, CompareOp, CompareReport, ObjectType, RemotePath,
    Side,
};
use pcsync_core::ports::{LocalKind, SubtreeOrder};

use crate::engine::SyncEngine;
use crate::{SyncError, SyncResult};

impl SyncEngine {
    /// Lists the operations a two-way sync between `local` and `remote` would
    /// perform
    ///
    /// # Errors
    /// Besides the usual session, ledger and store errors: a remote file
    /// without a digest when `md5` is set, and [`SyncError::Conflict`] when
    /// both sides differ but share an mtime.
    #[tracing::instrument(skip(self), fields(local = %local.display(), remote = %remote))]
    pub async fn compare(
        &self,
        local: &Path,
        remote: &RemotePath,
        md5: bool,
    ) -> SyncResult<CompareReport> {
        self.ensure_logged_in().await?;

        let signature = compare_signature(local, remote);
        self.begin(&signature).await?;
        let outcome = self.run_compare(local, remote, md5).await;
        let report = self.settle(&signature, outcome).await?;

        info!(items = report.items.len(), "Compare finished");
        Ok(report)
    }

    async fn run_compare(
        &self,
        local: &Path,
        remote: &RemotePath,
        md5: bool,
    ) -> SyncResult<CompareReport> {
        self.ensure_fresh(remote).await?;

        let root = self
            .cache
            .get(remote)
            .await
            .map_err(SyncError::store)?
            .ok_or_else(|| SyncError::RemoteNotFound(remote.to_string()))?;

        let mut report = CompareReport::new();
        if root.is_dir() {
            self.compare_dir(local, &mut report).await?;

            let entries = self
                .cache
                .list_subtree(remote, SubtreeOrder::ByPath)
                .await
                .map_err(SyncError::store)?;
            for entry in &entries {
                let target = local_path_for(entry.path(), remote, local)?;
                if entry.is_dir() {
                    self.compare_dir(&target, &mut report).await?;
                } else {
                    self.compare_file(&target, entry, md5, &mut report).await?;
                }
            }
        } else {
            self.compare_file(local, &root, md5, &mut report).await?;
        }

        self.compare_untracked(local, remote, &mut report).await?;
        Ok(report)
    }

    /// A cached directory against the local path it maps to
    async fn compare_dir(&self, local: &Path, report: &mut CompareReport) -> SyncResult<()> {
        let state = self.stat_local(local).await?;
        match state.kind {
            LocalKind::File => report.push(
                CompareOp::Delete,
                ObjectType::File,
                Side::Local,
                local.display().to_string(),
            ),
            LocalKind::Missing => report.push(
                CompareOp::Create,
                ObjectType::Directory,
                Side::Local,
                local.display().to_string(),
            ),
            LocalKind::Directory => {}
        }
        Ok(())
    }

    /// A cached file against the local path it maps to
    async fn compare_file(
        &self,
        local: &Path,
        entry: &CacheEntry,
        md5: bool,
        report: &mut CompareReport,
    ) -> SyncResult<()> {
        let local_name = local.display().to_string();
        let state = self.stat_local(local).await?;

        match state.kind {
            LocalKind::Directory => {
                report.push(CompareOp::Delete, ObjectType::Directory, Side::Local, local_name.clone());
                report.push(CompareOp::Create, ObjectType::File, Side::Local, local_name);
                return Ok(());
            }
            LocalKind::Missing => {
                report.push(CompareOp::Create, ObjectType::File, Side::Local, local_name);
                return Ok(());
            }
            LocalKind::File => {}
        }

        let meta = &entry.meta;
        if md5 {
            if meta.md5.as_deref().map_or(true, str::is_empty) {
                return Err(SyncError::Remote(format!(
                    "the remote file has no md5: {}",
                    meta.path
                )));
            }
            let digest = self.local.md5(local).await.map_err(SyncError::local)?;
            if meta.md5_matches(&digest) {
                return Ok(());
            }
            if state.mtime == meta.server_mtime {
                return Err(SyncError::Conflict {
                    local: local_name,
                    remote: meta.path.to_string(),
                    mtime: format_timestamp(state.mtime),
                });
            }
        }

        if state.mtime < meta.server_mtime {
            report.push(CompareOp::Download, ObjectType::File, Side::Remote, meta.path.as_str());
        } else if state.mtime > meta.server_mtime {
            report.push(CompareOp::Upload, ObjectType::File, Side::Local, local_name);
        }
        Ok(())
    }

    /// Reports local paths the cache has no entry for
    async fn compare_untracked(
        &self,
        local: &Path,
        remote: &RemotePath,
        report: &mut CompareReport,
    ) -> SyncResult<()> {
        let root = self.stat_local(local).await?;
        if !root.exists() {
            return Ok(());
        }

        // Pre-order walk: a directory is reported before its children.
        let mut pending: Vec<(PathBuf, bool)> = vec![(local.to_path_buf(), root.is_dir())];
        while let Some((path, is_dir)) = pending.pop() {
            let remote_path = remote_path_for(&path, local, remote)?;
            self.report_if_untracked(&remote_path, is_dir, report)
                .await?;
            if is_dir {
                let children = self.list_local(&path).await?;
                pending.extend(
                    children
                        .into_iter()
                        .rev()
                        .map(|child| (child.path, child.state.is_dir())),
                );
            }
        }
        Ok(())
    }

    async fn report_if_untracked(
        &self,
        remote: &RemotePath,
        is_dir: bool,
        report: &mut CompareReport,
    ) -> SyncResult<()> {
        let cached = self.cache.get(remote).await.map_err(SyncError::store)?;
        if cached.is_none() {
            let object_type = if is_dir {
                ObjectType::Directory
            } else {
                ObjectType::File
            };
            report.push(CompareOp::Create, object_type, Side::Remote, remote.as_str());
        }
        Ok(())
    }
}
