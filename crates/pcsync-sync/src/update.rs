//! Update: refresh the metadata cache for a remote subtree
//!
//! The cached row for the root and every cached descendant are dropped, then
//! the root is re-fetched. For a directory the listing is walked page by page
//! (100 entries, 1-based), inserting each entry and descending into
//! subdirectories. A page shorter than the page size ends a directory.

use serde::Serialize;
use tracing::{debug, info};

use pcsync_core::domain::action::update_signature;
use pcsync_core::domain::{RemotePath, SyncFlag};

use crate::engine::SyncEngine;
use crate::{SyncError, SyncResult};

/// Listing page size used by Update
pub const PAGE_SIZE: u32 = 100;

/// Entry counts collected by one Update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    /// Whether the remote root existed
    pub found: bool,
    /// Entries directly under the root
    pub direct: u64,
    /// Entries anywhere under the root
    pub total: u64,
}

impl SyncEngine {
    /// Re-reads the remote metadata of `remote` and everything under it
    ///
    /// A remote path that does not exist is not an error: the cache simply no
    /// longer holds it and the ledger row ends FINISHED.
    ///
    /// # Errors
    /// [`SyncError::Auth`] without a session, [`SyncError::Busy`] when another
    /// Update of the same path runs, store or remote errors otherwise.
    #[tracing::instrument(skip(self), fields(remote = %remote))]
    pub async fn update(&self, remote: &RemotePath) -> SyncResult<UpdateSummary> {
        self.ensure_logged_in().await?;
        let signature = update_signature(remote);
        self.begin(&signature).await?;
        let outcome = self.refresh_cache(remote).await;
        self.settle(&signature, outcome).await
    }

    async fn refresh_cache(&self, remote: &RemotePath) -> SyncResult<UpdateSummary> {
        self.cache.remove_one(remote).await.map_err(SyncError::store)?;
        self.cache.remove_subtree(remote).await.map_err(SyncError::store)?;

        let meta = match self.remote.meta(remote).await.map_err(SyncError::remote)? {
            Some(meta) => meta,
            None => {
                info!(remote = %remote, "Remote path does not exist");
                return Ok(UpdateSummary::default());
            }
        };

        self.cache
            .add(&meta, SyncFlag::Unset)
            .await
            .map_err(SyncError::store)?;

        let mut summary = UpdateSummary {
            found: true,
            ..UpdateSummary::default()
        };
        if !meta.is_dir {
            info!(remote = %remote, "Remote path is a file");
            return Ok(summary);
        }

        // Depth-first, children in listing order.
        let mut pending = vec![remote.clone()];
        while let Some(dir) = pending.pop() {
            let mut subdirs = Vec::new();
            let mut page = 1;
            loop {
                let items = self
                    .remote
                    .list(&dir, page, PAGE_SIZE)
                    .await
                    .map_err(SyncError::remote)?;
                let count = items.len() as u64;

                for item in &items {
                    self.cache
                        .add(item, SyncFlag::Unset)
                        .await
                        .map_err(SyncError::store)?;
                    if item.is_dir {
                        subdirs.push(item.path.clone());
                    }
                }

                summary.total += count;
                if dir == *remote {
                    summary.direct += count;
                }
                debug!(dir = %dir, page, count, "Cached listing page");

                if count < u64::from(PAGE_SIZE) {
                    break;
                }
                page += 1;
            }
            pending.extend(subdirs.into_iter().rev());
        }

        info!(direct = summary.direct, total = summary.total, "Cache updated");
        Ok(summary)
    }
}
