//! Remote storage port (driven/secondary port)
//!
//! This module defines the interface the sync algorithms use to reach the
//! remote tree: session checks, quota, metadata, paginated listings and the
//! object operations a sync needs.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and are classified by the sync layer.
//! - Uses `#[async_trait]` for async trait methods.
//! - `delete` reports per-path outcomes so that a batch can partially fail.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::entry::RemoteEntry;
use crate::domain::newtypes::RemotePath;

// ============================================================================
// Quota
// ============================================================================

/// Storage usage of the logged-in account, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub used: i64,
    pub total: i64,
}

impl Quota {
    /// Bytes still available; never negative
    #[must_use]
    pub fn free(&self) -> i64 {
        (self.total - self.used).max(0)
    }
}

// ============================================================================
// DeleteOutcome
// ============================================================================

/// Result of deleting one path as part of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub path: RemotePath,
    /// `None` when the object was deleted
    pub error: Option<String>,
}

impl DeleteOutcome {
    pub fn ok(path: RemotePath) -> Self {
        Self { path, error: None }
    }

    pub fn failed(path: RemotePath, error: impl Into<String>) -> Self {
        Self {
            path,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

// ============================================================================
// IRemoteStorage trait
// ============================================================================

/// Port trait for remote storage operations
///
/// ## Implementation Notes
///
/// - `list` pages are 1-based; a page shorter than `page_size` is the last one.
/// - `upload` with `overwrite` replaces an existing object and must return the
///   metadata of the stored object, with `server_mtime` equal to `local_mtime`
///   when the backend allows setting it.
/// - `meta` returns `Ok(None)` for a missing path rather than an error.
#[async_trait::async_trait]
pub trait IRemoteStorage: Send + Sync {
    /// Whether a valid session is available
    async fn is_logged_in(&self) -> anyhow::Result<bool>;

    /// Identifier of the logged-in account
    async fn user_id(&self) -> anyhow::Result<String>;

    /// Current quota usage
    async fn quota(&self) -> anyhow::Result<Quota>;

    /// Metadata of a single object
    ///
    /// # Arguments
    /// * `path` - Remote path of the object
    ///
    /// # Returns
    /// `None` when nothing exists at `path`
    async fn meta(&self, path: &RemotePath) -> anyhow::Result<Option<RemoteEntry>>;

    /// One page of a directory listing
    ///
    /// # Arguments
    /// * `path` - Remote directory
    /// * `page` - 1-based page index
    /// * `page_size` - Maximum number of entries per page
    async fn list(
        &self,
        path: &RemotePath,
        page: u32,
        page_size: u32,
    ) -> anyhow::Result<Vec<RemoteEntry>>;

    /// Creates a directory, including missing parents
    async fn mkdir(&self, path: &RemotePath) -> anyhow::Result<()>;

    /// Uploads a local file
    ///
    /// # Arguments
    /// * `local` - Local file to read
    /// * `remote` - Destination path
    /// * `overwrite` - Replace an existing object instead of failing
    /// * `local_mtime` - Modification time of the local file, seconds since the epoch
    ///
    /// # Returns
    /// Metadata of the stored object
    async fn upload(
        &self,
        local: &Path,
        remote: &RemotePath,
        overwrite: bool,
        local_mtime: i64,
    ) -> anyhow::Result<RemoteEntry>;

    /// Downloads a remote file into `dest`, replacing its contents
    async fn download(&self, remote: &RemotePath, dest: &Path) -> anyhow::Result<()>;

    /// Deletes a batch of objects
    ///
    /// # Returns
    /// One outcome per requested path, in request order
    async fn delete(&self, paths: &[RemotePath]) -> anyhow::Result<Vec<DeleteOutcome>>;
}
