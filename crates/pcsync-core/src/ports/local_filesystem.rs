//! Local filesystem port (driven/secondary port)
//!
//! This module defines the interface for interacting with the local
//! filesystem: stat, directory listing, content hashing and the writes a
//! Restore performs.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//! - Modification times are whole seconds since the Unix epoch, the same unit
//!   the remote storage reports.
//! - Downloads go to a sibling temporary file which is then moved over the
//!   target, so an interrupted download never leaves a truncated file.

use std::path::{Path, PathBuf};

// ============================================================================
// LocalState
// ============================================================================

/// What, if anything, exists at a local path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    Missing,
    File,
    Directory,
}

/// Snapshot of a local path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalState {
    pub kind: LocalKind,
    /// Size in bytes (0 for directories or missing paths)
    pub size: u64,
    /// Modification time, seconds since the epoch (0 when missing)
    pub mtime: i64,
}

impl LocalState {
    /// Returns a state representing a non-existent path
    pub fn missing() -> Self {
        Self {
            kind: LocalKind::Missing,
            size: 0,
            mtime: 0,
        }
    }

    pub fn exists(&self) -> bool {
        self.kind != LocalKind::Missing
    }

    pub fn is_file(&self) -> bool {
        self.kind == LocalKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == LocalKind::Directory
    }
}

/// One child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub path: PathBuf,
    pub name: String,
    pub state: LocalState,
}

// ============================================================================
// ILocalFileSystem trait
// ============================================================================

/// Port trait for local filesystem operations
///
/// ## Implementation Notes
///
/// - `stat` returns [`LocalState::missing`] instead of an error for absent paths.
/// - `list_dir` skips entries that are neither files nor directories and
///   returns the rest sorted by name.
/// - `remove` is recursive for directories and succeeds on missing paths.
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Gets the current state of a file or directory
    async fn stat(&self, path: &Path) -> anyhow::Result<LocalState>;

    /// Lists the direct children of a directory
    async fn list_dir(&self, path: &Path) -> anyhow::Result<Vec<LocalEntry>>;

    /// Hex MD5 digest of a file's contents
    async fn md5(&self, path: &Path) -> anyhow::Result<String>;

    /// Creates a directory and all parent directories as needed
    async fn create_dir_all(&self, path: &Path) -> anyhow::Result<()>;

    /// Removes a file, or a directory with everything under it
    async fn remove(&self, path: &Path) -> anyhow::Result<()>;

    /// Temporary sibling path a download into `target` should write to
    fn temp_path_for(&self, target: &Path) -> PathBuf;

    /// Moves a finished temporary file over `target`
    async fn replace(&self, temp: &Path, target: &Path) -> anyhow::Result<()>;

    /// Sets the modification time of `path`
    async fn set_mtime(&self, path: &Path, mtime: i64) -> anyhow::Result<()>;
}
