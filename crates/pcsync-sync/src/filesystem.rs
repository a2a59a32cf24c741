//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **Whole-second mtimes**: times are read and written through `filetime`
//!   so they compare directly with the server's `server_mtime`.
//! - **MD5 off the runtime**: hashing reads the file in 64 KiB chunks on a
//!   blocking thread.
//! - **Downloads**: [`ILocalFileSystem::temp_path_for`] names a hidden sibling
//!   of the target; [`ILocalFileSystem::replace`] renames it over the target,
//!   which is atomic on the same filesystem.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use anyhow::Context;
use filetime::FileTime;
use pcsync_core::ports::local_filesystem::{ILocalFileSystem, LocalEntry, LocalKind, LocalState};
use tracing::{debug, instrument};

/// Suffix of in-flight download files
pub const TEMP_SUFFIX: &str = ".pcsync-tmp";

const HASH_CHUNK: usize = 64 * 1024;

/// Whether `name` is a download written by [`ILocalFileSystem::temp_path_for`]
pub fn is_download_temp(name: &str) -> bool {
    name.len() > TEMP_SUFFIX.len() + 1 && name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

// ============================================================================
// LocalFileSystemAdapter struct
// ============================================================================

/// Adapter that bridges the [`ILocalFileSystem`] port to the real filesystem.
///
/// This is a zero-sized struct because all operations derive their context
/// from the path arguments.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystemAdapter;

impl LocalFileSystemAdapter {
    /// Create a new `LocalFileSystemAdapter`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn state_of(metadata: &std::fs::Metadata) -> LocalState {
    let kind = if metadata.is_dir() {
        LocalKind::Directory
    } else if metadata.is_file() {
        LocalKind::File
    } else {
        return LocalState::missing();
    };
    LocalState {
        kind,
        size: if metadata.is_file() { metadata.len() } else { 0 },
        mtime: FileTime::from_last_modification_time(metadata).unix_seconds(),
    }
}

/// Hex MD5 of a file's content
///
/// Blocking; call through `spawn_blocking`.
pub fn md5_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; HASH_CHUNK];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    Ok(format!("{:x}", context.compute()))
}

// ============================================================================
// ILocalFileSystem implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystemAdapter {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn stat(&self, path: &Path) -> anyhow::Result<LocalState> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => Ok(state_of(&metadata)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("path not found");
                Ok(LocalState::missing())
            }
            Err(e) => Err(e).with_context(|| format!("Cannot stat {}", path.display())),
        }
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn list_dir(&self, path: &Path) -> anyhow::Result<Vec<LocalEntry>> {
        let mut reader = tokio::fs::read_dir(path)
            .await
            .with_context(|| format!("Cannot list {}", path.display()))?;

        let mut entries = Vec::new();
        while let Some(child) = reader.next_entry().await? {
            let child_path = child.path();
            // Follows symlinks, like stat
            let metadata = match tokio::fs::metadata(&child_path).await {
                Ok(m) => m,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("Cannot stat {}", child_path.display()))
                }
            };
            let state = state_of(&metadata);
            if !state.exists() {
                continue;
            }
            let name = child
                .file_name()
                .into_string()
                .map_err(|raw| anyhow::anyhow!("non UTF-8 file name {raw:?} in {}", path.display()))?;
            entries.push(LocalEntry {
                path: child_path,
                name,
                state,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = entries.len(), "directory listed");
        Ok(entries)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn md5(&self, path: &Path) -> anyhow::Result<String> {
        let owned = path.to_path_buf();
        let digest = tokio::task::spawn_blocking(move || md5_file(&owned))
            .await
            .context("md5 task panicked")?
            .with_context(|| format!("Cannot calculate md5 for {}", path.display()))?;
        debug!(md5 = %digest, "hash computed");
        Ok(digest)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn create_dir_all(&self, path: &Path) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .with_context(|| format!("Cannot create directory {}", path.display()))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn remove(&self, path: &Path) -> anyhow::Result<()> {
        let metadata = match tokio::fs::symlink_metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e).with_context(|| format!("Cannot stat {}", path.display())),
        };

        let removed = if metadata.is_dir() {
            debug!("removing directory recursively");
            tokio::fs::remove_dir_all(path).await
        } else {
            debug!("removing file");
            tokio::fs::remove_file(path).await
        };
        removed.with_context(|| format!("Cannot remove {}", path.display()))
    }

    fn temp_path_for(&self, target: &Path) -> PathBuf {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_name = format!(".{name}{TEMP_SUFFIX}");
        match target.parent() {
            Some(parent) => parent.join(temp_name),
            None => PathBuf::from(temp_name),
        }
    }

    #[instrument(skip(self), fields(temp = %temp.display(), target = %target.display()))]
    async fn replace(&self, temp: &Path, target: &Path) -> anyhow::Result<()> {
        if let Err(e) = tokio::fs::rename(temp, target).await {
            let _ = tokio::fs::remove_file(temp).await;
            return Err(e).with_context(|| format!("Cannot move download into {}", target.display()));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn set_mtime(&self, path: &Path, mtime: i64) -> anyhow::Result<()> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            filetime::set_file_mtime(&owned, FileTime::from_unix_time(mtime, 0))
        })
        .await
        .context("set_mtime task panicked")?
        .with_context(|| format!("Cannot set mtime of {}", path.display()))
    }
}

// ============================================================================
// Unit tests
// ============================================================================
