//! Directory-backed implementation of [`IRemoteStorage`]
//!
//! The remote tree lives under the `root` directory named by the session
//! file. Remote path `/a/b` maps to `<root>/a/b`.
//!
//! ## Design Notes
//!
//! - All disk work runs on the blocking pool via `spawn_blocking`.
//! - `fs_id` is derived from the MD5 of the remote path, so it is stable
//!   across listings and never equals the synthetic id Backup stamps.
//! - Listings are sorted by name, then paged with 1-based page indexes.
//! - Uploads are written to a hidden sibling and renamed into place, then the
//!   stored mtime is set to the caller's local mtime.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use filetime::FileTime;
use pcsync_core::domain::entry::SYNTHETIC_FS_ID;
use pcsync_core::domain::{RemoteEntry, RemotePath};
use pcsync_core::ports::{DeleteOutcome, IRemoteStorage, Quota};
use tracing::{debug, instrument, warn};

use crate::session::Session;
use crate::RemoteError;

// ============================================================================
// Categories
// ============================================================================

const CATEGORY_VIDEO: i64 = 1;
const CATEGORY_AUDIO: i64 = 2;
const CATEGORY_PICTURE: i64 = 3;
const CATEGORY_DOCUMENT: i64 = 4;
const CATEGORY_APPLICATION: i64 = 5;
const CATEGORY_OTHER: i64 = 6;
const CATEGORY_TORRENT: i64 = 7;

/// Category code reported for an object name
fn category_for(name: &str, is_dir: bool) -> i64 {
    if is_dir {
        return CATEGORY_OTHER;
    }
    let ext = match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return CATEGORY_OTHER,
    };
    match ext.as_str() {
        "mp4" | "mkv" | "avi" | "mov" | "wmv" | "flv" | "webm" => CATEGORY_VIDEO,
        "mp3" | "flac" | "wav" | "ogg" | "aac" | "m4a" => CATEGORY_AUDIO,
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" | "svg" => CATEGORY_PICTURE,
        "txt" | "md" | "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "csv" => {
            CATEGORY_DOCUMENT
        }
        "exe" | "msi" | "apk" | "deb" | "rpm" | "dmg" => CATEGORY_APPLICATION,
        "torrent" => CATEGORY_TORRENT,
        _ => CATEGORY_OTHER,
    }
}

/// Stable identifier for a remote path
fn fs_id_for(path: &RemotePath) -> i64 {
    let digest = md5::compute(path.as_str().as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.0[..8]);
    (i64::from_be_bytes(head) & i64::MAX).max(SYNTHETIC_FS_ID + 1)
}

fn unix_secs(time: std::io::Result<std::time::SystemTime>) -> Option<i64> {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
}

/// Hex MD5 of a file, read in 64 KiB chunks
fn file_md5(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut context = md5::Context::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }
    Ok(format!("{:x}", context.compute()))
}

/// Builds the metadata of the object stored at `disk`
///
/// Returns `None` when nothing exists there.
fn read_entry(path: &RemotePath, disk: &Path) -> Result<Option<RemoteEntry>, RemoteError> {
    let metadata = match std::fs::metadata(disk) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let is_dir = metadata.is_dir();
    let mtime = unix_secs(metadata.modified()).unwrap_or(0);
    let ctime = unix_secs(metadata.created()).unwrap_or(mtime);
    let name = path.file_name().unwrap_or_default().to_string();

    let (dir_empty, has_subdir, md5, size) = if is_dir {
        let mut dir_empty = true;
        let mut has_subdir = false;
        for child in std::fs::read_dir(disk)? {
            let child = child?;
            dir_empty = false;
            if child.file_type()?.is_dir() {
                has_subdir = true;
                break;
            }
        }
        (dir_empty, has_subdir, None, 0)
    } else {
        (false, false, Some(file_md5(disk)?), metadata.len() as i64)
    };

    Ok(Some(RemoteEntry {
        path: path.clone(),
        fs_id: fs_id_for(path),
        category: category_for(&name, is_dir),
        server_filename: name,
        server_ctime: ctime,
        server_mtime: mtime,
        size,
        is_dir,
        dir_empty,
        empty: if is_dir { dir_empty } else { size == 0 },
        md5,
        download_link: None,
        has_subdir,
    }))
}

/// Total size of every file under `dir`
fn tree_size(dir: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            total += tree_size(&entry.path())?;
        } else if file_type.is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// Runs blocking disk work off the async executor
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, RemoteError> + Send + 'static,
{
    let value = tokio::task::spawn_blocking(work)
        .await
        .context("Remote storage worker failed")??;
    Ok(value)
}

// ============================================================================
// MirrorRemoteStorage
// ============================================================================

/// Remote storage rooted at the directory named by the session file
#[derive(Debug, Clone, Default)]
pub struct MirrorRemoteStorage {
    session: Option<Session>,
}

impl MirrorRemoteStorage {
    /// Opens the storage described by the session file at `session_path`
    ///
    /// A missing or unusable session file leaves the storage logged out;
    /// the reason is logged as a warning.
    pub fn open(session_path: &Path) -> Self {
        let session = match Session::load(session_path) {
            Ok(session) => session,
            Err(e) => {
                warn!(path = %session_path.display(), error = %e, "Ignoring session file");
                None
            }
        };
        Self { session }
    }

    /// Storage for an already loaded session
    pub fn with_session(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    fn session(&self) -> Result<&Session, RemoteError> {
        self.session.as_ref().ok_or(RemoteError::NotLoggedIn)
    }

    /// Location of `path` inside the backing directory
    fn disk_path(&self, path: &RemotePath) -> Result<PathBuf, RemoteError> {
        let mut disk = self.session()?.root.clone();
        for segment in path.as_str().split('/').filter(|s| !s.is_empty()) {
            disk.push(segment);
        }
        Ok(disk)
    }
}

#[async_trait::async_trait]
impl IRemoteStorage for MirrorRemoteStorage {
    async fn is_logged_in(&self) -> Result<bool> {
        Ok(self.session.is_some())
    }

    async fn user_id(&self) -> Result<String> {
        Ok(self.session()?.uid.clone())
    }

    #[instrument(skip(self))]
    async fn quota(&self) -> Result<Quota> {
        let session = self.session()?;
        let root = session.root.clone();
        let total = session.quota_total();
        let used = blocking(move || Ok(tree_size(&root)?)).await?;
        debug!(used, total, "Quota");
        Ok(Quota {
            used: used as i64,
            total,
        })
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn meta(&self, path: &RemotePath) -> Result<Option<RemoteEntry>> {
        let disk = self.disk_path(path)?;
        let path = path.clone();
        blocking(move || read_entry(&path, &disk)).await
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn list(&self, path: &RemotePath, page: u32, page_size: u32) -> Result<Vec<RemoteEntry>> {
        let disk = self.disk_path(path)?;
        let path = path.clone();
        let skip = (page.max(1) as usize - 1) * page_size as usize;

        let entries = blocking(move || {
            let metadata = match std::fs::metadata(&disk) {
                Ok(m) => m,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(RemoteError::NotFound(path.to_string()))
                }
                Err(e) => return Err(e.into()),
            };
            if !metadata.is_dir() {
                return Err(RemoteError::WrongType {
                    path: path.to_string(),
                    expected: "directory",
                });
            }

            let mut names = Vec::new();
            for child in std::fs::read_dir(&disk)? {
                let child = child?;
                match child.file_name().into_string() {
                    Ok(name) => names.push(name),
                    Err(raw) => warn!(name = ?raw, "Skipping non UTF-8 name"),
                }
            }
            names.sort();

            let mut entries = Vec::new();
            for name in names.into_iter().skip(skip).take(page_size as usize) {
                let child_path = path
                    .join(&name)
                    .map_err(|e| RemoteError::NotFound(e.to_string()))?;
                if let Some(entry) = read_entry(&child_path, &disk.join(&name))? {
                    entries.push(entry);
                }
            }
            Ok(entries)
        })
        .await?;

        debug!(page, count = entries.len(), "Listed page");
        Ok(entries)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn mkdir(&self, path: &RemotePath) -> Result<()> {
        let disk = self.disk_path(path)?;
        let path = path.clone();
        blocking(move || {
            if disk.is_file() {
                return Err(RemoteError::AlreadyExists(path.to_string()));
            }
            std::fs::create_dir_all(&disk)?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, local), fields(remote = %remote))]
    async fn upload(
        &self,
        local: &Path,
        remote: &RemotePath,
        overwrite: bool,
        local_mtime: i64,
    ) -> Result<RemoteEntry> {
        let name = remote
            .file_name()
            .ok_or_else(|| RemoteError::WrongType {
                path: remote.to_string(),
                expected: "file",
            })?
            .to_string();
        let disk = self.disk_path(remote)?;
        let local = local.to_path_buf();
        let remote = remote.clone();

        let entry = blocking(move || {
            if disk.is_dir() {
                return Err(RemoteError::WrongType {
                    path: remote.to_string(),
                    expected: "file",
                });
            }
            if disk.exists() && !overwrite {
                return Err(RemoteError::AlreadyExists(remote.to_string()));
            }
            let parent = disk
                .parent()
                .ok_or_else(|| RemoteError::NotFound(remote.to_string()))?;
            std::fs::create_dir_all(parent)?;

            let staging = parent.join(format!(".{name}.pcsync-upload"));
            std::fs::copy(&local, &staging)?;
            std::fs::rename(&staging, &disk)?;
            filetime::set_file_mtime(&disk, FileTime::from_unix_time(local_mtime, 0))?;

            read_entry(&remote, &disk)?.ok_or_else(|| RemoteError::NotFound(remote.to_string()))
        })
        .await?;

        debug!(size = entry.size, "Uploaded");
        Ok(entry)
    }

    #[instrument(skip(self, dest), fields(remote = %remote))]
    async fn download(&self, remote: &RemotePath, dest: &Path) -> Result<()> {
        let disk = self.disk_path(remote)?;
        let dest = dest.to_path_buf();
        let remote = remote.clone();
        blocking(move || {
            if !disk.exists() {
                return Err(RemoteError::NotFound(remote.to_string()));
            }
            if !disk.is_file() {
                return Err(RemoteError::WrongType {
                    path: remote.to_string(),
                    expected: "file",
                });
            }
            std::fs::copy(&disk, &dest)?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, paths), fields(count = paths.len()))]
    async fn delete(&self, paths: &[RemotePath]) -> Result<Vec<DeleteOutcome>> {
        let mut targets = Vec::with_capacity(paths.len());
        for path in paths {
            targets.push((path.clone(), self.disk_path(path)?));
        }

        blocking(move || {
            let outcomes: Vec<DeleteOutcome> = targets
                .into_iter()
                .map(|(path, disk)| {
                    if path.is_root() {
                        return DeleteOutcome::failed(path, "cannot delete the root directory");
                    }
                    let removed = match std::fs::symlink_metadata(&disk) {
                        Ok(m) if m.is_dir() => std::fs::remove_dir_all(&disk),
                        Ok(_) => std::fs::remove_file(&disk),
                        Err(e) => Err(e),
                    };
                    match removed {
                        Ok(()) => DeleteOutcome::ok(path),
                        Err(e) if e.kind() == ErrorKind::NotFound => {
                            DeleteOutcome::failed(path, "not found")
                        }
                        Err(e) => DeleteOutcome::failed(path, e.to_string()),
                    }
                })
                .collect();
            Ok(outcomes)
        })
        .await
    }
}
