//! Remote metadata entries
//!
//! [`RemoteEntry`] is the metadata the remote storage reports for one object.
//! [`CacheEntry`] is the same metadata as persisted in the local cache, plus
//! the bookkeeping columns the Backup mark-and-sweep relies on.

use serde::{Deserialize, Serialize};

use super::newtypes::RemotePath;

/// `fs_id` stamped on directories created by Backup before the next Update
/// brings in the real identifier.
pub const SYNTHETIC_FS_ID: i64 = 1;

// ============================================================================
// SyncFlag
// ============================================================================

/// Mark bit of the Backup mark-and-sweep pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SyncFlag {
    /// Not yet confirmed by the current pass
    #[default]
    Unset,
    /// Confirmed present on the local side during the current pass
    Succ,
}

impl SyncFlag {
    /// Integer stored in the `flag` column
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            SyncFlag::Unset => 0,
            SyncFlag::Succ => 1,
        }
    }

    /// Anything other than the SUCC bit reads back as unset
    #[must_use]
    pub fn from_code(code: i64) -> Self {
        if code & 1 == 1 {
            SyncFlag::Succ
        } else {
            SyncFlag::Unset
        }
    }
}

// ============================================================================
// RemoteEntry
// ============================================================================

/// Metadata of one remote object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub path: RemotePath,
    pub fs_id: i64,
    pub server_filename: String,
    /// Creation time, seconds since the Unix epoch
    pub server_ctime: i64,
    /// Modification time, seconds since the Unix epoch
    pub server_mtime: i64,
    pub size: i64,
    pub category: i64,
    pub is_dir: bool,
    pub dir_empty: bool,
    pub empty: bool,
    /// Lowercase or uppercase hex digest; compared case-insensitively
    pub md5: Option<String>,
    pub download_link: Option<String>,
    pub has_subdir: bool,
}

impl RemoteEntry {
    /// Placeholder entry for a directory Backup just created
    ///
    /// The server-side identifier is unknown until the next Update, so
    /// [`SYNTHETIC_FS_ID`] is used and both times are `now`.
    #[must_use]
    pub fn synthetic_dir(path: RemotePath, now: i64) -> Self {
        let server_filename = path.file_name().unwrap_or_default().to_string();
        Self {
            path,
            fs_id: SYNTHETIC_FS_ID,
            server_filename,
            server_ctime: now,
            server_mtime: now,
            size: 0,
            category: 0,
            is_dir: true,
            dir_empty: true,
            empty: true,
            md5: None,
            download_link: None,
            has_subdir: false,
        }
    }

    /// Case-insensitive comparison of the stored digest with `other`
    ///
    /// Returns `false` when this entry has no digest.
    #[must_use]
    pub fn md5_matches(&self, other: &str) -> bool {
        self.md5
            .as_deref()
            .map(|own| own.eq_ignore_ascii_case(other))
            .unwrap_or(false)
    }
}

// ============================================================================
// CacheEntry
// ============================================================================

/// A [`RemoteEntry`] as persisted in the metadata cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub meta: RemoteEntry,
    /// Last time the row was written, seconds since the Unix epoch
    pub update_time: i64,
    /// Application name that wrote the row last
    pub updating_app: String,
    pub flag: SyncFlag,
}

impl CacheEntry {
    pub fn path(&self) -> &RemotePath {
        &self.meta.path
    }

    pub fn is_dir(&self) -> bool {
        self.meta.is_dir
    }
}
