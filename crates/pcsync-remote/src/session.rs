//! Session file stored at `cookieFilePath`
//!
//! The session is a small JSON document:
//!
//! ```json
//! { "uid": "alice", "root": "/srv/pcsync/alice", "quotaBytes": 2199023255552 }
//! ```
//!
//! `root` is the directory that backs the remote tree. `quotaBytes` is
//! optional; when absent the adapter reports [`DEFAULT_QUOTA_BYTES`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::RemoteError;

/// Quota reported when the session does not carry one (2 TiB)
pub const DEFAULT_QUOTA_BYTES: i64 = 2 * 1024 * 1024 * 1024 * 1024;

/// A logged-in account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub uid: String,
    pub root: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_bytes: Option<i64>,
}

impl Session {
    pub fn new(uid: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            uid: uid.into(),
            root: root.into(),
            quota_bytes: None,
        }
    }

    #[must_use]
    pub fn with_quota(mut self, bytes: i64) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    pub fn quota_total(&self) -> i64 {
        self.quota_bytes.unwrap_or(DEFAULT_QUOTA_BYTES)
    }

    /// Loads the session stored at `path`
    ///
    /// # Returns
    /// `None` if no session file exists
    ///
    /// # Errors
    /// [`RemoteError::InvalidSession`] when the file cannot be read or parsed,
    /// or when it names an empty user or a relative root.
    pub fn load(path: &Path) -> Result<Option<Self>, RemoteError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No session file");
                return Ok(None);
            }
            Err(e) => {
                return Err(RemoteError::InvalidSession(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };

        let session: Session = serde_json::from_str(&raw).map_err(|e| {
            RemoteError::InvalidSession(format!("cannot parse {}: {e}", path.display()))
        })?;

        if session.uid.trim().is_empty() {
            return Err(RemoteError::InvalidSession("empty uid".to_string()));
        }
        if !session.root.is_absolute() {
            return Err(RemoteError::InvalidSession(format!(
                "root must be absolute: {}",
                session.root.display()
            )));
        }

        debug!(uid = %session.uid, "Loaded session");
        Ok(Some(session))
    }

    /// Writes the session to `path`, creating parent directories
    pub fn store(&self, path: &Path) -> Result<(), RemoteError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RemoteError::InvalidSession(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
