//! Domain newtypes with validation
//!
//! [`RemotePath`] is the validated form of a path in the remote tree. It also
//! owns the subtree prefix rule used by every cache query that works on a
//! whole directory: the pattern is the path plus a `/` boundary plus a
//! wildcard, so `/backup` never matches `/backup2`.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Escape character used in `LIKE ... ESCAPE` clauses built from paths.
pub const LIKE_ESCAPE: char = '\\';

// ============================================================================
// RemotePath
// ============================================================================

/// An absolute, `/`-separated path in the remote tree
///
/// Trailing slashes are stripped (except for the root) so that two spellings
/// of the same directory produce the same cache key and action signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    /// Create a new RemotePath
    ///
    /// # Errors
    /// Returns error if the path is relative, contains empty segments or
    /// contains a `.`/`..` segment.
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let mut path = path.into();
        if !path.starts_with('/') {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path must start with '/': {path}"
            )));
        }

        while path.len() > 1 && path.ends_with('/') {
            path.pop();
        }

        if path.len() > 1 {
            for segment in path[1..].split('/') {
                if segment.is_empty() {
                    return Err(DomainError::InvalidRemotePath(format!(
                        "Remote path contains invalid double slashes: {path}"
                    )));
                }
                if segment == "." || segment == ".." {
                    return Err(DomainError::InvalidRemotePath(format!(
                        "Remote path contains invalid traversal: {path}"
                    )));
                }
            }
        }

        Ok(Self(path))
    }

    /// Create the root path "/"
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for "/"
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Join a single path component
    ///
    /// # Errors
    /// Returns error if component is empty, contains `/`, or is `.`/`..`
    pub fn join(&self, component: &str) -> Result<Self, DomainError> {
        if component.is_empty() || component.contains('/') || component == "." || component == ".."
        {
            return Err(DomainError::InvalidRemotePath(format!(
                "Invalid path component: {component}"
            )));
        }

        let new_path = if self.is_root() {
            format!("/{component}")
        } else {
            format!("{}/{component}", self.0)
        };

        Ok(Self(new_path))
    }

    /// Get the parent path
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }

        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Get the file name component
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }

        self.0.rsplit('/').next()
    }

    /// Path of `self` relative to `base`, without a leading slash
    ///
    /// Returns `Some("")` when both are equal and `None` when `self` is not
    /// inside `base`.
    #[must_use]
    pub fn relative_to<'a>(&'a self, base: &RemotePath) -> Option<&'a str> {
        if self == base {
            return Some("");
        }
        if base.is_root() {
            return Some(&self.0[1..]);
        }
        self.0
            .strip_prefix(base.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    }

    /// `LIKE` pattern matching every strict descendant of this path
    ///
    /// SQL wildcards inside the path are escaped with [`LIKE_ESCAPE`].
    #[must_use]
    pub fn subtree_pattern(&self) -> String {
        subtree_pattern(&self.0)
    }
}

/// `LIKE` pattern matching every strict descendant of `path`
///
/// Appends `/` when missing, then `%`. The path itself and any sibling that
/// merely shares a string prefix are never matched.
#[must_use]
pub fn subtree_pattern(path: &str) -> String {
    let mut pattern = String::with_capacity(path.len() + 2);
    for ch in path.chars() {
        if ch == '%' || ch == '_' || ch == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(ch);
    }
    if !pattern.ends_with('/') {
        pattern.push('/');
    }
    pattern.push('%');
    pattern
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemotePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RemotePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}

impl AsRef<str> for RemotePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Local <-> remote path mapping
// ============================================================================

/// Maps a local path under `local_base` to its remote counterpart under `remote_base`
///
/// # Errors
/// Returns error if `local` is not inside `local_base` or a component is not
/// valid UTF-8.
pub fn remote_path_for(
    local: &Path,
    local_base: &Path,
    remote_base: &RemotePath,
) -> Result<RemotePath, DomainError> {
    let relative = local.strip_prefix(local_base).map_err(|_| {
        DomainError::InvalidPath(format!(
            "{} is not inside {}",
            local.display(),
            local_base.display()
        ))
    })?;

    let mut remote = remote_base.clone();
    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                let name = name.to_str().ok_or_else(|| {
                    DomainError::InvalidPath(format!("non UTF-8 path: {}", local.display()))
                })?;
                remote = remote.join(name)?;
            }
            Component::CurDir => {}
            _ => {
                return Err(DomainError::InvalidPath(format!(
                    "unexpected component in {}",
                    local.display()
                )))
            }
        }
    }
    Ok(remote)
}

/// Maps a remote path under `remote_base` to its local counterpart under `local_base`
///
/// # Errors
/// Returns error if `remote` is not inside `remote_base`.
pub fn local_path_for(
    remote: &RemotePath,
    remote_base: &RemotePath,
    local_base: &Path,
) -> Result<PathBuf, DomainError> {
    let relative = remote.relative_to(remote_base).ok_or_else(|| {
        DomainError::InvalidRemotePath(format!("{remote} is not inside {remote_base}"))
    })?;

    let mut local = local_base.to_path_buf();
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        local.push(segment);
    }
    Ok(local)
}
