//! pcsync Remote - remote storage adapter
//!
//! Provides the [`IRemoteStorage`](pcsync_core::ports::IRemoteStorage)
//! implementation used by the CLI and the daemon:
//! - Session file loading (who is logged in, where the remote tree lives)
//! - A directory-backed remote tree with paginated listings and
//!   per-path batch deletes
//!
//! ## Modules
//!
//! - [`session`] - Session file stored at `cookieFilePath`
//! - [`provider`] - [`MirrorRemoteStorage`](provider::MirrorRemoteStorage)

pub mod provider;
pub mod session;

pub use provider::MirrorRemoteStorage;
pub use session::Session;

use thiserror::Error;

/// Errors raised by the remote storage adapter
#[derive(Debug, Error)]
pub enum RemoteError {
    /// No usable session file
    #[error("Not logged in")]
    NotLoggedIn,

    /// The session file exists but cannot be used
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// The requested remote object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// An object already exists where a new one was requested
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The object has the wrong type for the operation
    #[error("Not a {expected}: {path}")]
    WrongType {
        path: String,
        expected: &'static str,
    },

    /// I/O failure on the backing tree
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
