//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStorage`] - Remote tree: session, quota, listing, transfers
//! - [`ILocalFileSystem`] - Local tree: stat, listing, hashing, writes
//! - [`ICacheRepository`], [`IActionLedger`], [`ITaskRepository`] - Persistent metadata store

pub mod local_filesystem;
pub mod metadata_store;
pub mod remote_storage;

pub use local_filesystem::{ILocalFileSystem, LocalEntry, LocalKind, LocalState};
pub use metadata_store::{IActionLedger, ICacheRepository, ITaskRepository, SubtreeOrder};
pub use remote_storage::{DeleteOutcome, IRemoteStorage, Quota};
