//! Domain entities and business logic
//!
//! This module contains the core domain types for pcsync:
//! - Validated remote paths and the local/remote path mapping
//! - Remote metadata and cache entries
//! - Action Ledger records and operation signatures
//! - Scheduled task records and schedule arithmetic
//! - The Compare plan and its report
//! - Domain-specific error types

pub mod action;
pub mod compare;
pub mod entry;
pub mod errors;
pub mod newtypes;
pub mod schedule;
pub mod task;

// Re-export commonly used types
pub use action::{ActionRecord, ActionStatus, StartOutcome, APP_NAME, DB_VERSION_KEY, SERVICE_APP_NAME};
pub use compare::{CompareItem, CompareOp, CompareReport, CompareTotals, ObjectType, Side};
pub use entry::{CacheEntry, RemoteEntry, SyncFlag};
pub use errors::DomainError;
pub use newtypes::*;
pub use task::{Method, TaskRecord, TaskRun, TaskStatus};
