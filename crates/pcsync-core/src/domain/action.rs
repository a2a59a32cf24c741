//! Action Ledger records
//!
//! Every sync operation is identified by a signature string such as
//! `BACKUP: /var/www -> /backup/www`. The ledger keeps one row per signature;
//! a row in the RUNNING state blocks any other run with the same signature
//! until it is finished or reset.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::RemotePath;

/// Application name recorded by interactive runs
pub const APP_NAME: &str = "pcsync";

/// Application name recorded by the scheduler daemon
pub const SERVICE_APP_NAME: &str = "pcsync(svc)";

/// Reserved action key whose `status` column holds the schema version
pub const DB_VERSION_KEY: &str = "DB_VERSION";

// ============================================================================
// ActionStatus
// ============================================================================

/// Lifecycle state of a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionStatus {
    Running,
    Finished,
    Error,
}

impl ActionStatus {
    /// Integer stored in the `status` column
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            ActionStatus::Running => 1,
            ActionStatus::Finished => 2,
            ActionStatus::Error => 3,
        }
    }

    /// # Errors
    /// Returns [`DomainError::UnknownStatus`] for codes outside 1..=3
    pub fn from_code(code: i64) -> Result<Self, DomainError> {
        match code {
            1 => Ok(ActionStatus::Running),
            2 => Ok(ActionStatus::Finished),
            3 => Ok(ActionStatus::Error),
            other => Err(DomainError::UnknownStatus(other)),
        }
    }

    /// Label used by `list-actions`
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ActionStatus::Running => "running",
            ActionStatus::Finished => "success",
            ActionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// ActionRecord
// ============================================================================

/// One row of the Action Ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub row_id: i64,
    pub action: String,
    /// Raw status column; for [`DB_VERSION_KEY`] this is the schema version
    pub status: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub created_by_app: String,
    pub modified_by_app: String,
}

impl ActionRecord {
    /// True for the reserved schema-version row
    #[must_use]
    pub fn is_version_row(&self) -> bool {
        self.action == DB_VERSION_KEY
    }

    /// Decoded status; `None` for the version row and unknown codes
    #[must_use]
    pub fn state(&self) -> Option<ActionStatus> {
        if self.is_version_row() {
            return None;
        }
        ActionStatus::from_code(self.status).ok()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == Some(ActionStatus::Running)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state() == Some(ActionStatus::Finished)
    }

    /// Status column as shown by `list-actions`
    #[must_use]
    pub fn status_label(&self) -> String {
        if self.is_version_row() {
            return self.status.to_string();
        }
        match self.state() {
            Some(state) => state.label().to_string(),
            None => "unknown".to_string(),
        }
    }
}

/// Result of trying to claim a ledger row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The row is now RUNNING on behalf of the caller
    Started,
    /// Another run holds the row; the caller must abort
    Busy(ActionRecord),
}

// ============================================================================
// Signatures
// ============================================================================

/// `UPDATE: <remote>`
#[must_use]
pub fn update_signature(remote: &RemotePath) -> String {
    format!("UPDATE: {remote}")
}

/// `BACKUP: <local> -> <remote>`
#[must_use]
pub fn backup_signature(local: &Path, remote: &RemotePath) -> String {
    format!("BACKUP: {} -> {remote}", local.display())
}

/// `RESTORE: <local> <- <remote>`
#[must_use]
pub fn restore_signature(local: &Path, remote: &RemotePath) -> String {
    format!("RESTORE: {} <- {remote}", local.display())
}

/// `COMPARE: <local> <- <remote>`
#[must_use]
pub fn compare_signature(local: &Path, remote: &RemotePath) -> String {
    format!("COMPARE: {} <- {remote}", local.display())
}
