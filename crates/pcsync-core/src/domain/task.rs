//! Scheduled task records

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Method
// ============================================================================

/// Sync algorithm a scheduled item runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Update,
    Backup,
    Restore,
    Reset,
    Combine,
}

impl Method {
    /// Integer stored in the `method` column
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Method::Update => 1,
            Method::Backup => 2,
            Method::Restore => 3,
            Method::Reset => 4,
            Method::Combine => 5,
        }
    }

    /// # Errors
    /// Returns [`DomainError::UnknownMethod`] for codes outside 1..=5
    pub fn from_code(code: i64) -> Result<Self, DomainError> {
        match code {
            1 => Ok(Method::Update),
            2 => Ok(Method::Backup),
            3 => Ok(Method::Restore),
            4 => Ok(Method::Reset),
            5 => Ok(Method::Combine),
            other => Err(DomainError::UnknownMethod(other.to_string())),
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Method::Update => "update",
            Method::Backup => "backup",
            Method::Restore => "restore",
            Method::Reset => "reset",
            Method::Combine => "combine",
        }
    }

    /// Whether the item needs a local/remote path pair
    #[must_use]
    pub fn needs_paths(self) -> bool {
        !matches!(self, Method::Reset)
    }

    /// Whether the scheduler re-attempts a failed run
    #[must_use]
    pub fn retries(self) -> bool {
        !matches!(self, Method::Reset)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = DomainError;

    /// Accepts the legacy spelling `combin` as well as `combine`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "update" => Ok(Method::Update),
            "backup" => Ok(Method::Backup),
            "restore" => Ok(Method::Restore),
            "reset" => Ok(Method::Reset),
            "combine" | "combin" => Ok(Method::Combine),
            other => Err(DomainError::UnknownMethod(other.to_string())),
        }
    }
}

// ============================================================================
// TaskStatus
// ============================================================================

/// Status and result codes of a task row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Never,
    Running,
    Success,
    Failure,
}

impl TaskStatus {
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            TaskStatus::Never => 0,
            TaskStatus::Running => 1,
            TaskStatus::Success => 2,
            TaskStatus::Failure => 3,
        }
    }

    /// Unknown codes read back as [`TaskStatus::Never`]
    #[must_use]
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => TaskStatus::Running,
            2 => TaskStatus::Success,
            3 => TaskStatus::Failure,
            _ => TaskStatus::Never,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Never => "-------",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failure => "failure",
        }
    }
}

// ============================================================================
// TaskRecord
// ============================================================================

/// One row of the task table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// 1-based position of the item in the configuration
    pub id: i64,
    pub method: Method,
    pub enabled: bool,
    pub md5_enabled: bool,
    pub schedule_offset_secs: i64,
    pub interval_secs: i64,
    pub local_path: String,
    pub remote_path: String,
    pub last_run_time: i64,
    pub next_run_time: i64,
    pub status: TaskStatus,
    pub result: TaskStatus,
    pub start_time: i64,
    pub end_time: i64,
    pub elapsed_secs: i64,
}

impl TaskRecord {
    /// Copies the run history of a previous row with the same signature
    pub fn inherit_history(&mut self, previous: &TaskRecord) {
        self.status = previous.status;
        self.result = previous.result;
        self.start_time = previous.start_time;
        self.end_time = previous.end_time;
        self.elapsed_secs = previous.elapsed_secs;
        self.last_run_time = previous.last_run_time;
    }
}

/// Outcome of one scheduled execution, persisted after the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRun {
    pub enabled: bool,
    pub last_run_time: i64,
    pub next_run_time: i64,
    pub result: TaskStatus,
    pub start_time: i64,
    pub end_time: i64,
}
