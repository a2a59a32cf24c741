//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including path validation, schedule parsing and code conversions.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid local path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid remote path format
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// A `HH:MM:SS` or `DD:HH:MM:SS` value that could not be parsed
    #[error("Invalid time specification '{value}': {reason}")]
    InvalidTimeSpec {
        /// The raw value as written in the configuration
        value: String,
        /// What was wrong with it
        reason: String,
    },

    /// Unknown synchronization method name or code
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// Unknown action or task status code
    #[error("Unknown status code: {0}")]
    UnknownStatus(i64),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
