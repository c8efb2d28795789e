//! Error types for scan orchestration and storage

use thiserror::Error;
use uuid::Uuid;

use crate::model::ScanState;

/// Main error type for scan operations
#[derive(Error, Debug)]
pub enum ScanError {
    /// Identity collision at record creation; ids are assigned once and never reused
    #[error("scan {0} already exists")]
    DuplicateId(Uuid),

    /// Unknown scan id
    #[error("scan {0} not found")]
    NotFound(Uuid),

    /// Requested state change is not an edge of the lifecycle graph
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: ScanState, to: ScanState },

    /// Target already has an active scan; resolves once that scan terminates
    #[error("target '{0}' already has an active scan")]
    AlreadyRunning(String),

    /// Submission named an executor kind with no registered implementation
    #[error("no executor registered for kind '{0}'")]
    UnknownKind(String),

    /// The scan executor reported failure
    #[error("executor failed: {0}")]
    Executor(String),

    /// Synthetic failure applied to scans left running by an unclean shutdown
    #[error("reconciled after unclean shutdown: {0}")]
    Reconciliation(String),

    /// Underlying database error
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// I/O error (database directory creation, child process plumbing)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    /// True for errors a caller should treat as a conflict rather than a fault.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ScanError::AlreadyRunning(_) | ScanError::InvalidTransition { .. }
        )
    }
}

/// Result type alias for scan operations
pub type Result<T> = std::result::Result<T, ScanError>;
