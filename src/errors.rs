//! Typed error definitions for resilient_move.
//! Provides a small set of well-known failure modes for better logs and tests.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::fs_ops::ledger::LedgerEntry;

/// Errors surfaced to callers of the protected move/delete operations.
#[derive(Debug, Error)]
pub enum ResilientFsError {
    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("Unknown disk '{0}'")]
    UnknownDisk(String),

    #[error("Circuit breaker '{breaker}' is open; refusing to touch {path} on disk '{disk}'")]
    CircuitOpen {
        breaker: String,
        disk: String,
        path: PathBuf,
    },

    #[error("Failed to move {source_path} after {attempts} attempt(s) (rolled back {rolled_back} earlier move(s))")]
    MoveFailure {
        source_path: PathBuf,
        attempts: u32,
        rolled_back: usize,
        #[source]
        cause: AttemptError,
    },

    #[error("Rollback left {} entr(y/ies) inconsistent: {}", .unresolved.len(), describe_entries(.unresolved))]
    RollbackFailure {
        unresolved: Vec<LedgerEntry>,
        restored: usize,
        #[source]
        cause: AttemptError,
    },

    #[error("Failed to delete {path} on disk '{disk}' after {attempts} attempt(s)")]
    DeleteFailure {
        disk: String,
        path: PathBuf,
        attempts: u32,
        #[source]
        cause: AttemptError,
    },
}

impl ResilientFsError {
    /// Stable numeric code for logs and process exit status.
    pub fn code(&self) -> i32 {
        match self {
            ResilientFsError::Validation(_) => 2,
            ResilientFsError::UnknownDisk(_) => 3,
            ResilientFsError::CircuitOpen { .. } => 10,
            ResilientFsError::MoveFailure { .. } => 20,
            ResilientFsError::RollbackFailure { .. } => 21,
            ResilientFsError::DeleteFailure { .. } => 30,
        }
    }
}

fn describe_entries(entries: &[LedgerEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{} -> {}", e.source.display(), e.destination.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure of a single attempt. Caught, logged and retried until the budget runs out.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("copy validation failed: {0} is missing or empty after copy")]
    CopyValidation(PathBuf),

    #[error("storage refused to {op} {path}")]
    StorageRefused { op: &'static str, path: PathBuf },

    #[error("ledger entry refers to unknown disk '{0}'")]
    UnknownDisk(String),

    #[error("source {source_path} still missing after restoring from {destination}")]
    SourceMissing {
        source_path: PathBuf,
        destination: PathBuf,
    },
}

/// The breaker's backing store could not be reached. Never escapes the breaker.
#[derive(Debug, Error)]
#[error("breaker store unavailable: {0}")]
pub struct StoreUnavailable(pub String);

impl From<io::Error> for StoreUnavailable {
    fn from(e: io::Error) -> Self {
        StoreUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for StoreUnavailable {
    fn from(e: serde_json::Error) -> Self {
        StoreUnavailable(format!("corrupt store document: {e}"))
    }
}
