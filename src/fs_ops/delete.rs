//! Breaker-guarded delete with a bounded retry loop.

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::backoff::{Backoff, should_stop, validate_max_attempts};
use crate::breaker::CircuitBreaker;
use crate::errors::{AttemptError, ResilientFsError};
use crate::storage::{DiskRegistry, Storage, check_paths};

#[derive(Debug)]
pub struct FileDeleter {
    breaker: Arc<CircuitBreaker>,
    disks: Arc<DiskRegistry>,
    backoff: Backoff,
}

impl FileDeleter {
    pub fn new(breaker: Arc<CircuitBreaker>, disks: Arc<DiskRegistry>) -> Self {
        FileDeleter {
            breaker,
            disks,
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delete a file or directory on `disk_id`.
    ///
    /// Returns `Ok(true)` once the storage reports the path removed. A storage
    /// call answering `false` counts as a failed attempt. Whether a missing path
    /// is "removed" is up to the storage backend.
    pub fn delete(
        &self,
        disk_id: &str,
        path: impl AsRef<Path>,
        max_attempts: u32,
    ) -> Result<bool, ResilientFsError> {
        let path = path.as_ref();
        validate_max_attempts(max_attempts)?;
        let storage = self.disks.get(disk_id)?;
        check_paths(storage.as_ref(), disk_id, &[path])?;

        if !self.breaker.can_attempt() {
            warn!(breaker = %self.breaker.name(), disk = %disk_id, path = %path.display(), "Circuit open; delete not attempted");
            return Err(ResilientFsError::CircuitOpen {
                breaker: self.breaker.name().to_string(),
                disk: disk_id.to_string(),
                path: path.to_path_buf(),
            });
        }

        let mut attempt = 0;
        let cause = loop {
            attempt += 1;
            match delete_once(storage.as_ref(), path) {
                Ok(()) => {
                    self.breaker.record_success();
                    info!(disk = %disk_id, path = %path.display(), attempt, "Deleted");
                    return Ok(true);
                }
                Err(e) => {
                    warn!(disk = %disk_id, path = %path.display(), attempt, max = max_attempts, error = %e, "Delete attempt failed");
                    if should_stop(attempt, max_attempts, &self.breaker) {
                        break e;
                    }
                    self.backoff.wait();
                }
            }
        };

        self.breaker.record_failure();
        error!(disk = %disk_id, path = %path.display(), attempts = attempt, error = %cause, "Delete failed; giving up");
        Err(ResilientFsError::DeleteFailure {
            disk: disk_id.to_string(),
            path: path.to_path_buf(),
            attempts: attempt,
            cause,
        })
    }
}

fn delete_once(storage: &dyn Storage, path: &Path) -> Result<(), AttemptError> {
    let (op, removed) = if storage.directory_exists(path)? {
        ("delete directory", storage.delete_directory(path)?)
    } else {
        ("delete", storage.delete(path)?)
    };
    if !removed {
        return Err(AttemptError::StorageRefused {
            op,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
