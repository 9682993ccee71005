//! Breaker-guarded move (copy, verify, delete source) with an undo ledger.
//!
//! A `FileMover` is one call sequence: every successful move is recorded in its
//! ledger until `commit` clears it. When a later move exhausts its attempts,
//! the whole ledger is rolled back (newest first) before the error is raised.
//!
//! Steps:
//! - `attempt`: copy, `verify_copy`, `generate_artifact`, delete the source.
//! - on failure: log, then either back off and retry or stop.
//! - on stop: clean up a partial destination, roll back the ledger, raise.
//! - `undo_with_retry` / `undo_once`: reverse one ledger entry.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::artifact::ArtifactGenerator;
use super::backoff::{Backoff, should_stop, validate_max_attempts};
use super::duplicate::unique_destination;
use super::ledger::{EntryKind, LedgerEntry, UndoLedger};
use crate::breaker::CircuitBreaker;
use crate::errors::{AttemptError, ResilientFsError};
use crate::storage::{DiskRegistry, Storage, check_paths};

pub struct FileMover {
    breaker: Arc<CircuitBreaker>,
    disks: Arc<DiskRegistry>,
    generator: Option<Arc<dyn ArtifactGenerator>>,
    backoff: Backoff,
    ledger: UndoLedger,
}

impl std::fmt::Debug for FileMover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileMover")
            .field("breaker", &self.breaker.name())
            .field("generator", &self.generator.is_some())
            .field("backoff", &self.backoff)
            .field("ledger", &self.ledger)
            .finish()
    }
}

impl FileMover {
    pub fn new(breaker: Arc<CircuitBreaker>, disks: Arc<DiskRegistry>) -> Self {
        FileMover {
            breaker,
            disks,
            generator: None,
            backoff: Backoff::default(),
            ledger: UndoLedger::new(),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn ArtifactGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn ledger(&self) -> &UndoLedger {
        &self.ledger
    }

    /// Accept everything moved so far; the entries can no longer be rolled back.
    pub fn commit(&mut self) -> Vec<LedgerEntry> {
        self.ledger.clear()
    }

    /// Move `source` into `destination_dir` on `disk_id` and return the final path.
    ///
    /// The file keeps its name unless that is taken, in which case `_1`, `_2`,
    /// ... is appended before the extension.
    pub fn move_file(
        &mut self,
        disk_id: &str,
        source: impl AsRef<Path>,
        destination_dir: impl AsRef<Path>,
        max_attempts: u32,
    ) -> Result<PathBuf, ResilientFsError> {
        let source = source.as_ref();
        let destination_dir = destination_dir.as_ref();
        validate_max_attempts(max_attempts)?;
        let name = source.file_name().ok_or_else(|| {
            ResilientFsError::Validation(format!(
                "source '{}' has no file name",
                source.display()
            ))
        })?;
        let storage = self.disks.get(disk_id)?;
        check_paths(storage.as_ref(), disk_id, &[source, destination_dir])?;

        if !self.breaker.can_attempt() {
            warn!(breaker = %self.breaker.name(), disk = %disk_id, path = %source.display(), "Circuit open; move not attempted");
            return Err(ResilientFsError::CircuitOpen {
                breaker: self.breaker.name().to_string(),
                disk: disk_id.to_string(),
                path: source.to_path_buf(),
            });
        }

        let mut destination: Option<PathBuf> = None;
        // Set once a copy into `destination` succeeded; only then is it ours.
        let mut wrote_destination = false;
        let mut attempt = 0;
        let cause = loop {
            attempt += 1;
            let step = resolve_destination(
                storage.as_ref(),
                destination_dir,
                name,
                &mut destination,
                wrote_destination,
            )
            .and_then(|dest| {
                self.attempt(storage.as_ref(), disk_id, source, &dest, &mut wrote_destination)
                    .map(|()| dest)
            });

            match step {
                Ok(dest) => {
                    self.breaker.record_success();
                    info!(disk = %disk_id, from = %source.display(), to = %dest.display(), attempt, "Moved");
                    return Ok(dest);
                }
                Err(e) => {
                    warn!(disk = %disk_id, path = %source.display(), attempt, max = max_attempts, error = %e, "Move attempt failed");
                    if should_stop(attempt, max_attempts, &self.breaker) {
                        break e;
                    }
                    self.backoff.wait();
                }
            }
        };

        self.breaker.record_failure();
        error!(disk = %disk_id, path = %source.display(), attempts = attempt, error = %cause, "Move failed; giving up");
        if let Some(dest) = destination.as_deref().filter(|_| wrote_destination) {
            discard_partial_copy(storage.as_ref(), source, dest);
        }

        let rolled_back = if self.ledger.is_empty() {
            0
        } else {
            self.rollback(max_attempts)?
        };
        Err(ResilientFsError::MoveFailure {
            source_path: source.to_path_buf(),
            attempts: attempt,
            rolled_back,
            cause,
        })
    }

    /// Move several sources into `destination_dir` as one call sequence.
    ///
    /// Stops at the first error. Anything already moved is rolled back before
    /// returning, also when the error came before any attempt was made.
    pub fn move_all<P: AsRef<Path>>(
        &mut self,
        disk_id: &str,
        sources: &[P],
        destination_dir: impl AsRef<Path>,
        max_attempts: u32,
    ) -> Result<Vec<PathBuf>, ResilientFsError> {
        let destination_dir = destination_dir.as_ref();
        let mut moved = Vec::with_capacity(sources.len());
        for source in sources {
            match self.move_file(disk_id, source, destination_dir, max_attempts) {
                Ok(dest) => moved.push(dest),
                Err(e @ (ResilientFsError::MoveFailure { .. } | ResilientFsError::RollbackFailure { .. })) => {
                    return Err(e);
                }
                Err(e) => {
                    if !self.ledger.is_empty() {
                        self.rollback(max_attempts.max(1))?;
                    }
                    return Err(e);
                }
            }
        }
        Ok(moved)
    }

    /// Undo every ledger entry, newest first. Returns how many were undone.
    ///
    /// Undone entries leave the ledger whatever the overall outcome. The breaker
    /// is not consulted here; each entry gets `max_attempts` tries regardless.
    pub fn rollback(&mut self, max_attempts: u32) -> Result<usize, ResilientFsError> {
        validate_max_attempts(max_attempts)?;
        let pending: Vec<LedgerEntry> = self.ledger.entries().iter().rev().cloned().collect();
        let mut restored = 0;
        let mut unresolved = Vec::new();
        let mut last_cause = None;

        for entry in pending {
            match self.undo_with_retry(&entry, max_attempts) {
                Ok(()) => {
                    self.ledger.remove(&entry.source);
                    restored += 1;
                }
                Err(e) => {
                    last_cause = Some(e);
                    unresolved.push(entry);
                }
            }
        }

        let Some(cause) = last_cause else {
            info!(restored, "Rollback complete");
            return Ok(restored);
        };

        self.breaker.record_failure();
        for entry in &unresolved {
            error!(
                disk = %entry.disk,
                source = %entry.source.display(),
                destination = %entry.destination.display(),
                kind = ?entry.kind,
                "Rollback left entry unresolved"
            );
        }
        error!(restored, unresolved = unresolved.len(), error = %cause, "Rollback incomplete");
        Err(ResilientFsError::RollbackFailure {
            unresolved,
            restored,
            cause,
        })
    }

    fn attempt(
        &mut self,
        storage: &dyn Storage,
        disk_id: &str,
        source: &Path,
        destination: &Path,
        wrote_destination: &mut bool,
    ) -> Result<(), AttemptError> {
        storage.copy(source, destination)?;
        *wrote_destination = true;
        verify_copy(storage, destination)?;
        let derived = self.generate_artifact(disk_id, source, destination);

        match storage.delete(source) {
            Ok(true) => {}
            Ok(false) => {
                drop_artifact(storage, derived.as_ref());
                return Err(AttemptError::StorageRefused {
                    op: "delete source",
                    path: source.to_path_buf(),
                });
            }
            Err(e) => {
                drop_artifact(storage, derived.as_ref());
                return Err(e.into());
            }
        }

        self.ledger.record(LedgerEntry::new(disk_id, source, destination));
        if let Some(entry) = derived {
            self.ledger.record(entry);
        }
        Ok(())
    }

    /// Run the generator if one is configured and the source qualifies.
    /// Never fails the move.
    fn generate_artifact(
        &self,
        disk_id: &str,
        source: &Path,
        destination: &Path,
    ) -> Option<LedgerEntry> {
        let generator = self.generator.as_ref()?;
        if !generator.is_eligible(source) {
            return None;
        }
        let outcome = generator.generate(disk_id, destination);
        match (outcome.success, outcome.path) {
            (true, Some(path)) => {
                debug!(disk = %disk_id, destination = %destination.display(), artifact = %path.display(), "Derived artifact generated");
                Some(LedgerEntry::derived(disk_id, destination, path))
            }
            (true, None) => None,
            (false, _) => {
                warn!(
                    disk = %disk_id,
                    destination = %destination.display(),
                    error = outcome.error.as_deref().unwrap_or("unknown error"),
                    "Derived artifact generation failed; continuing"
                );
                None
            }
        }
    }

    fn undo_with_retry(&self, entry: &LedgerEntry, max_attempts: u32) -> Result<(), AttemptError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.undo_once(entry) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        disk = %entry.disk,
                        source = %entry.source.display(),
                        destination = %entry.destination.display(),
                        attempt,
                        max = max_attempts,
                        error = %e,
                        "Undo attempt failed"
                    );
                    if CircuitBreaker::max_attempts_reached(attempt, max_attempts) {
                        return Err(e);
                    }
                    self.backoff.wait();
                }
            }
        }
    }

    fn undo_once(&self, entry: &LedgerEntry) -> Result<(), AttemptError> {
        let storage = self
            .disks
            .get(&entry.disk)
            .map_err(|_| AttemptError::UnknownDisk(entry.disk.clone()))?;
        let (source, destination) = (&entry.source, &entry.destination);

        if !storage.exists(destination)? {
            debug!(destination = %destination.display(), "Nothing to undo; destination already gone");
            return Ok(());
        }

        if entry.kind == EntryKind::Moved {
            if !storage.exists(source)? {
                storage.copy(destination, source)?;
            }
            if !storage.exists(source)? {
                return Err(AttemptError::SourceMissing {
                    source_path: source.clone(),
                    destination: destination.clone(),
                });
            }
        }

        if !storage.delete(destination)? {
            return Err(AttemptError::StorageRefused {
                op: "delete",
                path: destination.clone(),
            });
        }
        debug!(source = %source.display(), destination = %destination.display(), kind = ?entry.kind, "Undone");
        Ok(())
    }
}

/// Pick the destination once; retries reuse it so they overwrite their own
/// partial copy instead of claiming another name. A reserved name this call
/// never wrote is picked again if another writer has since taken it.
fn resolve_destination(
    storage: &dyn Storage,
    dir: &Path,
    name: &OsStr,
    slot: &mut Option<PathBuf>,
    ours: bool,
) -> Result<PathBuf, AttemptError> {
    if let Some(dest) = slot.as_ref() {
        if ours || !storage.exists(dest)? {
            return Ok(dest.clone());
        }
        debug!(destination = %dest.display(), "Reserved name taken by another writer; choosing again");
    }
    let dest = unique_destination(storage, dir, name)?;
    *slot = Some(dest.clone());
    Ok(dest)
}

/// Guard against silent zero-byte or missing copies.
fn verify_copy(storage: &dyn Storage, destination: &Path) -> Result<(), AttemptError> {
    if storage.exists(destination)? && storage.size(destination)? > 0 {
        return Ok(());
    }
    Err(AttemptError::CopyValidation(destination.to_path_buf()))
}

fn drop_artifact(storage: &dyn Storage, entry: Option<&LedgerEntry>) {
    if let Some(entry) = entry
        && let Err(e) = storage.delete(&entry.destination)
    {
        warn!(artifact = %entry.destination.display(), error = %e, "Failed to remove artifact of a failed attempt");
    }
}

/// After giving up, remove the copy this call left at `destination` while the
/// source is still in place, so the failed move leaves no duplicate behind.
fn discard_partial_copy(storage: &dyn Storage, source: &Path, destination: &Path) {
    if let (Ok(true), Ok(true)) = (storage.exists(source), storage.exists(destination)) {
        match storage.delete(destination) {
            Ok(_) => debug!(destination = %destination.display(), "Removed partial copy"),
            Err(e) => warn!(destination = %destination.display(), error = %e, "Failed to remove partial copy"),
        }
    }
}
