//! In-memory undo ledger for one mover call sequence.
//!
//! Entries are keyed by their source path and kept in insertion order. A derived
//! artifact is keyed by `destination + "_derived"` so it can be undone on its
//! own. Nothing here is persisted.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// What undoing an entry means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A moved file: restore `source` from `destination`, then remove `destination`.
    Moved,
    /// A generated artifact: just remove `destination`.
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub disk: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: EntryKind,
}

impl LedgerEntry {
    pub fn new(
        disk: impl Into<String>,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        LedgerEntry {
            disk: disk.into(),
            source: source.into(),
            destination: destination.into(),
            kind: EntryKind::Moved,
        }
    }

    /// Entry for an artifact generated from the file at `moved_to`.
    pub fn derived(
        disk: impl Into<String>,
        moved_to: &Path,
        artifact: impl Into<PathBuf>,
    ) -> Self {
        let mut key = OsString::from(moved_to.as_os_str());
        key.push("_derived");
        LedgerEntry {
            disk: disk.into(),
            source: PathBuf::from(key),
            destination: artifact.into(),
            kind: EntryKind::Derived,
        }
    }
}

#[derive(Debug, Default)]
pub struct UndoLedger {
    entries: Vec<LedgerEntry>,
}

impl UndoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. An entry with the same source is replaced in place.
    pub fn record(&mut self, entry: LedgerEntry) {
        match self.entries.iter_mut().find(|e| e.source == entry.source) {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn remove(&mut self, source: &Path) -> Option<LedgerEntry> {
        let idx = self.entries.iter().position(|e| e.source == source)?;
        Some(self.entries.remove(idx))
    }

    pub fn get(&self, source: &Path) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.source == source)
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry, handing them back to the caller.
    pub fn clear(&mut self) -> Vec<LedgerEntry> {
        std::mem::take(&mut self.entries)
    }
}
