//! Durable storage collaborator.
//!
//! A fixed, narrow contract (`exists`, `size`, `copy`, `delete`,
//! `delete_directory`, `directory_exists`) scoped per disk. Paths are always
//! relative to the disk; backends decide what a disk is.

mod local;
mod memory;

pub use local::LocalDisk;
pub use memory::MemoryDisk;

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::errors::ResilientFsError;

pub trait Storage: Send + Sync {
    /// True for both files and directories.
    fn exists(&self, path: &Path) -> io::Result<bool>;
    fn size(&self, path: &Path) -> io::Result<u64>;
    /// Copy a file, creating parent directories and replacing `dst` if present.
    fn copy(&self, src: &Path, dst: &Path) -> io::Result<()>;
    /// `Ok(false)` when nothing was removed.
    fn delete(&self, path: &Path) -> io::Result<bool>;
    /// Recursive. `Ok(false)` when nothing was removed.
    fn delete_directory(&self, path: &Path) -> io::Result<bool>;
    fn directory_exists(&self, path: &Path) -> io::Result<bool>;

    /// Reject a path this disk can never serve (e.g. one escaping its root).
    /// Checked once per call, before the breaker is consulted.
    fn validate_path(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

/// Map a rejected path to `Validation` so it is neither retried nor counted
/// against the breaker.
pub(crate) fn check_paths(
    storage: &dyn Storage,
    disk_id: &str,
    paths: &[&Path],
) -> Result<(), ResilientFsError> {
    for path in paths {
        storage.validate_path(path).map_err(|e| {
            ResilientFsError::Validation(format!(
                "disk '{disk_id}' rejects path '{}': {e}",
                path.display()
            ))
        })?;
    }
    Ok(())
}

/// Disk identifier -> storage backend.
#[derive(Clone, Default)]
pub struct DiskRegistry {
    disks: BTreeMap<String, Arc<dyn Storage>>,
}

impl fmt::Debug for DiskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskRegistry")
            .field("disks", &self.disks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DiskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_disk(mut self, id: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        self.insert(id, storage);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, storage: Arc<dyn Storage>) {
        self.disks.insert(id.into(), storage);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Storage>, ResilientFsError> {
        self.disks
            .get(id)
            .cloned()
            .ok_or_else(|| ResilientFsError::UnknownDisk(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.disks.keys().map(String::as_str)
    }
}
