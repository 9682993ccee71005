//! Local filesystem disk rooted at a directory.
//!
//! Paths handed to the disk must be relative and must not climb out of the root
//! (`..`); anything else is rejected with `InvalidInput` before touching the
//! filesystem. Copies go through `fs_ops::safe_copy_and_rename`, so a reader
//! never observes a half-written destination.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::Storage;
use crate::fs_ops::helpers::io_error_with_help_io;
use crate::fs_ops::safe_copy_and_rename;

#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
    missing_is_deleted: bool,
}

impl LocalDisk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            missing_is_deleted: false,
        }
    }

    /// Report deleting an absent path as success instead of `Ok(false)`.
    pub fn treat_missing_as_deleted(mut self, yes: bool) -> Self {
        self.missing_is_deleted = yes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a disk-relative path onto the root.
    pub fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        let mut out = self.root.clone();
        for comp in path.components() {
            match comp {
                Component::Normal(part) => out.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("path escapes disk root: {}", path.display()),
                    ));
                }
            }
        }
        Ok(out)
    }

    fn removed(&self, result: io::Result<()>, op: &str, full: &Path) -> io::Result<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %full.display(), op, "nothing to remove");
                Ok(self.missing_is_deleted)
            }
            Err(e) => Err(io_error_with_help_io(op, full)(e)),
        }
    }
}

impl Storage for LocalDisk {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        self.resolve(path)?.try_exists()
    }

    fn size(&self, path: &Path) -> io::Result<u64> {
        let full = self.resolve(path)?;
        fs::metadata(&full)
            .map(|m| m.len())
            .map_err(io_error_with_help_io("stat", &full))
    }

    fn copy(&self, src: &Path, dst: &Path) -> io::Result<()> {
        let from = self.resolve(src)?;
        let to = self.resolve(dst)?;
        let bytes = safe_copy_and_rename(&from, &to)?;
        debug!(src = %from.display(), dst = %to.display(), bytes, "copied");
        Ok(())
    }

    fn delete(&self, path: &Path) -> io::Result<bool> {
        let full = self.resolve(path)?;
        self.removed(fs::remove_file(&full), "remove file", &full)
    }

    fn delete_directory(&self, path: &Path) -> io::Result<bool> {
        let full = self.resolve(path)?;
        if full == self.root {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "refusing to delete the disk root",
            ));
        }
        self.removed(fs::remove_dir_all(&full), "remove directory", &full)
    }

    fn directory_exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self.resolve(path)?.is_dir())
    }

    fn validate_path(&self, path: &Path) -> io::Result<()> {
        self.resolve(path).map(|_| ())
    }
}
