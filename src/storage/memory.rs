//! In-memory disk. Directories are implied by file paths, plus any created
//! explicitly with `create_dir`.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::Storage;

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
}

impl Tree {
    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
            || self.files.keys().any(|f| f != path && f.starts_with(path))
            || self.dirs.iter().any(|d| d != path && d.starts_with(path))
    }
}

#[derive(Debug, Default)]
pub struct MemoryDisk {
    tree: Mutex<Tree>,
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file: {}", path.display()),
    )
}

impl MemoryDisk {
    pub fn new() -> Self {
        Self::default()
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn put(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.tree().files.insert(path.into(), contents.into());
    }

    pub fn create_dir(&self, path: impl Into<PathBuf>) {
        self.tree().dirs.insert(path.into());
    }

    pub fn read(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.tree().files.get(path.as_ref()).cloned()
    }

    /// Every file path currently stored, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        self.tree().files.keys().cloned().collect()
    }
}

impl Storage for MemoryDisk {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        let tree = self.tree();
        Ok(tree.files.contains_key(path) || tree.is_dir(path))
    }

    fn size(&self, path: &Path) -> io::Result<u64> {
        self.tree()
            .files
            .get(path)
            .map(|b| b.len() as u64)
            .ok_or_else(|| not_found(path))
    }

    fn copy(&self, src: &Path, dst: &Path) -> io::Result<()> {
        let mut tree = self.tree();
        let data = tree.files.get(src).cloned().ok_or_else(|| not_found(src))?;
        tree.files.insert(dst.to_path_buf(), data);
        Ok(())
    }

    fn delete(&self, path: &Path) -> io::Result<bool> {
        Ok(self.tree().files.remove(path).is_some())
    }

    fn delete_directory(&self, path: &Path) -> io::Result<bool> {
        let mut tree = self.tree();
        if !tree.is_dir(path) {
            return Ok(false);
        }
        tree.files.retain(|f, _| !f.starts_with(path));
        tree.dirs.retain(|d| !d.starts_with(path));
        Ok(true)
    }

    fn directory_exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self.tree().is_dir(path))
    }
}
