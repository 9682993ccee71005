//! Duplicate-name resolution against a storage collaborator.
//!
//! `dir/name` is used when free; otherwise `_1`, `_2`, ... is appended before the
//! extension until a free name is found. The scan is deterministic: the same
//! set of existing files always yields the same answer.
//!
//! This only looks at the current state of the storage. Concurrent movers
//! targeting the same directory can still race for a name.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;

use crate::storage::Storage;

const MAX_TRIES: u64 = 10_000;

/// Return the first free destination for `name` inside `dir`.
///
/// Examples with `f.txt` taken:
/// - "f.txt" -> "f_1.txt", "f_2.txt", ...
/// - ".env" -> ".env_1"
/// - "archive.tar.gz" -> "archive.tar_1.gz"
pub fn unique_destination(storage: &dyn Storage, dir: &Path, name: &OsStr) -> io::Result<PathBuf> {
    let base = Path::new(name);
    let stem: OsString = base
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| OsString::from(name));
    let ext: Option<OsString> = base.extension().map(|e| e.to_os_string());

    let candidate = dir.join(build_name_with_suffix(&stem, ext.as_deref(), ""));
    if !storage.exists(&candidate)? {
        return Ok(candidate);
    }

    let mut collisions = 0u32;
    for n in 1..=MAX_TRIES {
        let suffix = format!("_{n}");
        let candidate = dir.join(build_name_with_suffix(&stem, ext.as_deref(), &suffix));
        if !storage.exists(&candidate)? {
            return Ok(candidate);
        }
        collisions = collisions.saturating_add(1);
        if collisions == 3 {
            trace!(name = ?name, dir = %dir.display(), "duplicate: multiple collisions, still searching for a free suffix");
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!(
            "no free name for {:?} in '{}' after {MAX_TRIES} tries",
            name,
            dir.display()
        ),
    ))
}

// Conservative filename limits (bytes/characters, platform-specific and approximate).
#[cfg(windows)]
const MAX_FILENAME_LEN: usize = 240;
#[cfg(not(windows))]
const MAX_FILENAME_LEN: usize = 255;

#[cfg(unix)]
fn name_len_units(s: &OsStr) -> usize {
    use std::os::unix::ffi::OsStrExt;
    s.as_bytes().len()
}

#[cfg(not(unix))]
fn name_len_units(s: &OsStr) -> usize {
    s.to_string_lossy().len()
}

/// Truncate the stem if needed so `stem + suffix + ["." + ext]` fits in MAX_FILENAME_LEN.
fn build_name_with_suffix(stem: &OsStr, ext: Option<&OsStr>, suffix: &str) -> OsString {
    let mut overhead = suffix.len();
    let mut ext_part = OsString::new();
    if let Some(e) = ext {
        overhead = overhead.saturating_add(1 + name_len_units(e));
        ext_part.push(".");
        ext_part.push(e);
    }

    let mut stem_os = stem.to_os_string();
    if name_len_units(&stem_os) + overhead > MAX_FILENAME_LEN {
        let budget = MAX_FILENAME_LEN.saturating_sub(overhead).max(1);
        stem_os = truncate_stem(stem, budget);
    }

    let mut new_name = stem_os;
    new_name.push(suffix);
    new_name.push(&ext_part);
    new_name
}

fn truncate_stem(stem: &OsStr, budget: usize) -> OsString {
    // Character-aware when the stem is UTF-8, so a multi-byte char is never split.
    if let Some(s) = stem.to_str() {
        let mut end = 0;
        for (idx, ch) in s.char_indices() {
            if idx + ch.len_utf8() > budget {
                break;
            }
            end = idx + ch.len_utf8();
        }
        if end == 0 {
            return OsString::from("f");
        }
        return OsString::from(&s[..end]);
    }

    truncate_raw(stem, budget)
}

#[cfg(unix)]
fn truncate_raw(stem: &OsStr, budget: usize) -> OsString {
    use std::os::unix::ffi::{OsStrExt, OsStringExt};
    let bytes = stem.as_bytes();
    OsString::from_vec(bytes[..bytes.len().min(budget)].to_vec())
}

#[cfg(not(unix))]
fn truncate_raw(stem: &OsStr, budget: usize) -> OsString {
    let lossy = stem.to_string_lossy().into_owned();
    truncate_stem(OsStr::new(&lossy), budget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDisk;

    #[test]
    fn free_name_is_used_as_is() {
        let disk = MemoryDisk::new();
        let p = unique_destination(&disk, Path::new("b"), OsStr::new("f.txt")).unwrap();
        assert_eq!(p, PathBuf::from("b/f.txt"));
    }

    #[test]
    fn numbered_suffix_goes_before_extension() {
        let disk = MemoryDisk::new();
        disk.put("b/f.txt", b"x");
        disk.put("b/f_1.txt", b"x");
        let p = unique_destination(&disk, Path::new("b"), OsStr::new("f.txt")).unwrap();
        assert_eq!(p, PathBuf::from("b/f_2.txt"));

        disk.put("b/.env", b"x");
        let p = unique_destination(&disk, Path::new("b"), OsStr::new(".env")).unwrap();
        assert_eq!(p, PathBuf::from("b/.env_1"));

        disk.put("b/archive.tar.gz", b"x");
        let p = unique_destination(&disk, Path::new("b"), OsStr::new("archive.tar.gz")).unwrap();
        assert_eq!(p, PathBuf::from("b/archive.tar_1.gz"));
    }

    #[test]
    fn long_names_are_truncated_to_fit_the_suffix() {
        let long = format!("{}.txt", "a".repeat(300));
        let name = build_name_with_suffix(
            Path::new(&long).file_stem().unwrap(),
            Some(OsStr::new("txt")),
            "_12",
        );
        assert_eq!(name_len_units(&name), MAX_FILENAME_LEN);
        assert!(name.to_string_lossy().ends_with("_12.txt"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let stem = "é".repeat(200);
        let name = build_name_with_suffix(OsStr::new(&stem), None, "_1");
        assert!(name_len_units(&name) <= MAX_FILENAME_LEN);
        assert!(name.to_str().is_some());
    }
}
