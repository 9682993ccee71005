//! File-backed store shared between worker processes.
//!
//! Layout: one JSON object `{ key: { "value": "...", "expires_at_ms": 123 } }`.
//! Every operation takes an exclusive `fs2` lock on a sidecar `.<name>.lock`
//! file, reads the document, applies the change and rewrites it atomically
//! (temp file + fsync + rename). The lock lives on the sidecar because the data
//! file is replaced on every write.

use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::trace;

use super::{KeyValueStore, parse_counter};
use crate::errors::StoreUnavailable;
use crate::platform::write_atomic_0600;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at_ms: Option<i64>,
}

type Document = BTreeMap<String, Record>;

/// Persistent store at `path`. The parent directory is created on first use.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

/// Releases the advisory lock when dropped.
struct LockGuard(File);

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "breaker".into());
        let lock_path = path.with_file_name(format!(".{name}.lock"));
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> io::Result<LockGuard> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;
        file.lock_exclusive()?;
        trace!(lock = %self.lock_path.display(), "store lock acquired");
        Ok(LockGuard(file))
    }

    fn read_document(&self) -> Result<Document, StoreUnavailable> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(Document::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_document(&self, doc: &Document) -> Result<(), StoreUnavailable> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        write_atomic_0600(&self.path, &bytes)
            .map_err(|e| StoreUnavailable(format!("write {}: {e:#}", self.path.display())))
    }

    /// Run `f` against the live (non-expired) document under the lock.
    /// `f` returns whether it changed the document, plus its result.
    fn transact<R>(
        &self,
        f: impl FnOnce(&mut Document, i64) -> Result<(bool, R), StoreUnavailable>,
    ) -> Result<R, StoreUnavailable> {
        let _guard = self.lock()?;
        let now_ms = Utc::now().timestamp_millis();
        let mut doc = self.read_document()?;
        let before = doc.len();
        doc.retain(|_, r| r.expires_at_ms.is_none_or(|at| now_ms < at));
        let purged = doc.len() != before;
        let (changed, out) = f(&mut doc, now_ms)?;
        if changed || purged {
            self.write_document(&doc)?;
        }
        Ok(out)
    }
}

fn expires_at(now_ms: i64, ttl: Duration) -> Option<i64> {
    if ttl.is_zero() {
        return None;
    }
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    Some(now_ms.saturating_add(ttl_ms))
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreUnavailable> {
        self.transact(|doc, _| Ok((false, doc.get(key).map(|r| r.value.clone()))))
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreUnavailable> {
        self.transact(|doc, now_ms| {
            doc.insert(
                key.to_string(),
                Record {
                    value: value.to_string(),
                    expires_at_ms: expires_at(now_ms, ttl),
                },
            );
            Ok((true, ()))
        })
    }

    fn increment(&self, key: &str, ttl: Duration) -> Result<i64, StoreUnavailable> {
        self.transact(|doc, now_ms| {
            let next = match doc.get_mut(key) {
                Some(record) => {
                    let next = parse_counter(key, &record.value)?.saturating_add(1);
                    record.value = next.to_string();
                    next
                }
                None => {
                    doc.insert(
                        key.to_string(),
                        Record {
                            value: "1".into(),
                            expires_at_ms: expires_at(now_ms, ttl),
                        },
                    );
                    1
                }
            };
            Ok((true, next))
        })
    }

    fn forget(&self, key: &str) -> Result<(), StoreUnavailable> {
        self.transact(|doc, _| Ok((doc.remove(key).is_some(), ())))
    }
}
