#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;

use resilient_move::{
    Backoff, BreakerConfig, CircuitBreaker, DiskRegistry, FileDeleter, FileMover, KeyValueStore,
    ManualClock, MemoryDisk, MemoryStore, Storage,
};

pub const DISK: &str = "mem";

/// Which storage call a scripted failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Copy,
    Delete,
    DeleteDirectory,
}

#[derive(Debug, Clone)]
enum Fault {
    /// Fail the next `n` calls of `op` whose first path argument equals `path` (any path if None).
    Error { op: Op, path: Option<PathBuf>, remaining: u32 },
    /// Answer `Ok(false)` to the next `n` delete calls on `path`.
    Refuse { op: Op, path: PathBuf, remaining: u32 },
    /// Copy writes an empty destination for the next `n` calls.
    Truncate { remaining: u32 },
}

/// Runs at the start of every scripted call, before any fault applies.
type Hook = Box<dyn Fn(Op, &Path, &MemoryDisk) + Send + Sync>;

/// MemoryDisk with scripted failures, for driving retry and rollback paths.
#[derive(Default)]
pub struct FlakyDisk {
    pub inner: MemoryDisk,
    faults: Mutex<Vec<Fault>>,
    calls: Mutex<Vec<(Op, PathBuf)>>,
    hook: Mutex<Option<Hook>>,
}

impl FlakyDisk {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, op: Op, times: u32) {
        self.faults.lock().unwrap().push(Fault::Error {
            op,
            path: None,
            remaining: times,
        });
    }

    pub fn fail_on(&self, op: Op, path: impl Into<PathBuf>, times: u32) {
        self.faults.lock().unwrap().push(Fault::Error {
            op,
            path: Some(path.into()),
            remaining: times,
        });
    }

    pub fn refuse(&self, op: Op, path: impl Into<PathBuf>, times: u32) {
        self.faults.lock().unwrap().push(Fault::Refuse {
            op,
            path: path.into(),
            remaining: times,
        });
    }

    pub fn truncate_copies(&self, times: u32) {
        self.faults
            .lock()
            .unwrap()
            .push(Fault::Truncate { remaining: times });
    }

    /// Simulate other workers: `f` sees every copy/delete call and the backing disk.
    pub fn on_call<F>(&self, f: F)
    where
        F: Fn(Op, &Path, &MemoryDisk) + Send + Sync + 'static,
    {
        *self.hook.lock().unwrap() = Some(Box::new(f));
    }

    pub fn calls(&self, op: Op) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, _)| *o == op)
            .count()
    }

    /// Consume a matching fault, if any. `Some(true)` = error, `Some(false)` = refuse.
    fn take(&self, op: Op, path: &Path) -> Option<bool> {
        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook(op, path, &self.inner);
        }
        self.calls.lock().unwrap().push((op, path.to_path_buf()));
        let mut faults = self.faults.lock().unwrap();
        for fault in faults.iter_mut() {
            match fault {
                Fault::Error {
                    op: o,
                    path: p,
                    remaining,
                } if *o == op && *remaining > 0 && p.as_deref().is_none_or(|p| p == path) => {
                    *remaining -= 1;
                    return Some(true);
                }
                Fault::Refuse {
                    op: o,
                    path: p,
                    remaining,
                } if *o == op && *remaining > 0 && p.as_path() == path => {
                    *remaining -= 1;
                    return Some(false);
                }
                _ => {}
            }
        }
        None
    }

    fn take_truncate(&self) -> bool {
        let mut faults = self.faults.lock().unwrap();
        for fault in faults.iter_mut() {
            if let Fault::Truncate { remaining } = fault
                && *remaining > 0
            {
                *remaining -= 1;
                return true;
            }
        }
        false
    }
}

fn injected(op: Op, path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("injected {op:?} failure on {}", path.display()),
    )
}

impl Storage for FlakyDisk {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        self.inner.exists(path)
    }

    fn size(&self, path: &Path) -> io::Result<u64> {
        self.inner.size(path)
    }

    fn copy(&self, src: &Path, dst: &Path) -> io::Result<()> {
        if self.take(Op::Copy, src) == Some(true) {
            return Err(injected(Op::Copy, src));
        }
        if self.take_truncate() {
            self.inner.put(dst, Vec::new());
            return Ok(());
        }
        self.inner.copy(src, dst)
    }

    fn delete(&self, path: &Path) -> io::Result<bool> {
        match self.take(Op::Delete, path) {
            Some(true) => Err(injected(Op::Delete, path)),
            Some(false) => Ok(false),
            None => self.inner.delete(path),
        }
    }

    fn delete_directory(&self, path: &Path) -> io::Result<bool> {
        match self.take(Op::DeleteDirectory, path) {
            Some(true) => Err(injected(Op::DeleteDirectory, path)),
            Some(false) => Ok(false),
            None => self.inner.delete_directory(path),
        }
    }

    fn directory_exists(&self, path: &Path) -> io::Result<bool> {
        self.inner.directory_exists(path)
    }
}

pub fn breaker_with(config: BreakerConfig) -> (Arc<CircuitBreaker>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let breaker = CircuitBreaker::new("test", config, Arc::new(MemoryStore::new()))
        .with_clock(clock.clone());
    (Arc::new(breaker), clock)
}

/// Two handles on one breaker, as two workers sharing a store would hold.
pub fn shared_breakers(config: BreakerConfig) -> (Arc<CircuitBreaker>, Arc<CircuitBreaker>) {
    let clock = Arc::new(ManualClock::default());
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let ours = CircuitBreaker::new("test", config.clone(), store.clone()).with_clock(clock.clone());
    let theirs = CircuitBreaker::new("test", config, store).with_clock(clock);
    (Arc::new(ours), Arc::new(theirs))
}

pub fn breaker() -> Arc<CircuitBreaker> {
    breaker_with(BreakerConfig::default()).0
}

pub fn registry(disk: Arc<FlakyDisk>) -> Arc<DiskRegistry> {
    Arc::new(DiskRegistry::new().with_disk(DISK, disk))
}

pub fn mover(breaker: Arc<CircuitBreaker>, disk: Arc<FlakyDisk>) -> FileMover {
    FileMover::new(breaker, registry(disk)).with_backoff(Backoff::none())
}

pub fn deleter(breaker: Arc<CircuitBreaker>, disk: Arc<FlakyDisk>) -> FileDeleter {
    FileDeleter::new(breaker, registry(disk)).with_backoff(Backoff::none())
}
