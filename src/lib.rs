//! Core library for `resilient_move`.
//!
//! Moves and deletes files on pluggable storage disks behind a circuit breaker
//! whose state is shared through a key-value store:
//! - `breaker`: the persisted Closed/Open/HalfOpen gate.
//! - `fs_ops`: `FileMover` (copy, verify, delete source, undo ledger) and `FileDeleter`.
//! - `storage` / `store`: the disk and key-value collaborators, with local and
//!   in-memory backends.
//!
//! Everything is synchronous; attempts are strictly sequential with a fixed
//! backoff between them.

pub mod breaker;
pub mod cli;
pub mod config;
pub mod errors;
pub mod fs_ops;
pub mod notify;
pub mod output;
pub mod platform;
pub mod shutdown;
pub mod storage;
pub mod store;

pub use breaker::{
    BreakerConfig, BreakerStats, CircuitBreaker, CircuitState, Clock, ManualClock, SystemClock,
};
pub use config::{
    Config, LogLevel, default_config_path, default_log_path, default_store_path,
    path_has_symlink_ancestor,
};
pub use errors::{AttemptError, ResilientFsError, StoreUnavailable};
pub use fs_ops::{
    ArtifactGenerator, Backoff, EntryKind, ExtensionFilter, FileDeleter, FileMover,
    GeneratedArtifact, LedgerEntry, UndoLedger,
};
pub use notify::{LogNotifier, Notifier, SendmailNotifier};
pub use storage::{DiskRegistry, LocalDisk, MemoryDisk, Storage};
pub use store::{FileStore, KeyValueStore, MemoryStore};

/// Disk id under which the CLI registers its `LocalDisk`.
pub const LOCAL_DISK: &str = "local";
