//! Filesystem operations: the breaker-guarded mover and deleter plus the
//! local copy primitives `LocalDisk` builds on.

mod atomic;
mod copy;
mod io_copy;
mod util;

pub mod artifact;
pub mod backoff;
pub mod delete;
pub mod duplicate;
pub mod file_move;
pub mod helpers;
pub mod ledger;

pub use artifact::{ArtifactGenerator, ExtensionFilter, GeneratedArtifact};
pub use backoff::Backoff;
pub use copy::safe_copy_and_rename;
pub use delete::FileDeleter;
pub use duplicate::unique_destination;
pub use file_move::FileMover;
pub use ledger::{EntryKind, LedgerEntry, UndoLedger};
