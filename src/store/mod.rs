//! Key-value store backing the circuit breaker.
//!
//! The breaker never holds state itself; every read and write goes through a
//! `KeyValueStore` injected at construction so workers in different processes
//! observe the same breaker. Each call is individually atomic; no multi-key
//! transactions are offered or assumed.
//!
//! Backends:
//! - `MemoryStore`: process-local, for tests and single-process use.
//! - `FileStore`: JSON document guarded by an exclusive advisory lock, shared
//!   between processes on the same host (or a shared mount that honours flock).

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::time::Duration;

use crate::errors::StoreUnavailable;

/// Minimal atomic key-value contract (get / set / increment / forget with per-key TTL).
///
/// A zero `ttl` means "no expiry".
pub trait KeyValueStore: Send + Sync {
    /// Current value, or `None` when absent or expired.
    fn get(&self, key: &str) -> Result<Option<String>, StoreUnavailable>;

    /// Store `value` under `key`, replacing any previous value and expiry.
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreUnavailable>;

    /// Atomically add one and return the new value. A missing key starts at zero
    /// and receives `ttl`; an existing key keeps its expiry.
    fn increment(&self, key: &str, ttl: Duration) -> Result<i64, StoreUnavailable>;

    /// Remove `key`. Removing an absent key is not an error.
    fn forget(&self, key: &str) -> Result<(), StoreUnavailable>;
}

/// Parse a stored counter, surfacing garbage as a store error rather than a silent zero.
pub(crate) fn parse_counter(key: &str, raw: &str) -> Result<i64, StoreUnavailable> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| StoreUnavailable(format!("value under '{key}' is not a counter: {raw:?}")))
}
