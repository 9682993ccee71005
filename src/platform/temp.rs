//! Unique sibling names for atomic writes of config and store documents.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static COUNTER: AtomicU64 = AtomicU64::new(0);

pub(crate) const SIBLING_PREFIX: &str = ".resilient_move.write.";

/// Pattern: `.resilient_move.write.<pid>.<nanos>.<seq>` next to `target`.
pub(crate) fn tmp_sibling_name(target: &Path) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = format!("{SIBLING_PREFIX}{pid}.{nanos}.{seq}");
    target
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(name)
}
