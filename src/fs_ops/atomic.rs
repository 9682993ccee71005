//! Atomic rename helper.
//! - On Windows, removes an existing destination first (rename doesn't overwrite there).
//! - On Unix, best-effort fsync of the destination directory after rename.

use std::fs;
use std::io;
use std::path::Path;

use super::helpers::io_error_with_help_io;

pub(super) fn try_atomic_move(src: &Path, dst: &Path) -> io::Result<()> {
    #[cfg(windows)]
    match fs::remove_file(dst) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_error_with_help_io("remove existing destination", dst)(e)),
    }

    fs::rename(src, dst).map_err(io_error_with_help_io("rename into place", dst))?;

    // A failed directory fsync must not turn a completed rename into a failure.
    #[cfg(unix)]
    if let Some(parent) = dst.parent() {
        let _ = super::util::fsync_dir(parent);
    }

    Ok(())
}
