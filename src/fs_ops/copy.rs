//! Safe copy-and-rename:
//! - copies to a temp file in the destination directory (fsynced),
//! - checks the byte count against the source length,
//! - atomically renames temp -> dest, replacing any previous file,
//! - removes the temp file on any failure.

use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

use super::atomic::try_atomic_move;
use super::helpers::io_error_with_help_io;
use super::{io_copy, util};

/// Copy `src` to `dest` so that `dest` is either the old file or the complete new one.
/// Returns the number of bytes copied.
pub fn safe_copy_and_rename(src: &Path, dest: &Path) -> io::Result<u64> {
    let dest_dir = dest.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("destination has no parent: {}", dest.display()),
        )
    })?;
    fs::create_dir_all(dest_dir)
        .map_err(io_error_with_help_io("create destination directory", dest_dir))?;

    let expected = fs::metadata(src)
        .map_err(io_error_with_help_io("stat source", src))?
        .len();
    let tmp_path = util::unique_temp_path(dest_dir);

    let result = io_copy::copy_streaming(src, &tmp_path)
        .map_err(io_error_with_help_io("copy to temporary file", &tmp_path))
        .and_then(|bytes| {
            if bytes != expected {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "short copy of '{}': {bytes} of {expected} bytes",
                        src.display()
                    ),
                ));
            }
            try_atomic_move(&tmp_path, dest)?;
            Ok(bytes)
        });

    if result.is_err() && fs::remove_file(&tmp_path).is_ok() {
        debug!(tmp = %tmp_path.display(), "removed temporary file after failed copy");
    }
    result
}
