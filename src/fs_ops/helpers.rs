//! I/O helper utilities.
//!
//! Enriches io::Error with the operation, the path and an actionable hint,
//! while preserving the original ErrorKind so callers can still branch on it.
//!
//! Usage:
//!   fs::remove_file(p).map_err(io_error_with_help_io("remove file", p))?;

use std::io;
use std::path::Path;

/// Format a human-friendly message with op/path plus platform-aware hints.
fn build_message(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{} '{}': {}", op, path.display(), e);

    #[cfg(unix)]
    let hint = e.raw_os_error().and_then(|code| match code {
        libc::EACCES | libc::EPERM => Some("permission denied; check ownership and write permissions"),
        libc::EXDEV => Some("cross-filesystem; atomic rename not possible"),
        libc::EBUSY => Some("resource busy; another process may hold the file"),
        libc::ENOSPC => Some("insufficient space on device"),
        libc::EROFS => Some("read-only filesystem"),
        libc::ESTALE => Some("stale network file handle; the remote disk may have remounted"),
        libc::ETIMEDOUT => Some("timed out; the storage backend is slow or unreachable"),
        libc::ENAMETOOLONG => Some("filename or path too long"),
        _ => None,
    });
    #[cfg(not(unix))]
    let hint: Option<&str> = None;

    let hint = hint.or(match e.kind() {
        io::ErrorKind::PermissionDenied => Some("permission denied; check ownership and write permissions"),
        io::ErrorKind::NotFound => Some("path not found; verify it exists"),
        io::ErrorKind::AlreadyExists => Some("already exists; remove or choose a unique name"),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
            Some("busy/timed out; the storage backend may recover on retry")
        }
        _ => None,
    });

    if let Some(h) = hint {
        msg.push_str(" (");
        msg.push_str(h);
        msg.push(')');
    }
    if let Some(code) = e.raw_os_error() {
        msg.push_str(&format!(" [os code: {code}]"));
    }
    msg
}

/// Returns a closure suitable for `.map_err(...)` that keeps the ErrorKind and
/// enriches the message.
pub fn io_error_with_help_io<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> io::Error + 'a {
    move |e: io::Error| io::Error::new(e.kind(), build_message(op, path, &e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_kind_and_mentions_path() {
        let e = io::Error::new(io::ErrorKind::NotFound, "gone");
        let out = io_error_with_help_io("stat", Path::new("/data/x"))(e);
        assert_eq!(out.kind(), io::ErrorKind::NotFound);
        let msg = out.to_string();
        assert!(msg.starts_with("stat '/data/x': gone"), "{msg}");
        assert!(msg.contains("path not found"), "{msg}");
    }

    #[cfg(unix)]
    #[test]
    fn os_codes_get_specific_hints() {
        let e = io::Error::from_raw_os_error(libc::ENOSPC);
        let msg = io_error_with_help_io("copy", Path::new("f"))(e).to_string();
        assert!(msg.contains("insufficient space"), "{msg}");
        assert!(msg.contains(&format!("[os code: {}]", libc::ENOSPC)), "{msg}");
    }
}
