//! I/O error enrichment.
//!
//! Adds the operation, the path and a platform-aware hint to an `io::Error` while keeping
//! its `ErrorKind`, so a `MoveFailed` still carries a matchable source.
//!
//! Usage:
//!   fs::create_dir_all(dir).map_err(io_error_with_help("create directory", dir))?;

use std::io;
use std::path::Path;

fn hint_for(e: &io::Error) -> Option<&'static str> {
    #[cfg(unix)]
    if let Some(code) = e.raw_os_error() {
        let hint = match code {
            libc::EACCES | libc::EPERM => Some("permission denied; check ownership and write permissions"),
            libc::EXDEV => Some("cross-filesystem; atomic rename not possible"),
            libc::EBUSY => Some("resource busy; another process holds it open"),
            libc::ENOENT => Some("path not found; it may have been moved concurrently"),
            libc::EEXIST | libc::ENOTEMPTY => Some("already exists; a conflicting entry appeared"),
            libc::ENOSPC => Some("insufficient space on device"),
            libc::EROFS => Some("read-only filesystem"),
            libc::ENAMETOOLONG => Some("filename or path too long"),
            _ => None,
        };
        if hint.is_some() {
            return hint;
        }
    }
    #[cfg(windows)]
    if let Some(code) = e.raw_os_error() {
        let hint = match code {
            5 => Some("access denied; check permissions"),
            17 => Some("not same device; cross-filesystem move"),
            32 => Some("sharing violation; file is in use"),
            2 | 3 => Some("path not found; it may have been moved concurrently"),
            80 | 183 => Some("already exists; a conflicting entry appeared"),
            112 => Some("insufficient disk space"),
            _ => None,
        };
        if hint.is_some() {
            return hint;
        }
    }
    match e.kind() {
        io::ErrorKind::PermissionDenied => Some("permission denied; check ownership and write permissions"),
        io::ErrorKind::NotFound => Some("path not found"),
        io::ErrorKind::AlreadyExists => Some("already exists"),
        io::ErrorKind::Interrupted => Some("interrupted by shutdown request"),
        _ => None,
    }
}

fn build_message(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{} '{}': {}", op, path.display(), e);
    if let Some(h) = hint_for(e) {
        msg.push_str(" (");
        msg.push_str(h);
        msg.push(')');
    }
    if let Some(code) = e.raw_os_error() {
        msg.push_str(&format!(" [os code: {code}]"));
    }
    msg
}

/// Returns a closure for `.map_err(...)` that keeps the `ErrorKind` and adds context.
pub fn io_error_with_help<'a>(op: &'a str, path: &'a Path) -> impl FnOnce(io::Error) -> io::Error + 'a {
    move |e: io::Error| io::Error::new(e.kind(), build_message(op, path, &e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_kind_and_mentions_path() {
        let e = io::Error::from(io::ErrorKind::NotFound);
        let wrapped = io_error_with_help("open", Path::new("/nope/doc.excalidraw"))(e);
        assert_eq!(wrapped.kind(), io::ErrorKind::NotFound);
        assert!(wrapped.to_string().contains("/nope/doc.excalidraw"));
    }
}
