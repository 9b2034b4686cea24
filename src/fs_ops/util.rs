use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Name of the sidecar file used for cross-process directory locks.
pub const LOCK_FILE_NAME: &str = ".foldersync.lock";

/// Prefix shared by every transient file this crate creates.
pub const INTERNAL_PREFIX: &str = ".foldersync.";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Fresh hidden sibling name inside `dst_dir` for write-then-rename.
pub(crate) fn unique_temp_path(dst_dir: &Path) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    dst_dir.join(format!("{INTERNAL_PREFIX}{pid}.{nanos}.{seq}.tmp"))
}

/// std has no stable CrossesDevices kind on every toolchain we target, so check raw codes.
pub(super) fn is_cross_device(e: &io::Error) -> bool {
    match e.raw_os_error() {
        #[cfg(unix)]
        Some(code) => code == libc::EXDEV,
        #[cfg(windows)]
        Some(code) => code == 17,
        #[cfg(not(any(unix, windows)))]
        Some(_) => false,
        None => false,
    }
}

/// `path` with its parent directory canonicalized and its final component kept as given,
/// so the entry itself may be a symlink or may not exist yet. A bare file name resolves
/// against the working directory.
pub fn normalize_entry(path: &Path) -> io::Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    Ok(dunce::canonicalize(parent)?.join(name))
}

/// Whether `path` is occupied by anything, including a dangling symlink.
pub fn path_is_occupied(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

#[cfg(unix)]
pub(super) fn fsync_dir(dir: &Path) -> io::Result<()> {
    let f = File::open(dir)?;
    f.sync_all()
}

#[cfg(not(unix))]
pub(super) fn fsync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
