//! Rename helper.
//! - Performs a plain rename; the caller has already verified the destination is free.
//! - On Unix, best-effort fsync of both parent directories after the rename.

use std::fs;
use std::io;
use std::path::Path;

pub(super) fn try_atomic_move(src: &Path, dst: &Path) -> io::Result<()> {
    fs::rename(src, dst)?;

    // Ignore fsync errors; the rename itself already succeeded.
    #[cfg(unix)]
    {
        if let Some(parent) = dst.parent() {
            let _ = super::util::fsync_dir(parent);
        }
        if let Some(parent) = src.parent() {
            let _ = super::util::fsync_dir(parent);
        }
    }

    Ok(())
}
