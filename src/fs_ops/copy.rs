//! Cross-device fallback for coordinated moves.
//!
//! When rename reports EXDEV the move is emulated: files are streamed into a temp sibling,
//! fsynced and renamed into place; directory trees are recreated and their files copied in
//! parallel. The source is removed only after the whole copy succeeded; once it has, the
//! move counts as done even if some of the source cannot be removed.

use filetime::{FileTime, set_file_times};
use rayon::prelude::*;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::atomic::try_atomic_move;
use super::helpers::io_error_with_help;
use super::util::{path_is_occupied, unique_temp_path};
use crate::shutdown;

const BUF_SIZE: usize = 1024 * 1024;

fn interrupted() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "shutdown requested during copy")
}

/// Copy permissions and timestamps from `src` onto `dest` (best-effort).
fn carry_metadata(src_meta: &fs::Metadata, dest: &Path) {
    let mtime = FileTime::from_last_modification_time(src_meta);
    let atime = FileTime::from_last_access_time(src_meta);
    let _ = set_file_times(dest, atime, mtime);
    let _ = fs::set_permissions(dest, src_meta.permissions());
}

/// Stream `src` into a fresh temp file next to `dest`, fsync it, then rename into place.
/// `dest` must not exist; the temp file is removed on any failure.
pub(super) fn copy_file_durable(src: &Path, dest: &Path) -> io::Result<u64> {
    let dest_dir = dest
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "destination has no parent"))?;
    let tmp = unique_temp_path(dest_dir);

    let result = (|| -> io::Result<u64> {
        let src_meta = fs::metadata(src).map_err(io_error_with_help("stat source", src))?;
        let reader = File::open(src).map_err(io_error_with_help("open source", src))?;
        let writer = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .map_err(io_error_with_help("create temporary file", &tmp))?;
        let mut reader = BufReader::with_capacity(BUF_SIZE, reader);
        let mut writer = BufWriter::with_capacity(BUF_SIZE, writer);
        let bytes = io::copy(&mut reader, &mut writer)?;
        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);
        carry_metadata(&src_meta, &tmp);
        if path_is_occupied(dest) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("destination appeared during copy: {}", dest.display()),
            ));
        }
        try_atomic_move(&tmp, dest).map_err(io_error_with_help("rename temporary file", dest))?;
        Ok(bytes)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> io::Result<()> {
    let target = fs::read_link(src)?;
    std::os::unix::fs::symlink(target, dest)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, _dest: &Path) -> io::Result<()> {
    warn!(path = %src.display(), "symlink not recreated during cross-device copy");
    Ok(())
}

/// Recreate the tree rooted at `src_dir` under `dest_dir` (which must not exist).
pub(super) fn copy_tree(src_dir: &Path, dest_dir: &Path) -> io::Result<()> {
    let mut files: Vec<(PathBuf, PathBuf)> = Vec::new();
    for entry in WalkDir::new(src_dir) {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src_dir)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let target = dest_dir.join(rel);
        let ftype = entry.file_type();
        if ftype.is_dir() {
            fs::create_dir_all(&target).map_err(io_error_with_help("create directory", &target))?;
        } else if ftype.is_symlink() {
            copy_symlink(entry.path(), &target).map_err(io_error_with_help("recreate symlink", &target))?;
        } else {
            files.push((entry.into_path(), target));
        }
    }

    debug!(src = %src_dir.display(), files = files.len(), "copying tree across devices");
    files.par_iter().try_for_each(|(from, to)| -> io::Result<()> {
        if shutdown::is_requested() {
            return Err(interrupted());
        }
        copy_file_durable(from, to)?;
        Ok(())
    })
}

/// Emulate a rename across filesystems, removing the source only after a complete copy.
pub(super) fn move_by_copy(src: &Path, dest: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(src).map_err(io_error_with_help("stat source", src))?;
    let removed = if meta.is_dir() {
        if let Err(e) = copy_tree(src, dest) {
            // Partial destination trees would otherwise block a retry with the same name.
            let _ = fs::remove_dir_all(dest);
            return Err(e);
        }
        fs::remove_dir_all(src)
    } else if meta.file_type().is_symlink() && cfg!(unix) {
        copy_symlink(src, dest).map_err(io_error_with_help("recreate symlink", dest))?;
        fs::remove_file(src)
    } else {
        copy_file_durable(src, dest)?;
        fs::remove_file(src)
    };
    if let Err(e) = removed {
        warn!(src = %src.display(), dest = %dest.display(), error = %e, "copy complete but source not fully removed");
    }
    warn!(src = %src.display(), dest = %dest.display(), "moved by copy across filesystems");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn copy_tree_then_remove_source() {
        let td = tempdir().unwrap();
        let src = td.path().join("A");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("doc.excalidraw"), b"{}").unwrap();
        fs::write(src.join("sub").join("nested.excalidraw"), b"[]").unwrap();

        let dest = td.path().join("B").join("A");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        move_by_copy(&src, &dest).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(dest.join("doc.excalidraw")).unwrap(), b"{}");
        assert_eq!(fs::read(dest.join("sub").join("nested.excalidraw")).unwrap(), b"[]");
    }

    #[test]
    fn durable_copy_never_replaces_an_existing_destination() {
        let td = tempdir().unwrap();
        let src = td.path().join("a.excalidraw");
        let dest = td.path().join("b.excalidraw");
        fs::write(&src, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        let err = copy_file_durable(&src, &dest).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&dest).unwrap(), b"old");
        assert_eq!(fs::read(&src).unwrap(), b"new");
    }

    #[cfg(unix)]
    #[test]
    fn symlink_source_is_recreated_not_followed() {
        let td = tempdir().unwrap();
        let target = td.path().join("real.excalidraw");
        fs::write(&target, b"{}").unwrap();
        let link = td.path().join("link.excalidraw");
        std::os::unix::fs::symlink(&target, &link).unwrap();
        let dest = td.path().join("moved.excalidraw");

        move_by_copy(&link, &dest).unwrap();

        assert!(fs::symlink_metadata(&link).is_err());
        assert!(fs::symlink_metadata(&dest).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&dest).unwrap(), target);
        assert_eq!(fs::read(&target).unwrap(), b"{}");
    }

    #[cfg(unix)]
    #[test]
    fn undeletable_source_still_counts_as_moved() {
        use std::os::unix::fs::PermissionsExt;
        // Permission bits do not stop root from unlinking.
        if unsafe { libc::geteuid() } == 0 {
            return;
        }
        let td = tempdir().unwrap();
        let locked = td.path().join("locked");
        fs::create_dir(&locked).unwrap();
        let src = locked.join("a.excalidraw");
        fs::write(&src, b"payload").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        let dest = td.path().join("a.excalidraw");

        let res = move_by_copy(&src, &dest);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        res.unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        assert!(src.exists());
    }

    #[test]
    fn durable_copy_leaves_no_temp_files() {
        let td = tempdir().unwrap();
        let src = td.path().join("a.excalidraw");
        fs::write(&src, b"payload").unwrap();
        let out = td.path().join("out");
        fs::create_dir_all(&out).unwrap();
        let dest = out.join("a.excalidraw");
        let n = copy_file_durable(&src, &dest).unwrap();
        assert_eq!(n, 7);
        let leftovers: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
