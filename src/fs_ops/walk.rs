//! Lazy enumeration of the files beneath a folder, plus prefix rebasing.

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use super::util::{INTERNAL_PREFIX, LOCK_FILE_NAME};

// The walk root is never considered hidden; filter_entry still sees it under min_depth(1).
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

fn is_internal(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s == LOCK_FILE_NAME || s.starts_with(INTERNAL_PREFIX))
        .unwrap_or(false)
}

/// Every non-directory entry transitively under `root`, in walk order.
///
/// Unreadable entries are skipped (logged at debug). Symlinks are yielded, not followed.
/// Hidden entries (and whole hidden subtrees) are skipped unless `include_hidden`.
pub fn descendant_files(root: &Path, include_hidden: bool) -> impl Iterator<Item = PathBuf> + use<> {
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(move |e| include_hidden || !is_hidden(e))
        .filter_map(|res| match res {
            Ok(e) => Some(e),
            Err(err) => {
                debug!(error = %err, "skipping unreadable entry during enumeration");
                None
            }
        })
        .filter(|e| !e.file_type().is_dir() && !is_internal(e))
        .map(DirEntry::into_path)
}

/// Substitute the `old_root` prefix of `path` with `new_root`.
/// Returns None when `path` is not under `old_root`.
pub fn rebase(path: &Path, old_root: &Path, new_root: &Path) -> Option<PathBuf> {
    let rel = path.strip_prefix(old_root).ok()?;
    if rel.as_os_str().is_empty() {
        Some(new_root.to_path_buf())
    } else {
        Some(new_root.join(rel))
    }
}
