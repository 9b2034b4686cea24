//! Path -> logical file identity table.
//!
//! A process-wide fast-path cache so renames and moves do not sever the link between a
//! document and its bytes on disk. It is never the source of truth: it can be rebuilt
//! from the authoritative store at any time. All access goes through one lock; the raw
//! map is never handed out.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::trace;
use uuid::Uuid;

/// Stable identifier of a document, independent of its current path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub Uuid);

impl FileId {
    pub fn new() -> Self {
        FileId(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static GLOBAL: LazyLock<Arc<IdentityMap>> = LazyLock::new(|| Arc::new(IdentityMap::new()));

#[derive(Debug, Default)]
pub struct IdentityMap {
    entries: Mutex<HashMap<PathBuf, FileId>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table shared by everything in this process session.
    pub fn global() -> Arc<IdentityMap> {
        Arc::clone(&GLOBAL)
    }

    pub fn insert(&self, path: impl Into<PathBuf>, id: FileId) -> Option<FileId> {
        self.entries.lock().insert(path.into(), id)
    }

    pub fn lookup(&self, path: &Path) -> Option<FileId> {
        self.entries.lock().get(path).copied()
    }

    pub fn remove(&self, path: &Path) -> Option<FileId> {
        self.entries.lock().remove(path)
    }

    /// Move the entry at `old` to `new` in one critical section.
    ///
    /// An untracked `old` is skipped and leaves `new` untouched. Returns the moved identity.
    pub fn rekey(&self, old: &Path, new: &Path) -> Option<FileId> {
        let mut entries = self.entries.lock();
        let id = entries.remove(old)?;
        entries.insert(new.to_path_buf(), id);
        trace!(old = %old.display(), new = %new.display(), %id, "identity rekeyed");
        Some(id)
    }

    /// Move every entry under `old_root` beneath `new_root` in one critical section.
    /// Returns how many entries moved.
    pub fn rekey_tree(&self, old_root: &Path, new_root: &Path) -> usize {
        let mut entries = self.entries.lock();
        let under: Vec<PathBuf> = entries.keys().filter(|p| p.starts_with(old_root)).cloned().collect();
        for old in &under {
            let Ok(rel) = old.strip_prefix(old_root) else { continue };
            let new = if rel.as_os_str().is_empty() {
                new_root.to_path_buf()
            } else {
                new_root.join(rel)
            };
            if let Some(id) = entries.remove(old) {
                entries.insert(new, id);
            }
        }
        under.len()
    }

    /// Keep only the entries for which `keep` returns true; returns how many were dropped.
    pub fn retain(&self, mut keep: impl FnMut(&Path, &FileId) -> bool) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|p, id| keep(p, id));
        before - entries.len()
    }

    /// Replace the whole table, e.g. from the authoritative store after a crash window.
    pub fn rebuild(&self, from: impl IntoIterator<Item = (PathBuf, FileId)>) {
        let fresh: HashMap<PathBuf, FileId> = from.into_iter().collect();
        *self.entries.lock() = fresh;
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
