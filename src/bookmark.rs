//! Security bookmarks and scoped access.
//!
//! A bookmark is an opaque capability token bound to a folder's location: a BLAKE3
//! digest over the path and, on Unix, the device/inode pair. It is re-derived after every
//! relocation; a bookmark that no longer matches its folder's path is refused.
//!
//! `ScopedAccess` is the RAII grant: acquiring it validates the bookmark and registers
//! an active scope, dropping it releases the scope on every exit path.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::errors::{SyncError, SyncResult};
use crate::store::FolderRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityBookmark(String);

impl SecurityBookmark {
    /// Derive a bookmark for the directory currently at `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        let meta = fs::metadata(path)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(path.as_os_str().as_encoded_bytes());
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            hasher.update(&meta.dev().to_le_bytes());
            hasher.update(&meta.ino().to_le_bytes());
        }
        #[cfg(not(unix))]
        {
            hasher.update(&[u8::from(meta.is_dir())]);
        }
        Ok(SecurityBookmark(hex::encode(hasher.finalize().as_bytes())))
    }

    /// Whether this bookmark still grants access to whatever is at `path`.
    pub fn matches(&self, path: &Path) -> bool {
        SecurityBookmark::create(path).map(|b| b == *self).unwrap_or(false)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Tracks active scoped grants per folder path.
#[derive(Debug, Default)]
pub struct AccessRegistry {
    active: Mutex<HashMap<PathBuf, usize>>,
}

impl AccessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scopes currently open on `path`.
    pub fn active(&self, path: &Path) -> usize {
        self.active.lock().get(path).copied().unwrap_or(0)
    }

    /// Validate `folder`'s bookmark and open a scope on its path.
    pub fn acquire(self: &Arc<Self>, folder: &FolderRecord) -> SyncResult<ScopedAccess> {
        let bookmark = folder.bookmark.as_ref().ok_or_else(|| {
            SyncError::invalid_folder(format!("folder {} has no security bookmark", folder.id))
        })?;
        if !folder.path.is_dir() {
            return Err(SyncError::invalid_folder(format!(
                "folder {} path is not a directory: {}",
                folder.id,
                folder.path.display()
            )));
        }
        if !bookmark.matches(&folder.path) {
            return Err(SyncError::access_denied(
                &folder.path,
                "security bookmark is stale for this location",
            ));
        }

        *self.active.lock().entry(folder.path.clone()).or_insert(0) += 1;
        trace!(path = %folder.path.display(), "scoped access acquired");
        Ok(ScopedAccess {
            registry: Arc::clone(self),
            root: folder.path.clone(),
        })
    }

    fn release(&self, root: &Path) {
        let mut active = self.active.lock();
        if let Some(n) = active.get_mut(root) {
            *n -= 1;
            if *n == 0 {
                active.remove(root);
            }
        }
    }
}

/// An open grant on a folder; released on drop.
#[derive(Debug)]
pub struct ScopedAccess {
    registry: Arc<AccessRegistry>,
    root: PathBuf,
}

impl ScopedAccess {
    /// The folder location usable while this scope is held.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for ScopedAccess {
    fn drop(&mut self) {
        self.registry.release(&self.root);
        debug!(path = %self.root.display(), "scoped access released");
    }
}

/// Run `body` with scoped access to `folder`, releasing the grant however `body` exits.
pub fn with_scoped_access<T>(
    registry: &Arc<AccessRegistry>,
    folder: &FolderRecord,
    body: impl FnOnce(&Path) -> SyncResult<T>,
) -> SyncResult<T> {
    let scope = registry.acquire(folder)?;
    body(scope.root())
}
