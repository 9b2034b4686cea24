//! File Batch Mover.
//!
//! The whole batch runs inside one scoped grant on the target folder. Files are handled
//! independently: a failure is recorded and the next file is attempted.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::{SyncEngine, join_failed};
use crate::bookmark::with_scoped_access;
use crate::checkpoints::CheckpointRelocator;
use crate::errors::{SyncError, SyncResult};
use crate::events::FolderEvent;
use crate::fs_ops::{FileCoordinator, SuffixStyle, normalize_entry, resolve_conflict};
use crate::identity::IdentityMap;
use crate::shutdown;
use crate::store::FolderId;

/// Result of a batch: what moved, and why the rest did not.
///
/// Keys are the paths exactly as the caller passed them; destinations are resolved paths.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub moved: BTreeMap<PathBuf, PathBuf>,
    pub failed: Vec<(PathBuf, SyncError)>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

struct BatchContext<'a> {
    coordinator: &'a FileCoordinator,
    identity: &'a IdentityMap,
    checkpoints: &'a CheckpointRelocator,
}

impl BatchContext<'_> {
    fn move_one(&self, root: &Path, file: &Path) -> SyncResult<PathBuf> {
        // Identities and checkpoints are keyed by resolved paths.
        let file = normalize_entry(file).map_err(|source| SyncError::MoveFailed {
            from: file.to_path_buf(),
            to: root.to_path_buf(),
            source,
        })?;
        let desired = file.file_name().map(|name| root.join(name)).unwrap_or_default();
        if desired == file {
            return Ok(desired);
        }
        let dest = resolve_conflict(&desired, SuffixStyle::Parenthesized);
        self.coordinator.coordinated_move(&file, &dest)?;
        self.identity.rekey(&file, &dest);
        self.checkpoints.schedule(file, dest.clone());
        Ok(dest)
    }

    fn run(&self, root: &Path, files: &[PathBuf]) -> BatchOutcome {
        let root = &dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        let mut outcome = BatchOutcome::default();
        for file in files {
            if shutdown::is_requested() {
                outcome.failed.push((
                    file.clone(),
                    SyncError::MoveFailed {
                        from: file.clone(),
                        to: root.to_path_buf(),
                        source: io::Error::new(io::ErrorKind::Interrupted, "shutdown requested"),
                    },
                ));
                continue;
            }
            match self.move_one(root, file) {
                Ok(dest) => {
                    outcome.moved.insert(file.clone(), dest);
                }
                Err(e) => {
                    warn!(file = %file.display(), kind = e.kind(), code = e.code(), error = %e, "file not moved");
                    outcome.failed.push((file.clone(), e));
                }
            }
        }
        outcome
    }
}

impl SyncEngine {
    /// Move `files` into folder `target`. The mapping holds only files that moved; compare
    /// its length with `files` (or use [`SyncEngine::move_files_detailed`]) to detect
    /// partial failure.
    pub async fn move_files(&self, files: &[PathBuf], target: FolderId) -> SyncResult<BTreeMap<PathBuf, PathBuf>> {
        Ok(self.move_files_detailed(files, target).await?.moved)
    }

    /// Like [`SyncEngine::move_files`], also reporting each failure.
    pub async fn move_files_detailed(&self, files: &[PathBuf], target: FolderId) -> SyncResult<BatchOutcome> {
        let folder = self.load_folder(target)?;
        let access = Arc::clone(&self.access);
        let coordinator = Arc::clone(&self.coordinator);
        let identity = Arc::clone(&self.identity);
        let checkpoints = self.checkpoints.clone();
        let batch = files.to_vec();
        let root = folder.path.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            with_scoped_access(&access, &folder, |root| {
                let ctx = BatchContext {
                    coordinator: &coordinator,
                    identity: &identity,
                    checkpoints: &checkpoints,
                };
                Ok(ctx.run(root, &batch))
            })
        })
        .await
        .map_err(|e| join_failed(Path::new(""), &root, e))??;

        info!(
            folder = %target,
            moved = outcome.moved.len(),
            failed = outcome.failed.len(),
            "file batch finished"
        );
        self.bus.publish(FolderEvent::FilesMoved {
            folder: target,
            moved: outcome.moved.clone(),
            failed: outcome.failed.iter().map(|(p, _)| p.clone()).collect(),
        });
        Ok(outcome)
    }
}
