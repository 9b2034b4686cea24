//! Folder Move Orchestrator.
//!
//! Transition order: resolve the destination, journal a `RelocationIntent`, then plan
//! (rekey identities, schedule checkpoint relocation) against pre-move paths, then the
//! coordinated physical move, then one metadata commit that is followed by clearing the
//! intent, then UI signaling. Nothing is rolled back inline: a failed physical move leaves
//! rekeyed identities pointing at the planned paths, and a failed commit leaves the tree
//! moved with stale records. The surviving intent lets `reconcile` repair either one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{SyncEngine, join_failed};
use crate::bookmark::SecurityBookmark;
use crate::checkpoints::CheckpointRelocator;
use crate::errors::{SyncError, SyncResult};
use crate::events::FolderEvent;
use crate::expand::ancestor_chain;
use crate::fs_ops::{SuffixStyle, descendant_files, rebase, resolve_conflict};
use crate::identity::IdentityMap;
use crate::store::{FolderId, FolderRecord, MetadataStore, RelocationIntent, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderMoveOutcome {
    /// The folder already sits directly inside the target.
    NoOp,
    Moved { from: PathBuf, to: PathBuf },
}

struct Plan {
    destination: PathBuf,
    intent: Option<RelocationIntent>,
    files: usize,
    rekeyed: usize,
}

struct PlanInput<'a> {
    store: &'a dyn MetadataStore,
    identity: &'a IdentityMap,
    checkpoints: &'a CheckpointRelocator,
    folder: FolderId,
    parent: FolderId,
    include_hidden: bool,
}

/// Resolve the destination, journal the intent, and repoint every descendant file's
/// identity and checkpoints.
fn plan_relocation(input: PlanInput<'_>, source: &Path, candidate: &Path) -> Result<Plan, StoreError> {
    let destination = resolve_conflict(candidate, SuffixStyle::Underscore);
    let mut plan = Plan {
        destination,
        intent: None,
        files: 0,
        rekeyed: 0,
    };
    if plan.destination == source {
        return Ok(plan);
    }
    let intent = RelocationIntent::new(input.folder, input.parent, source, &plan.destination);
    input.store.record_intent(&intent)?;
    plan.intent = Some(intent);

    let destination = &plan.destination;
    for old in descendant_files(source, input.include_hidden) {
        let Some(new) = rebase(&old, source, destination) else {
            continue;
        };
        plan.files += 1;
        if input.identity.rekey(&old, &new).is_some() {
            plan.rekeyed += 1;
        }
        input.checkpoints.schedule(old, new);
    }
    Ok(plan)
}

/// Records to commit: the moved folder plus every tracked folder beneath it, rebased
/// onto `to` with fresh bookmarks.
pub(crate) fn relocated_records(
    all: Vec<FolderRecord>,
    moved: &FolderRecord,
    parent: FolderId,
    to: &Path,
) -> Result<Vec<FolderRecord>, String> {
    let mut out = Vec::new();
    for mut rec in all {
        if rec.id == moved.id {
            rec.parent = Some(parent);
            rec.path = to.to_path_buf();
        } else if let Some(new) = rebase(&rec.path, &moved.path, to) {
            rec.path = new;
        } else {
            continue;
        }
        rec.bookmark = Some(
            SecurityBookmark::create(&rec.path)
                .map_err(|e| format!("bookmark for '{}': {e}", rec.path.display()))?,
        );
        out.push(rec);
    }
    if !out.iter().any(|r| r.id == moved.id) {
        return Err(format!("folder {} vanished from the store", moved.id));
    }
    Ok(out)
}

impl SyncEngine {
    /// Move folder `source` into folder `target`, keeping identities, checkpoints and
    /// folder records in step with the disk.
    pub async fn move_folder(&self, source: FolderId, target: FolderId) -> SyncResult<FolderMoveOutcome> {
        let src = self.load_folder(source)?;
        let dst = self.load_folder(target)?;

        let name = src.path.file_name().ok_or_else(|| {
            SyncError::invalid_folder(format!("folder {source} has no name: {}", src.path.display()))
        })?;
        let candidate = dst.path.join(name);
        if candidate == src.path {
            debug!(folder = %source, path = %src.path.display(), "already in target; nothing to do");
            return Ok(FolderMoveOutcome::NoOp);
        }
        if dst.path.starts_with(&src.path) {
            return Err(SyncError::invalid_folder(format!(
                "cannot move '{}' into itself or its descendant '{}'",
                src.path.display(),
                dst.path.display()
            )));
        }

        let store = Arc::clone(&self.store);
        let identity = Arc::clone(&self.identity);
        let checkpoints = self.checkpoints.clone();
        let include_hidden = self.options.include_hidden;
        let (from, planned) = (src.path.clone(), candidate.clone());
        let plan = tokio::task::spawn_blocking(move || {
            let input = PlanInput {
                store: store.as_ref(),
                identity: &identity,
                checkpoints: &checkpoints,
                folder: source,
                parent: target,
                include_hidden,
            };
            plan_relocation(input, &from, &planned)
        })
        .await
        .map_err(|e| join_failed(&src.path, &candidate, e))??;

        let Some(intent) = plan.intent else {
            return Ok(FolderMoveOutcome::NoOp);
        };
        let to = plan.destination;
        debug!(
            folder = %source,
            to = %to.display(),
            files = plan.files,
            rekeyed = plan.rekeyed,
            "relocation planned"
        );

        let coordinator = Arc::clone(&self.coordinator);
        let (from, dest) = (src.path.clone(), to.clone());
        tokio::task::spawn_blocking(move || coordinator.coordinated_move(&from, &dest))
            .await
            .map_err(|e| join_failed(&src.path, &to, e))?
            .inspect_err(|e| warn!(folder = %source, kind = e.kind(), code = e.code(), error = %e, "physical move failed"))?;

        let records = self
            .store
            .folders()
            .map_err(|e| e.to_string())
            .and_then(|all| relocated_records(all, &src, target, &to))
            .map_err(|reason| {
                SyncError::persist_failed(format!("'{}' moved to '{}' but {reason}", src.path.display(), to.display()))
            })?;
        self.store.save_folders(&records).map_err(|e| {
            SyncError::persist_failed(format!(
                "'{}' moved to '{}' but commit failed: {e}",
                src.path.display(),
                to.display()
            ))
        })?;
        if let Err(e) = self.store.clear_intent(intent.id) {
            warn!(folder = %source, intent = %intent.id, error = %e, "committed move left its intent behind");
        }
        info!(
            folder = %source,
            from = %src.path.display(),
            to = %to.display(),
            records = records.len(),
            "folder moved"
        );

        self.bus.publish(FolderEvent::FolderMoved {
            folder: source,
            from: src.path.clone(),
            to: to.clone(),
        });
        if self.options.refresh_after_move {
            self.bus.publish(FolderEvent::RefreshFiles);
        }
        match ancestor_chain(self.store.as_ref(), target) {
            Ok(chain) => self.expand.start(chain),
            Err(e) => warn!(folder = %target, error = %e, "expand chain unavailable"),
        }

        Ok(FolderMoveOutcome::Moved { from: src.path, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relocated_records_rebase_descendants_only() {
        let td = tempfile::tempdir().unwrap();
        let to = td.path().join("B").join("A");
        let sub = to.join("sub");
        std::fs::create_dir_all(&sub).unwrap();
        let root = FolderRecord::new(td.path(), None);
        let moved = FolderRecord::new(td.path().join("A"), Some(root.id));
        let child = FolderRecord::new(td.path().join("A").join("sub"), Some(moved.id));
        let sibling = FolderRecord::new(td.path().join("AB"), Some(root.id));
        let target = FolderId::new();

        let out = relocated_records(
            vec![root.clone(), moved.clone(), child.clone(), sibling],
            &moved,
            target,
            &to,
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        let m = out.iter().find(|r| r.id == moved.id).unwrap();
        assert_eq!(m.path, to);
        assert_eq!(m.parent, Some(target));
        let c = out.iter().find(|r| r.id == child.id).unwrap();
        assert_eq!(c.path, sub);
        assert_eq!(c.parent, Some(moved.id));
        assert!(c.bookmark.as_ref().unwrap().matches(&sub));
    }
}
