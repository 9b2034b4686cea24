//! Repair sweep for the two known inconsistency windows of a relocation: identities
//! rekeyed for a move that then failed, and records left stale by a failed commit.
//!
//! Every journaled `RelocationIntent` is settled first by looking at the disk: if only the
//! source exists the move never happened and identities and checkpoints are pointed back
//! at it; if only the destination exists the move happened and the folder records are
//! committed forward. Then the sweep drops identities for paths that no longer exist,
//! re-derives stale bookmarks, and reports what it cannot repair (missing folders,
//! dangling checkpoints, intents where both or neither side exists). A second run changes
//! nothing and repeats only those reports.
//!
//! Run it while no relocation is in flight, after scheduled checkpoint work has drained;
//! `SyncEngine::reconcile` does both.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bookmark::SecurityBookmark;
use crate::engine::relocated_records;
use crate::fs_ops::{descendant_files, path_is_occupied, rebase};
use crate::identity::IdentityMap;
use crate::store::{FolderId, MetadataStore, RelocationIntent, StoreError};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Folders whose interrupted move never reached the disk; identities and checkpoints
    /// point at the source again.
    pub rolled_back: Vec<FolderId>,
    /// Folders moved on disk whose records were committed by this sweep.
    pub rolled_forward: Vec<FolderId>,
    /// Intents left in place because the disk does not say which way to go.
    pub unresolved_intents: Vec<Uuid>,
    /// Identity entries dropped because nothing exists at their path.
    pub stale_mappings: usize,
    /// Folder records whose directory is gone (left for folder CRUD to resolve).
    pub missing_folders: Vec<FolderId>,
    /// Folder records whose bookmark was missing or stale and has been re-derived.
    pub rebookmarked: Vec<FolderId>,
    /// Checkpoint paths with no file on disk.
    pub dangling_checkpoints: Vec<PathBuf>,
}

impl ReconcileReport {
    /// Whether the sweep changed nothing and found nothing dangling.
    pub fn is_clean(&self) -> bool {
        self.rolled_back.is_empty()
            && self.rolled_forward.is_empty()
            && self.unresolved_intents.is_empty()
            && self.stale_mappings == 0
            && self.missing_folders.is_empty()
            && self.rebookmarked.is_empty()
            && self.dangling_checkpoints.is_empty()
    }
}

enum Settled {
    Back,
    Forward,
    Unresolved,
}

fn settle_intent(
    store: &dyn MetadataStore,
    identity: &IdentityMap,
    intent: &RelocationIntent,
) -> Result<Settled, StoreError> {
    let (from, to) = (&intent.from, &intent.to);
    match (from.is_dir(), to.is_dir()) {
        (true, false) => {
            let restored = identity.rekey_tree(to, from);
            for file in descendant_files(from, true) {
                if let Some(planned) = rebase(&file, from, to) {
                    store.relocate_checkpoints(&planned, &file)?;
                }
            }
            info!(folder = %intent.folder, path = %from.display(), restored, "interrupted move rolled back");
            Ok(Settled::Back)
        }
        (false, true) => {
            identity.rekey_tree(from, to);
            for file in descendant_files(to, true) {
                if let Some(old) = rebase(&file, to, from) {
                    store.relocate_checkpoints(&old, &file)?;
                }
            }
            let all = store.folders()?;
            let stale = all.iter().find(|r| r.id == intent.folder && r.path == *from).cloned();
            if let Some(moved) = stale {
                match relocated_records(all, &moved, intent.parent, to) {
                    Ok(records) => store.save_folders(&records)?,
                    Err(reason) => {
                        warn!(folder = %intent.folder, %reason, "records for moved folder not committed");
                        return Ok(Settled::Unresolved);
                    }
                }
            }
            info!(folder = %intent.folder, path = %to.display(), "interrupted move rolled forward");
            Ok(Settled::Forward)
        }
        (both, _) => {
            warn!(
                intent = %intent.id,
                from = %from.display(),
                to = %to.display(),
                both_exist = both,
                "relocation intent left unresolved"
            );
            Ok(Settled::Unresolved)
        }
    }
}

pub fn reconcile(store: &dyn MetadataStore, identity: &IdentityMap) -> Result<ReconcileReport, StoreError> {
    let mut report = ReconcileReport::default();
    for intent in store.intents()? {
        match settle_intent(store, identity, &intent)? {
            Settled::Back => report.rolled_back.push(intent.folder),
            Settled::Forward => report.rolled_forward.push(intent.folder),
            Settled::Unresolved => {
                report.unresolved_intents.push(intent.id);
                continue;
            }
        }
        store.clear_intent(intent.id)?;
    }
    report.stale_mappings = identity.retain(|path, _| path_is_occupied(path));

    let mut refreshed = Vec::new();
    for mut folder in store.folders()? {
        if !folder.path.is_dir() {
            report.missing_folders.push(folder.id);
            continue;
        }
        let current = folder.bookmark.as_ref().is_some_and(|b| b.matches(&folder.path));
        if current {
            continue;
        }
        match SecurityBookmark::create(&folder.path) {
            Ok(bm) => {
                folder.bookmark = Some(bm);
                report.rebookmarked.push(folder.id);
                refreshed.push(folder);
            }
            Err(e) => warn!(folder = %folder.id, error = %e, "bookmark could not be re-derived"),
        }
    }
    if !refreshed.is_empty() {
        store.save_folders(&refreshed)?;
    }

    let dangling: BTreeSet<PathBuf> = store
        .checkpoints()?
        .into_iter()
        .map(|c| c.path)
        .filter(|p| !path_is_occupied(p))
        .collect();
    report.dangling_checkpoints = dangling.into_iter().collect();

    info!(
        rolled_back = report.rolled_back.len(),
        rolled_forward = report.rolled_forward.len(),
        unresolved_intents = report.unresolved_intents.len(),
        stale_mappings = report.stale_mappings,
        missing_folders = report.missing_folders.len(),
        rebookmarked = report.rebookmarked.len(),
        dangling_checkpoints = report.dangling_checkpoints.len(),
        "reconcile finished"
    );
    Ok(report)
}
