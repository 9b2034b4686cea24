//! UI-facing notifications.
//!
//! Events are fire-and-forget: publishing never blocks and never fails the operation that
//! published it. A bus with no subscribers simply drops them.

use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::trace;

use crate::store::FolderId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderEvent {
    /// Reveal this folder in the sidebar. Emitted root-to-target after a move.
    Expand(FolderId),
    /// File listings may be stale and should be re-read.
    RefreshFiles,
    FolderMoved {
        folder: FolderId,
        from: PathBuf,
        to: PathBuf,
    },
    FilesMoved {
        folder: FolderId,
        moved: BTreeMap<PathBuf, PathBuf>,
        failed: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FolderEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FolderEvent> {
        self.tx.subscribe()
    }

    /// Publish to every current subscriber; returns how many received it.
    pub fn publish(&self, event: FolderEvent) -> usize {
        trace!(?event, "publish");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
