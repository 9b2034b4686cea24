//! Auto-expand sequencing.
//!
//! After a folder lands somewhere new, the sidebar opens the path to it top-down: one
//! `Expand` event per ancestor, root first, with a fixed delay after each so the tree
//! can animate. Only one sequence runs at a time.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::events::{EventBus, FolderEvent};
use crate::store::{FolderId, MetadataStore, StoreError};

/// Folder IDs from the root down to (and including) `target`.
///
/// Stops at a missing record or a repeated ID, so a corrupt parent link cannot loop.
pub fn ancestor_chain(store: &dyn MetadataStore, target: FolderId) -> Result<Vec<FolderId>, StoreError> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = Some(target);
    while let Some(id) = cursor {
        if !seen.insert(id) {
            debug!(folder = %id, "parent cycle detected; ancestor chain truncated");
            break;
        }
        match store.folder(id)? {
            Some(record) => {
                chain.push(id);
                cursor = record.parent;
            }
            None => break,
        }
    }
    chain.reverse();
    Ok(chain)
}

pub struct ExpandSequencer {
    bus: EventBus,
    delay: Duration,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl ExpandSequencer {
    pub fn new(bus: EventBus, delay: Duration) -> Self {
        Self {
            bus,
            delay,
            current: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Publish `ids` in order, sleeping `delay` after each. Aborts any sequence still
    /// running. Returns without waiting for the sequence.
    pub fn start(&self, ids: Vec<FolderId>) {
        let mut current = self.current.lock();
        if let Some(prev) = current.take() {
            prev.abort();
        }
        if ids.is_empty() {
            return;
        }
        let bus = self.bus.clone();
        let delay = self.delay;
        *current = Some(tokio::spawn(async move {
            for id in ids {
                if bus.receiver_count() == 0 {
                    trace!("no subscribers; expand sequence dropped");
                    return;
                }
                bus.publish(FolderEvent::Expand(id));
                tokio::time::sleep(delay).await;
            }
        }));
    }
}

impl Drop for ExpandSequencer {
    fn drop(&mut self) {
        if let Some(handle) = self.current.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FolderRecord, SledStore};
    use std::time::Instant;

    #[test]
    fn chain_runs_root_to_target() {
        let store = SledStore::temporary().unwrap();
        let root = FolderRecord::new("/r", None);
        let b = FolderRecord::new("/r/B", Some(root.id));
        let c = FolderRecord::new("/r/B/C", Some(b.id));
        store.save_folders(&[root.clone(), b.clone(), c.clone()]).unwrap();
        assert_eq!(ancestor_chain(&store, c.id).unwrap(), vec![root.id, b.id, c.id]);
    }

    #[test]
    fn chain_survives_parent_cycle() {
        let store = SledStore::temporary().unwrap();
        let mut a = FolderRecord::new("/a", None);
        let b = FolderRecord::new("/b", Some(a.id));
        a.parent = Some(b.id);
        store.save_folders(&[a.clone(), b.clone()]).unwrap();
        let chain = ancestor_chain(&store, b.id).unwrap();
        assert_eq!(chain.len(), 2);
    }

    #[tokio::test]
    async fn notifications_are_spaced_by_delay() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let seq = ExpandSequencer::new(bus, Duration::from_millis(60));
        let (a, b) = (FolderId::new(), FolderId::new());
        seq.start(vec![a, b]);
        assert_eq!(rx.recv().await.unwrap(), FolderEvent::Expand(a));
        let t0 = Instant::now();
        assert_eq!(rx.recv().await.unwrap(), FolderEvent::Expand(b));
        assert!(t0.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn new_sequence_aborts_previous() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let seq = ExpandSequencer::new(bus, Duration::from_millis(200));
        let (a, b, c) = (FolderId::new(), FolderId::new(), FolderId::new());
        seq.start(vec![a, b]);
        assert_eq!(rx.recv().await.unwrap(), FolderEvent::Expand(a));
        seq.start(vec![c]);
        assert_eq!(rx.recv().await.unwrap(), FolderEvent::Expand(c));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(rx.try_recv().is_err());
    }
}
