//! Checkpoint relocation.
//!
//! Relocation is a best-effort consistency pass that must never abort or slow down the
//! move that triggered it. Callers enqueue `(old, new)` jobs; a single background worker
//! applies them in order, logging and dropping its own failures.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::store::{MetadataStore, StoreError};

/// Repoint checkpoints stored under `old` to `new`. Idempotent: a second run finds nothing.
pub fn relocate_checkpoints(store: &dyn MetadataStore, old: &Path, new: &Path) -> Result<usize, StoreError> {
    let n = store.relocate_checkpoints(old, new)?;
    if n > 0 {
        debug!(old = %old.display(), new = %new.display(), count = n, "checkpoints relocated");
    }
    Ok(n)
}

enum Job {
    Relocate { old: PathBuf, new: PathBuf },
    Flush(oneshot::Sender<()>),
}

/// Handle to the background relocation worker. Cheap to clone.
#[derive(Clone)]
pub struct CheckpointRelocator {
    tx: mpsc::UnboundedSender<Job>,
}

impl CheckpointRelocator {
    /// Start the worker on the current Tokio runtime.
    pub fn spawn(store: Arc<dyn MetadataStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(store, rx));
        Self { tx }
    }

    /// Enqueue a relocation and return immediately.
    pub fn schedule(&self, old: impl Into<PathBuf>, new: impl Into<PathBuf>) {
        let job = Job::Relocate {
            old: old.into(),
            new: new.into(),
        };
        if self.tx.send(job).is_err() {
            warn!("checkpoint worker is gone; relocation dropped");
        }
    }

    /// Resolve once every job scheduled before this call has been processed.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Job::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

async fn run_worker(store: Arc<dyn MetadataStore>, mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.recv().await {
        match job {
            Job::Relocate { old, new } => {
                let store = Arc::clone(&store);
                let outcome = tokio::task::spawn_blocking(move || {
                    let res = relocate_checkpoints(store.as_ref(), &old, &new);
                    (old, new, res)
                })
                .await;
                match outcome {
                    Ok((_, _, Ok(_))) => {}
                    Ok((old, new, Err(e))) => {
                        warn!(old = %old.display(), new = %new.display(), error = %e, "checkpoint relocation failed; dropped");
                    }
                    Err(e) => warn!(error = %e, "checkpoint relocation task panicked; dropped"),
                }
            }
            Job::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("checkpoint worker stopped");
}
