//! The sync engine: owns the collaborators both relocation use cases share.
//!
//! `SyncEngine::new` must be called inside a Tokio runtime; it starts the background
//! checkpoint worker.

mod file_batch;
mod folder_move;

pub use file_batch::BatchOutcome;
pub use folder_move::FolderMoveOutcome;
pub(crate) use folder_move::relocated_records;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

use crate::bookmark::AccessRegistry;
use crate::checkpoints::CheckpointRelocator;
use crate::config::{Config, EXPAND_DELAY_DEFAULT, LOCK_TIMEOUT_DEFAULT};
use crate::errors::{SyncError, SyncResult};
use crate::events::{EventBus, FolderEvent};
use crate::expand::ExpandSequencer;
use crate::fs_ops::FileCoordinator;
use crate::identity::IdentityMap;
use crate::reconcile::{ReconcileReport, reconcile};
use crate::store::{FolderId, FolderRecord, MetadataStore, StoreError};

/// Engine knobs, usually derived from [`Config`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub expand_delay: Duration,
    pub lock_timeout: Duration,
    pub dir_locks: bool,
    pub include_hidden: bool,
    pub refresh_after_move: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            expand_delay: EXPAND_DELAY_DEFAULT,
            lock_timeout: LOCK_TIMEOUT_DEFAULT,
            dir_locks: true,
            include_hidden: true,
            refresh_after_move: false,
        }
    }
}

impl From<&Config> for EngineOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            expand_delay: cfg.expand_delay,
            lock_timeout: cfg.lock_timeout,
            dir_locks: !cfg.disable_locks,
            include_hidden: cfg.include_hidden,
            refresh_after_move: cfg.refresh_after_move,
        }
    }
}

pub struct SyncEngine {
    store: Arc<dyn MetadataStore>,
    identity: Arc<IdentityMap>,
    coordinator: Arc<FileCoordinator>,
    checkpoints: CheckpointRelocator,
    bus: EventBus,
    expand: ExpandSequencer,
    access: Arc<AccessRegistry>,
    options: EngineOptions,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn MetadataStore>, options: EngineOptions) -> Self {
        let bus = EventBus::default();
        Self {
            checkpoints: CheckpointRelocator::spawn(Arc::clone(&store)),
            coordinator: Arc::new(FileCoordinator::new(options.lock_timeout, options.dir_locks)),
            expand: ExpandSequencer::new(bus.clone(), options.expand_delay),
            identity: IdentityMap::global(),
            access: Arc::new(AccessRegistry::new()),
            store,
            bus,
            options,
        }
    }

    /// Use a private identity table instead of the process-wide one.
    pub fn with_identity_map(mut self, identity: Arc<IdentityMap>) -> Self {
        self.identity = identity;
        self
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub fn identity(&self) -> &Arc<IdentityMap> {
        &self.identity
    }

    pub fn coordinator(&self) -> &Arc<FileCoordinator> {
        &self.coordinator
    }

    pub fn access(&self) -> &Arc<AccessRegistry> {
        &self.access
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FolderEvent> {
        self.bus.subscribe()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Wait until every checkpoint relocation scheduled so far has been applied.
    pub async fn flush_background(&self) {
        self.checkpoints.flush().await;
    }

    /// Drain scheduled checkpoint work, then run the repair sweep against this engine's
    /// store and identity table.
    pub async fn reconcile(&self) -> SyncResult<ReconcileReport> {
        self.flush_background().await;
        let store = Arc::clone(&self.store);
        let identity = Arc::clone(&self.identity);
        let report = tokio::task::spawn_blocking(move || reconcile(store.as_ref(), &identity))
            .await
            .map_err(|e| SyncError::Store(StoreError::Aborted(format!("reconcile task failed: {e}"))))??;
        Ok(report)
    }

    /// Track an existing directory as a folder record, deriving its bookmark.
    pub fn register_folder(&self, path: &Path, parent: Option<FolderId>) -> SyncResult<FolderRecord> {
        let path = dunce::canonicalize(path)
            .map_err(|e| SyncError::invalid_folder(format!("cannot resolve '{}': {e}", path.display())))?;
        if !path.is_dir() {
            return Err(SyncError::invalid_folder(format!("not a directory: {}", path.display())));
        }
        if let Some(pid) = parent {
            self.load_folder(pid)?;
        }
        let record = FolderRecord::register(&path, parent)
            .map_err(|e| SyncError::invalid_folder(format!("cannot bookmark '{}': {e}", path.display())))?;
        self.store.save_folder(&record)?;
        info!(folder = %record.id, path = %record.path.display(), "folder registered");
        Ok(record)
    }

    /// Resolve `id` to a record whose path is an existing directory.
    pub(crate) fn load_folder(&self, id: FolderId) -> SyncResult<FolderRecord> {
        let record = self
            .store
            .folder(id)?
            .ok_or_else(|| SyncError::invalid_folder(format!("unknown folder id {id}")))?;
        if record.path.as_os_str().is_empty() {
            return Err(SyncError::invalid_folder(format!("folder {id} has no path")));
        }
        if !record.path.is_dir() {
            return Err(SyncError::invalid_folder(format!(
                "folder {id} is missing on disk: {}",
                record.path.display()
            )));
        }
        Ok(record)
    }
}

fn join_failed(from: &Path, to: &Path, e: tokio::task::JoinError) -> SyncError {
    SyncError::MoveFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: std::io::Error::other(e.to_string()),
    }
}
