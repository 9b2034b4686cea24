//! Core library for `foldersync`.
//!
//! Keeps a persisted folder/checkpoint store and a path-to-identity table consistent with
//! the directory tree on disk while folders and files are moved around.
//!
//! Layout:
//! - `fs_ops`: everything that touches user data on disk (conflict-free naming, coordinated
//!   moves, enumeration)
//! - `identity`, `store`, `bookmark`: the metadata the moves must keep in step
//! - `checkpoints`, `events`, `expand`: background and UI-facing follow-up work
//! - `engine`: the folder and file-batch relocation use cases
//! - `reconcile`: the repair sweep for interrupted relocations

pub mod bookmark;
pub mod checkpoints;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod expand;
pub mod fs_ops;
pub mod identity;
pub mod output;
pub mod platform;
pub mod reconcile;
pub mod shutdown;
pub mod store;

pub use bookmark::{AccessRegistry, ScopedAccess, SecurityBookmark, with_scoped_access};
pub use checkpoints::{CheckpointRelocator, relocate_checkpoints};
pub use config::{
    Config, LogLevel, default_config_path, default_log_path, default_store_path, path_has_symlink_ancestor,
};
pub use engine::{BatchOutcome, EngineOptions, FolderMoveOutcome, SyncEngine};
pub use errors::{SyncError, SyncResult};
pub use events::{EventBus, FolderEvent};
pub use expand::{ExpandSequencer, ancestor_chain};
pub use fs_ops::{FileCoordinator, SuffixStyle, resolve_conflict};
pub use identity::{FileId, IdentityMap};
pub use reconcile::{ReconcileReport, reconcile};
pub use store::{CheckpointRecord, FolderId, FolderRecord, MetadataStore, RelocationIntent, SledStore, StoreError};

/// Common imports for embedding the engine.
pub mod prelude {
    pub use crate::engine::{BatchOutcome, EngineOptions, FolderMoveOutcome, SyncEngine};
    pub use crate::errors::{SyncError, SyncResult};
    pub use crate::events::FolderEvent;
    pub use crate::identity::{FileId, IdentityMap};
    pub use crate::store::{CheckpointRecord, FolderId, FolderRecord, MetadataStore, RelocationIntent, SledStore};
}
