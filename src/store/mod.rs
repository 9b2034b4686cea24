//! Persisted metadata: folder records and path-keyed checkpoints.
//!
//! The engine only needs read-by-id, in-place mutation, query-by-path and an atomic
//! commit, plus a small journal of in-flight folder relocations, so that is all
//! `MetadataStore` asks for. `SledStore` is the on-disk backend.

mod sled_store;

pub use sled_store::SledStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::bookmark::SecurityBookmark;
use crate::identity::FileId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend: {0}")]
    Backend(#[from] sled::Error),

    #[error("record encoding: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("transaction aborted: {0}")]
    Aborted(String),
}

/// Opaque, stable folder identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FolderId(pub Uuid);

impl FolderId {
    pub fn new() -> Self {
        FolderId(Uuid::new_v4())
    }
}

impl Default for FolderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FolderId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(FolderId)
    }
}

/// A folder the application tracks; `parent` links form a tree with one root per mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub id: FolderId,
    pub path: PathBuf,
    pub parent: Option<FolderId>,
    pub bookmark: Option<SecurityBookmark>,
}

impl FolderRecord {
    pub fn new(path: impl Into<PathBuf>, parent: Option<FolderId>) -> Self {
        Self {
            id: FolderId::new(),
            path: path.into(),
            parent,
            bookmark: None,
        }
    }

    /// New record with a bookmark derived for its current location.
    pub fn register(path: impl Into<PathBuf>, parent: Option<FolderId>) -> std::io::Result<Self> {
        let mut record = Self::new(path, parent);
        record.bookmark = Some(SecurityBookmark::create(&record.path)?);
        Ok(record)
    }
}

/// Historical snapshot of a document, addressed by the document's absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub id: Uuid,
    pub path: PathBuf,
    pub file_id: Option<FileId>,
    pub created_at: DateTime<Utc>,
    pub content: Vec<u8>,
}

impl CheckpointRecord {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            file_id: None,
            created_at: Utc::now(),
            content: content.into(),
        }
    }
}

/// A folder relocation that has started but not yet committed.
///
/// Written before any identity is rekeyed and cleared after the folder records commit.
/// An intent that survives tells `reconcile` which way to repair: back to `from` when the
/// move never happened, forward to `to` when it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationIntent {
    pub id: Uuid,
    pub folder: FolderId,
    pub parent: FolderId,
    pub from: PathBuf,
    pub to: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl RelocationIntent {
    pub fn new(folder: FolderId, parent: FolderId, from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            folder,
            parent,
            from: from.into(),
            to: to.into(),
            created_at: Utc::now(),
        }
    }
}

/// Persisted folder/checkpoint entities.
pub trait MetadataStore: Send + Sync {
    fn folder(&self, id: FolderId) -> Result<Option<FolderRecord>, StoreError>;

    fn folders(&self) -> Result<Vec<FolderRecord>, StoreError>;

    /// Commit every record or none of them.
    fn save_folders(&self, records: &[FolderRecord]) -> Result<(), StoreError>;

    fn save_folder(&self, record: &FolderRecord) -> Result<(), StoreError> {
        self.save_folders(std::slice::from_ref(record))
    }

    fn checkpoints(&self) -> Result<Vec<CheckpointRecord>, StoreError>;

    fn checkpoints_at(&self, path: &Path) -> Result<Vec<CheckpointRecord>, StoreError>;

    fn save_checkpoint(&self, record: &CheckpointRecord) -> Result<(), StoreError>;

    /// Repoint every checkpoint whose path equals `old` to `new` in one transaction.
    /// Returns how many were rewritten; zero once nothing references `old`.
    fn relocate_checkpoints(&self, old: &Path, new: &Path) -> Result<usize, StoreError>;

    fn record_intent(&self, intent: &RelocationIntent) -> Result<(), StoreError>;

    fn intents(&self) -> Result<Vec<RelocationIntent>, StoreError>;

    fn clear_intent(&self, id: Uuid) -> Result<(), StoreError>;
}
