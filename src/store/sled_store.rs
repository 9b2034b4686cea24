//! sled-backed `MetadataStore`.
//!
//! Records live in trees keyed by UUID bytes with JSON values. `checkpoint_paths` indexes
//! checkpoints by path (path bytes -> concatenated 16-byte ids) and is updated in the same
//! transaction as the records, so query-by-path never decodes unrelated checkpoints.

use serde::Serialize;
use serde::de::DeserializeOwned;
use sled::Transactional;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError, TransactionResult,
    TransactionalTree,
};
use std::path::Path;
use tracing::{debug, info, trace};
use uuid::Uuid;

use super::{CheckpointRecord, FolderId, FolderRecord, MetadataStore, RelocationIntent, StoreError};

const FOLDERS_TREE: &str = "folders";
const CHECKPOINTS_TREE: &str = "checkpoints";
const CHECKPOINT_PATHS_TREE: &str = "checkpoint_paths";
const INTENTS_TREE: &str = "intents";

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn from_tx(e: TransactionError<StoreError>) -> StoreError {
    match e {
        TransactionError::Abort(inner) => inner,
        TransactionError::Storage(inner) => StoreError::Backend(inner),
    }
}

fn path_key(path: &Path) -> &[u8] {
    path.as_os_str().as_encoded_bytes()
}

fn decode_ids(bytes: &[u8]) -> Vec<Uuid> {
    bytes
        .chunks_exact(16)
        .filter_map(|c| <[u8; 16]>::try_from(c).ok().map(Uuid::from_bytes))
        .collect()
}

fn encode_ids(ids: &[Uuid]) -> Vec<u8> {
    ids.iter().flat_map(|id| id.as_bytes().iter().copied()).collect()
}

fn abort<T>(res: Result<T, StoreError>) -> ConflictableTransactionResult<T, StoreError> {
    res.map_err(ConflictableTransactionError::Abort)
}

/// Add `id` under `path` in the index.
fn index_add(idx: &TransactionalTree, path: &Path, id: Uuid) -> ConflictableTransactionResult<(), StoreError> {
    let mut ids = idx.get(path_key(path))?.map(|v| decode_ids(&v)).unwrap_or_default();
    if !ids.contains(&id) {
        ids.push(id);
        idx.insert(path_key(path), encode_ids(&ids))?;
    }
    Ok(())
}

/// Drop `id` from the entry for `path`, removing the entry when it empties.
fn index_remove(idx: &TransactionalTree, path: &Path, id: Uuid) -> ConflictableTransactionResult<(), StoreError> {
    let Some(v) = idx.get(path_key(path))? else {
        return Ok(());
    };
    let ids: Vec<Uuid> = decode_ids(&v).into_iter().filter(|x| *x != id).collect();
    if ids.is_empty() {
        idx.remove(path_key(path))?;
    } else {
        idx.insert(path_key(path), encode_ids(&ids))?;
    }
    Ok(())
}

pub struct SledStore {
    db: sled::Db,
    folders: sled::Tree,
    checkpoints: sled::Tree,
    checkpoint_paths: sled::Tree,
    intents: sled::Tree,
}

impl SledStore {
    /// Open (or create) the database directory at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        debug!(path = %path.display(), "opened metadata store");
        Self::from_db(db)
    }

    /// A throwaway database that is deleted on drop.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        let store = Self {
            folders: db.open_tree(FOLDERS_TREE)?,
            checkpoints: db.open_tree(CHECKPOINTS_TREE)?,
            checkpoint_paths: db.open_tree(CHECKPOINT_PATHS_TREE)?,
            intents: db.open_tree(INTENTS_TREE)?,
            db,
        };
        if store.checkpoint_paths.is_empty() && !store.checkpoints.is_empty() {
            store.rebuild_path_index()?;
        }
        Ok(store)
    }

    /// Recreate the path index from the checkpoint records.
    fn rebuild_path_index(&self) -> Result<(), StoreError> {
        self.checkpoint_paths.clear()?;
        let mut indexed = 0usize;
        for record in Self::scan::<CheckpointRecord>(&self.checkpoints)? {
            let key = path_key(&record.path);
            let mut ids = self.checkpoint_paths.get(key)?.map(|v| decode_ids(&v)).unwrap_or_default();
            ids.push(record.id);
            self.checkpoint_paths.insert(key, encode_ids(&ids))?;
            indexed += 1;
        }
        self.db.flush()?;
        info!(checkpoints = indexed, "checkpoint path index rebuilt");
        Ok(())
    }

    fn scan<T: DeserializeOwned>(tree: &sled::Tree) -> Result<Vec<T>, StoreError> {
        tree.iter()
            .values()
            .map(|v| decode(&v?))
            .collect()
    }
}

impl MetadataStore for SledStore {
    fn folder(&self, id: FolderId) -> Result<Option<FolderRecord>, StoreError> {
        match self.folders.get(id.0.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn folders(&self) -> Result<Vec<FolderRecord>, StoreError> {
        Self::scan(&self.folders)
    }

    fn save_folders(&self, records: &[FolderRecord]) -> Result<(), StoreError> {
        let encoded: Vec<(Vec<u8>, Vec<u8>)> = records
            .iter()
            .map(|r| Ok((r.id.0.as_bytes().to_vec(), encode(r)?)))
            .collect::<Result<_, StoreError>>()?;

        let res: TransactionResult<(), StoreError> = self.folders.transaction(|tx| {
            for (k, v) in &encoded {
                tx.insert(k.as_slice(), v.as_slice())?;
            }
            Ok(())
        });
        res.map_err(from_tx)?;
        self.db.flush()?;
        trace!(count = records.len(), "folder records committed");
        Ok(())
    }

    fn checkpoints(&self) -> Result<Vec<CheckpointRecord>, StoreError> {
        Self::scan(&self.checkpoints)
    }

    fn checkpoints_at(&self, path: &Path) -> Result<Vec<CheckpointRecord>, StoreError> {
        let Some(ids) = self.checkpoint_paths.get(path_key(path))? else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for id in decode_ids(&ids) {
            if let Some(bytes) = self.checkpoints.get(id.as_bytes())? {
                out.push(decode(&bytes)?);
            }
        }
        Ok(out)
    }

    fn save_checkpoint(&self, record: &CheckpointRecord) -> Result<(), StoreError> {
        let value = encode(record)?;
        let res: TransactionResult<(), StoreError> =
            (&self.checkpoints, &self.checkpoint_paths).transaction(|(cps, idx)| {
                if let Some(prev) = cps.insert(record.id.as_bytes().as_slice(), value.as_slice())? {
                    let prev: CheckpointRecord = abort(decode(&prev))?;
                    if prev.path != record.path {
                        index_remove(idx, &prev.path, record.id)?;
                    }
                }
                index_add(idx, &record.path, record.id)
            });
        res.map_err(from_tx)?;
        self.db.flush()?;
        Ok(())
    }

    fn relocate_checkpoints(&self, old: &Path, new: &Path) -> Result<usize, StoreError> {
        if old == new {
            return Ok(0);
        }
        let res: TransactionResult<usize, StoreError> =
            (&self.checkpoints, &self.checkpoint_paths).transaction(|(cps, idx)| {
                let Some(ids) = idx.get(path_key(old))? else {
                    return Ok(0);
                };
                let mut rewritten = 0;
                for id in decode_ids(&ids) {
                    let Some(bytes) = cps.get(id.as_bytes())? else { continue };
                    let mut record: CheckpointRecord = abort(decode(&bytes))?;
                    if record.path != old {
                        continue;
                    }
                    record.path = new.to_path_buf();
                    cps.insert(id.as_bytes().as_slice(), abort(encode(&record))?)?;
                    index_add(idx, new, id)?;
                    rewritten += 1;
                }
                idx.remove(path_key(old))?;
                Ok(rewritten)
            });
        let rewritten = res.map_err(from_tx)?;
        if rewritten > 0 {
            self.db.flush()?;
        }
        Ok(rewritten)
    }

    fn record_intent(&self, intent: &RelocationIntent) -> Result<(), StoreError> {
        self.intents.insert(intent.id.as_bytes(), encode(intent)?)?;
        self.db.flush()?;
        Ok(())
    }

    fn intents(&self) -> Result<Vec<RelocationIntent>, StoreError> {
        Self::scan(&self.intents)
    }

    fn clear_intent(&self, id: Uuid) -> Result<(), StoreError> {
        self.intents.remove(id.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }
}
