use foldersync::prelude::*;
use std::path::PathBuf;

#[test]
fn prelude_exports_expected_items() {
    let opts = EngineOptions::default();
    assert!(opts.dir_locks);
    assert!(opts.include_hidden);

    let _ = FolderMoveOutcome::NoOp;
    let outcome = BatchOutcome::default();
    assert!(outcome.is_complete());

    let err = SyncError::PersistFailed { reason: "x".into() };
    assert_eq!(err.code(), 13);
    let _: SyncResult<()> = Err(err);

    let folder = FolderRecord::new(PathBuf::from("/r/A"), None);
    let _ = FolderEvent::Expand(folder.id);
    let _ = CheckpointRecord::new("/r/A/doc.excalidraw", Vec::new());
    let _ = FileId::new();
    let _ = IdentityMap::global();

    // Trait objects stay usable across the API.
    fn _accepts(_: std::sync::Arc<dyn MetadataStore>) {}
    let _ctor: fn(std::sync::Arc<dyn MetadataStore>, EngineOptions) -> SyncEngine = SyncEngine::new;
    let _ = SledStore::temporary;
}
