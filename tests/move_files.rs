use foldersync::prelude::*;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn engine(store: &Arc<SledStore>) -> SyncEngine {
    let opts = EngineOptions {
        lock_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    SyncEngine::new(store.clone(), opts).with_identity_map(Arc::new(IdentityMap::new()))
}

#[tokio::test]
async fn colliding_name_gets_parenthesized_suffix() {
    let td = tempdir().unwrap();
    let root = fs::canonicalize(td.path()).unwrap();
    fs::create_dir_all(root.join("inbox")).unwrap();
    fs::create_dir_all(root.join("target")).unwrap();
    fs::write(root.join("inbox").join("doc.excalidraw"), b"new").unwrap();
    fs::write(root.join("target").join("doc.excalidraw"), b"old").unwrap();
    let store = Arc::new(SledStore::temporary().unwrap());
    let eng = engine(&store);
    let target = eng.register_folder(&root.join("target"), None).unwrap();

    let src = root.join("inbox").join("doc.excalidraw");
    let moved = eng.move_files(std::slice::from_ref(&src), target.id).await.unwrap();

    let dest = root.join("target").join("doc (1).excalidraw");
    assert_eq!(moved.get(&src), Some(&dest));
    assert_eq!(fs::read(&dest).unwrap(), b"new");
    assert_eq!(fs::read(root.join("target").join("doc.excalidraw")).unwrap(), b"old");
}

#[tokio::test]
async fn one_unmovable_file_does_not_stop_the_batch() {
    let td = tempdir().unwrap();
    let root = fs::canonicalize(td.path()).unwrap();
    fs::create_dir_all(root.join("inbox")).unwrap();
    fs::create_dir_all(root.join("target")).unwrap();
    let files: Vec<PathBuf> = (1..=3).map(|i| root.join("inbox").join(format!("f{i}.excalidraw"))).collect();
    fs::write(&files[0], b"1").unwrap();
    fs::write(&files[2], b"3").unwrap();
    let store = Arc::new(SledStore::temporary().unwrap());
    let eng = engine(&store);
    let target = eng.register_folder(&root.join("target"), None).unwrap();

    let outcome = eng.move_files_detailed(&files, target.id).await.unwrap();

    assert_eq!(outcome.moved.len(), 2);
    assert!(!outcome.moved.contains_key(&files[1]));
    assert_eq!(outcome.moved[&files[0]], root.join("target").join("f1.excalidraw"));
    assert_eq!(outcome.moved[&files[2]], root.join("target").join("f3.excalidraw"));
    assert!(!outcome.is_complete());
    let (failed, err) = &outcome.failed[0];
    assert_eq!(failed, &files[1]);
    match err {
        SyncError::MoveFailed { source, .. } => assert_eq!(source.kind(), io::ErrorKind::NotFound),
        other => panic!("unexpected error: {other:?}"),
    }

    let mapping = eng.move_files(&[root.join("inbox").join("gone")], target.id).await.unwrap();
    assert!(mapping.is_empty());
}

#[tokio::test]
async fn identities_and_checkpoints_follow_each_file() {
    let td = tempdir().unwrap();
    let root = fs::canonicalize(td.path()).unwrap();
    fs::create_dir_all(root.join("inbox")).unwrap();
    fs::create_dir_all(root.join("target")).unwrap();
    let src = root.join("inbox").join("doc.excalidraw");
    fs::write(&src, b"{}").unwrap();
    let store = Arc::new(SledStore::temporary().unwrap());
    let eng = engine(&store);
    let target = eng.register_folder(&root.join("target"), None).unwrap();
    let id = FileId::new();
    eng.identity().insert(src.clone(), id);
    store.save_checkpoint(&CheckpointRecord::new(src.clone(), b"v1".to_vec())).unwrap();
    let mut rx = eng.subscribe();

    eng.move_files(std::slice::from_ref(&src), target.id).await.unwrap();
    eng.flush_background().await;

    let dest = root.join("target").join("doc.excalidraw");
    assert_eq!(eng.identity().lookup(&dest), Some(id));
    assert_eq!(eng.identity().lookup(&src), None);
    assert!(store.checkpoints_at(&src).unwrap().is_empty());
    assert_eq!(store.checkpoints_at(&dest).unwrap().len(), 1);
    match rx.recv().await.unwrap() {
        FolderEvent::FilesMoved { folder, moved, failed } => {
            assert_eq!(folder, target.id);
            assert_eq!(moved.get(&src), Some(&dest));
            assert!(failed.is_empty());
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn file_already_in_target_maps_to_itself() {
    let td = tempdir().unwrap();
    let root = fs::canonicalize(td.path()).unwrap();
    fs::create_dir_all(root.join("target")).unwrap();
    let f = root.join("target").join("doc.excalidraw");
    fs::write(&f, b"{}").unwrap();
    let store = Arc::new(SledStore::temporary().unwrap());
    let eng = engine(&store);
    let target = eng.register_folder(&root.join("target"), None).unwrap();

    let moved = eng.move_files(std::slice::from_ref(&f), target.id).await.unwrap();

    assert_eq!(moved.get(&f), Some(&f));
    assert!(!root.join("target").join("doc (1).excalidraw").exists());
}

#[tokio::test]
async fn scoped_access_is_released_after_the_batch() {
    let td = tempdir().unwrap();
    let root = fs::canonicalize(td.path()).unwrap();
    fs::create_dir_all(root.join("target")).unwrap();
    let store = Arc::new(SledStore::temporary().unwrap());
    let eng = engine(&store);
    let target = eng.register_folder(&root.join("target"), None).unwrap();

    let _ = eng.move_files(&[root.join("missing")], target.id).await.unwrap();

    assert_eq!(eng.access().active(&target.path), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn stale_bookmark_is_access_denied() {
    let td = tempdir().unwrap();
    let root = fs::canonicalize(td.path()).unwrap();
    fs::create_dir_all(root.join("target")).unwrap();
    fs::write(root.join("a.txt"), b"a").unwrap();
    let store = Arc::new(SledStore::temporary().unwrap());
    let eng = engine(&store);
    let target = eng.register_folder(&root.join("target"), None).unwrap();

    // Replace the directory behind the record's back.
    fs::rename(root.join("target"), root.join("elsewhere")).unwrap();
    fs::create_dir(root.join("target")).unwrap();

    let err = eng.move_files(&[root.join("a.txt")], target.id).await.unwrap_err();
    assert!(matches!(err, SyncError::AccessDenied { .. }), "got {err:?}");
    assert!(root.join("a.txt").exists());
    assert_eq!(eng.access().active(&target.path), 0);
}

#[tokio::test]
async fn unknown_target_is_invalid_folder() {
    let store = Arc::new(SledStore::temporary().unwrap());
    let eng = engine(&store);
    let err = eng.move_files(&[PathBuf::from("/nope")], FolderId::new()).await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidFolder { .. }));
}

#[tokio::test]
async fn file_in_target_under_another_spelling_maps_to_itself() {
    let td = tempdir().unwrap();
    let root = fs::canonicalize(td.path()).unwrap();
    fs::create_dir_all(root.join("target")).unwrap();
    let f = root.join("target").join("doc.excalidraw");
    fs::write(&f, b"{}").unwrap();
    let store = Arc::new(SledStore::temporary().unwrap());
    let eng = engine(&store);
    let target = eng.register_folder(&root.join("target"), None).unwrap();
    let spelled = root.join("target").join("..").join("target").join("doc.excalidraw");

    let outcome = eng.move_files_detailed(std::slice::from_ref(&spelled), target.id).await.unwrap();

    assert!(outcome.is_complete(), "{:?}", outcome.failed);
    assert_eq!(outcome.moved.get(&spelled), Some(&f));
    assert_eq!(fs::read(&f).unwrap(), b"{}");
    assert!(!root.join("target").join("doc (1).excalidraw").exists());
}

#[tokio::test]
async fn identity_follows_file_given_by_unresolved_path() {
    let td = tempdir().unwrap();
    let root = fs::canonicalize(td.path()).unwrap();
    fs::create_dir_all(root.join("inbox")).unwrap();
    fs::create_dir_all(root.join("target")).unwrap();
    let src = root.join("inbox").join("doc.excalidraw");
    fs::write(&src, b"{}").unwrap();
    let store = Arc::new(SledStore::temporary().unwrap());
    let eng = engine(&store);
    let target = eng.register_folder(&root.join("target"), None).unwrap();
    let id = FileId::new();
    eng.identity().insert(src.clone(), id);
    store.save_checkpoint(&CheckpointRecord::new(src.clone(), b"v1".to_vec())).unwrap();
    let spelled = root.join("target").join("..").join("inbox").join("doc.excalidraw");

    let moved = eng.move_files(std::slice::from_ref(&spelled), target.id).await.unwrap();
    eng.flush_background().await;

    let dest = root.join("target").join("doc.excalidraw");
    assert_eq!(moved.get(&spelled), Some(&dest));
    assert_eq!(eng.identity().lookup(&dest), Some(id));
    assert_eq!(eng.identity().lookup(&src), None);
    assert_eq!(store.checkpoints_at(&dest).unwrap().len(), 1);
}
