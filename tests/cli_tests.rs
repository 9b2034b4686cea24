use clap::Parser;
use foldersync::cli::{Args, Command, FolderCommand};
use foldersync::config::types::{Config, LogLevel};
use foldersync::FolderId;
use std::path::PathBuf;

#[test]
fn move_folder_parses_both_ids() {
    let (s, t) = (FolderId::new(), FolderId::new());
    let args = Args::parse_from(["foldersync", "move-folder", &s.to_string(), &t.to_string()]);
    match args.command {
        Some(Command::MoveFolder { source, target }) => {
            assert_eq!(source, s);
            assert_eq!(target, t);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn malformed_id_is_rejected() {
    assert!(Args::try_parse_from(["foldersync", "move-folder", "not-a-uuid", "x"]).is_err());
}

#[test]
fn move_files_collects_target_and_files() {
    let t = FolderId::new();
    let args = Args::parse_from(["foldersync", "move-files", "--into", &t.to_string(), "/a/1.txt", "/a/2.txt"]);
    match args.command {
        Some(Command::MoveFiles { into, files }) => {
            assert_eq!(into, t);
            assert_eq!(files, vec![PathBuf::from("/a/1.txt"), PathBuf::from("/a/2.txt")]);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn folder_add_accepts_optional_parent() {
    let p = FolderId::new();
    let args = Args::parse_from(["foldersync", "folder", "add", "/data/A", "--parent", &p.to_string()]);
    match args.command {
        Some(Command::Folder(FolderCommand::Add { path, parent })) => {
            assert_eq!(path, PathBuf::from("/data/A"));
            assert_eq!(parent, Some(p));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn effective_log_level_precedence() {
    let args = Args::parse_from(["foldersync", "--debug", "--log-level", "quiet", "reconcile"]);
    assert_eq!(args.effective_log_level(), Some(LogLevel::Debug));

    let args = Args::parse_from(["foldersync", "--log-level", "info", "reconcile"]);
    assert_eq!(args.effective_log_level(), Some(LogLevel::Info));

    let args = Args::parse_from(["foldersync", "reconcile"]);
    assert_eq!(args.effective_log_level(), None);
}

#[test]
fn apply_overrides_sets_flags() {
    let args = Args::parse_from(["foldersync", "--store", "'/srv/store/'", "--disable-locks", "folder", "list"]);
    let mut cfg = Config::new("/default/store");
    args.apply_overrides(&mut cfg);
    assert_eq!(cfg.store_path, PathBuf::from("/srv/store"));
    assert!(cfg.disable_locks);
    assert_eq!(cfg.log_level, LogLevel::Normal);
}
