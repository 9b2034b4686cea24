use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

/// Run the binary against an isolated store, with no user config in play.
fn run(home: &Path, args: &[&str]) -> Output {
    Command::new(assert_cmd::cargo::cargo_bin!("foldersync"))
        .env("FOLDERSYNC_CONFIG", home.join("absent.xml"))
        .arg("--store")
        .arg(home.join("store"))
        .args(["--log-level", "quiet"])
        .args(args)
        .output()
        .expect("spawn binary")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn add_folder(home: &Path, path: &Path, parent: Option<&str>) -> String {
    let p = path.to_str().unwrap();
    let out = match parent {
        Some(id) => run(home, &["folder", "add", p, "--parent", id]),
        None => run(home, &["folder", "add", p]),
    };
    assert!(out.status.success(), "folder add failed: {}", String::from_utf8_lossy(&out.stderr));
    stdout(&out)
}

#[test]
fn print_config_succeeds() {
    let td = tempdir().unwrap();
    let out = Command::new(assert_cmd::cargo::cargo_bin!("foldersync"))
        .env("FOLDERSYNC_CONFIG", td.path().join("cfg.xml"))
        .arg("--print-config")
        .output()
        .expect("spawn binary");
    assert!(out.status.success());
    assert!(stdout(&out).contains("cfg.xml"));
}

#[test]
fn move_folder_end_to_end() {
    let td = tempdir().unwrap();
    let home = fs::canonicalize(td.path()).unwrap();
    let data = home.join("data");
    fs::create_dir_all(data.join("A")).unwrap();
    fs::write(data.join("A").join("doc.excalidraw"), b"{}").unwrap();
    fs::create_dir_all(data.join("B").join("A")).unwrap();

    let root = add_folder(&home, &data, None);
    let a = add_folder(&home, &data.join("A"), Some(&root));
    let b = add_folder(&home, &data.join("B"), Some(&root));

    let out = run(&home, &["move-folder", &a, &b]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout(&out).ends_with(&format!("{}", data.join("B").join("A_1").display())));
    assert!(data.join("B").join("A_1").join("doc.excalidraw").is_file());

    let list = stdout(&run(&home, &["folder", "list"]));
    let line = list.lines().find(|l| l.starts_with(&a)).expect("moved folder listed");
    assert!(line.contains(&b), "parent updated: {line}");
}

#[test]
fn move_files_reports_partial_failure_in_exit_code() {
    let td = tempdir().unwrap();
    let home = fs::canonicalize(td.path()).unwrap();
    let target = home.join("target");
    fs::create_dir_all(&target).unwrap();
    let present = home.join("present.txt");
    fs::write(&present, b"x").unwrap();
    let t = add_folder(&home, &target, None);

    let out = run(
        &home,
        &["move-files", "--into", &t, present.to_str().unwrap(), home.join("absent.txt").to_str().unwrap()],
    );

    assert_eq!(out.status.code(), Some(11));
    assert!(stdout(&out).contains("present.txt ->"));
    assert!(target.join("present.txt").is_file());
}

#[test]
fn unknown_folder_exits_with_invalid_folder_code() {
    let td = tempdir().unwrap();
    let out = run(
        td.path(),
        &["move-folder", "00000000-0000-0000-0000-000000000001", "00000000-0000-0000-0000-000000000002"],
    );
    assert_eq!(out.status.code(), Some(10));
}

#[test]
fn reconcile_json_on_clean_store() {
    let td = tempdir().unwrap();
    let out = run(td.path(), &["--json", "reconcile"]);
    assert!(out.status.success());
    let report: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(report["stale_mappings"], 0);
    assert!(report["missing_folders"].as_array().unwrap().is_empty());
}
