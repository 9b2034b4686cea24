//! Default path helpers and symlink checks.
//! Determines OS-appropriate config/store/log paths and detects symlinked ancestors.

use dirs::{config_dir, data_dir};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::CONFIG_ENV;

const APP_DIR: &str = "foldersync";

fn home_fallback(parts: &[&str]) -> Option<PathBuf> {
    env::var_os("HOME").map(|h| parts.iter().fold(PathBuf::from(h), |acc, p| acc.join(p)))
}

/// Config path: `$FOLDERSYNC_CONFIG` if set, else the OS config dir.
/// A relative override is resolved against the current directory; a directory override
/// means `<dir>/config.xml`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os(CONFIG_ENV) {
        let mut p = PathBuf::from(p);
        if p.is_relative() {
            p = env::current_dir().ok()?.join(p);
        }
        if p.is_dir() {
            p.push("config.xml");
        }
        return Some(p);
    }
    match config_dir() {
        Some(base) => Some(base.join(APP_DIR).join("config.xml")),
        None => home_fallback(&[".config", APP_DIR, "config.xml"]),
    }
}

/// OS-appropriate default store directory (data dir).
pub fn default_store_path() -> Option<PathBuf> {
    match data_dir() {
        Some(base) => Some(base.join(APP_DIR).join("store")),
        None => home_fallback(&[".local", "share", APP_DIR, "store"]),
    }
}

/// OS-appropriate default log file path (data dir).
pub fn default_log_path() -> Option<PathBuf> {
    match data_dir() {
        Some(base) => Some(base.join(APP_DIR).join("foldersync.log")),
        None => home_fallback(&[".local", "share", APP_DIR, "foldersync.log"]),
    }
}

/// Return true if any existing ancestor of `path` is a symlink.
pub fn path_has_symlink_ancestor(path: &Path) -> io::Result<bool> {
    let mut p = path.parent();
    while let Some(anc) = p {
        if anc.exists() {
            let meta = fs::symlink_metadata(anc)?;
            if meta.file_type().is_symlink() {
                return Ok(true);
            }
        }
        p = anc.parent();
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn detects_symlinked_ancestor() {
        let td = tempfile::tempdir().unwrap();
        let real = td.path().join("real");
        fs::create_dir(&real).unwrap();
        let link = td.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        assert!(path_has_symlink_ancestor(&link.join("x.log")).unwrap());
        assert!(!path_has_symlink_ancestor(&real.join("x.log")).unwrap());
    }
}
