//! CLI definition and parsing.
//!
//! Notes:
//! - Global flags may appear before or after the subcommand.
//! - --debug is a shorthand for --log-level debug.

use clap::{Parser, Subcommand, ValueHint};
use std::path::{Path, PathBuf};

use crate::config::types::{Config, LogLevel};
use crate::store::FolderId;

/// Keep tracked folders and their metadata consistent while moving them on disk.
/// CLI flags override config values (which are loaded from XML if present).
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Move folders and files without losing their metadata")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Override the metadata store directory (normally configured via XML).
    #[arg(long, global = true, value_hint = ValueHint::DirPath, help = "Override the metadata store directory")]
    pub store: Option<PathBuf>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(short = 'd', long, global = true, help = "Enable debug logging (shorthand for --log-level debug)")]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, global = true, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<String>,

    /// Print where foldersync will look for the config file, then exit.
    #[arg(long, help = "Print the config file location used by foldersync and exit")]
    pub print_config: bool,

    /// Disable cross-process directory locking (for NFS/ZFS shares where flock may fail).
    #[arg(long, global = true, help = "Disable cross-process directory locking")]
    pub disable_locks: bool,

    /// Emit logs and command results as JSON.
    #[arg(long, global = true, help = "Emit logs and results in structured JSON")]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Manage tracked folder records.
    #[command(subcommand)]
    Folder(FolderCommand),

    /// Move folder SOURCE into folder TARGET.
    MoveFolder {
        #[arg(value_name = "SOURCE_ID")]
        source: FolderId,
        #[arg(value_name = "TARGET_ID")]
        target: FolderId,
    },

    /// Move individual files into a folder.
    MoveFiles {
        /// Destination folder id.
        #[arg(long, value_name = "TARGET_ID")]
        into: FolderId,
        #[arg(required = true, value_name = "FILES", value_hint = ValueHint::FilePath)]
        files: Vec<PathBuf>,
    },

    /// Repair identities, bookmarks and report dangling records.
    Reconcile,
}

#[derive(Subcommand, Debug, Clone)]
pub enum FolderCommand {
    /// Register an existing directory as a tracked folder.
    Add {
        #[arg(value_hint = ValueHint::DirPath)]
        path: PathBuf,
        #[arg(long, value_name = "ID")]
        parent: Option<FolderId>,
    },
    /// List tracked folders.
    List,
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(store) = &self.store {
            cfg.store_path = sanitize_path(store);
        }
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if self.disable_locks {
            cfg.disable_locks = true;
        }
    }
}

/// Strip shell quoting leftovers from a user-supplied path.
pub fn sanitize_path(p: &Path) -> PathBuf {
    sanitize_str(&p.to_string_lossy())
}

fn sanitize_str(s: &str) -> PathBuf {
    // Quotes survive when invoked through PowerShell or CMD.
    let trimmed = s.trim();
    let mut inner = if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.trim_matches(|c| c == '\'' || c == '"').to_string()
    };
    inner.retain(|c| c != '\'' && c != '"');

    // One trailing separator, never the root itself.
    if (inner.ends_with('\\') || inner.ends_with('/')) && inner.len() > 1 {
        inner.pop();
    }
    PathBuf::from(inner)
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_trailing_slash_are_stripped() {
        assert_eq!(sanitize_str("'/data/in box/'"), PathBuf::from("/data/in box"));
        assert_eq!(sanitize_str("\"C:\\Users\\me\\\""), PathBuf::from("C:\\Users\\me"));
        assert_eq!(sanitize_str("/"), PathBuf::from("/"));
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let args = Args::try_parse_from(["foldersync", "reconcile", "--store", "/tmp/s", "--debug"]).unwrap();
        assert!(matches!(args.command, Some(Command::Reconcile)));
        assert_eq!(args.effective_log_level(), Some(LogLevel::Debug));
        let mut cfg = Config::new("/elsewhere");
        args.apply_overrides(&mut cfg);
        assert_eq!(cfg.store_path, PathBuf::from("/tmp/s"));
    }

    #[test]
    fn move_files_requires_files() {
        let id = FolderId::new().to_string();
        assert!(Args::try_parse_from(["foldersync", "move-files", "--into", &id]).is_err());
    }
}
