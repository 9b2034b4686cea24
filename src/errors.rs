//! Typed error definitions for foldersync.
//! Every relocation entry point surfaces one of these so callers can tell a bad
//! folder reference from a refused coordination from a disk-level move failure.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Folder ID does not resolve, or a required path/bookmark is missing or unusable.
    #[error("Invalid folder: {reason}")]
    InvalidFolder { reason: String },

    /// The OS rejected the physical move (permission, cross-device copy failure, target appeared).
    #[error("Move failed '{}' -> '{}': {source}", from.display(), to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Coordination with other readers/writers, or capability acquisition, was refused.
    #[error("Access denied on {}: {reason}", path.display())]
    AccessDenied { path: PathBuf, reason: String },

    /// Metadata commit failed after the physical layout already changed.
    #[error("Persisting metadata failed: {reason}")]
    PersistFailed { reason: String },

    /// Reading the metadata store failed before anything was mutated.
    #[error("Metadata store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    pub(crate) fn invalid_folder(reason: impl Into<String>) -> Self {
        SyncError::InvalidFolder {
            reason: reason.into(),
        }
    }

    pub(crate) fn access_denied(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SyncError::AccessDenied {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn persist_failed(reason: impl Into<String>) -> Self {
        SyncError::PersistFailed {
            reason: reason.into(),
        }
    }

    /// Stable numeric code, used as a structured log field and as the CLI exit code.
    pub fn code(&self) -> i32 {
        match self {
            SyncError::InvalidFolder { .. } => 10,
            SyncError::MoveFailed { .. } => 11,
            SyncError::AccessDenied { .. } => 12,
            SyncError::PersistFailed { .. } => 13,
            SyncError::Store(_) => 14,
            SyncError::Config(_) => 15,
        }
    }

    /// Stable snake_case label for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::InvalidFolder { .. } => "invalid_folder",
            SyncError::MoveFailed { .. } => "move_failed",
            SyncError::AccessDenied { .. } => "access_denied",
            SyncError::PersistFailed { .. } => "persist_failed",
            SyncError::Store(_) => "store",
            SyncError::Config(_) => "config",
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_per_kind() {
        let errs = [
            SyncError::invalid_folder("x"),
            SyncError::MoveFailed {
                from: "/a".into(),
                to: "/b".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
            SyncError::access_denied("/a", "busy"),
            SyncError::persist_failed("disk full"),
            SyncError::Config("bad".into()),
        ];
        let mut codes: Vec<i32> = errs.iter().map(SyncError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errs.len());
    }

    #[test]
    fn move_failed_message_names_both_paths() {
        let e = SyncError::MoveFailed {
            from: "/root/A".into(),
            to: "/root/B/A".into(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        let msg = e.to_string();
        assert!(msg.contains("/root/A"));
        assert!(msg.contains("/root/B/A"));
        assert_eq!(e.kind(), "move_failed");
    }
}
