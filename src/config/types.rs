//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::paths;
use super::{EXPAND_DELAY_DEFAULT, LOCK_TIMEOUT_DEFAULT};

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Runtime configuration for the sync engine and its CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory of the persisted metadata store
    pub store_path: PathBuf,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
    /// Pause after each expand notification
    pub expand_delay: Duration,
    /// How long a move waits for path coordination
    pub lock_timeout: Duration,
    /// Skip cross-process sidecar lock files (in-process coordination still applies)
    pub disable_locks: bool,
    /// Enumerate hidden entries when relocating a folder's contents
    pub include_hidden: bool,
    /// Publish a RefreshFiles event after every folder move
    pub refresh_after_move: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: paths::default_store_path().unwrap_or_else(|| PathBuf::from("foldersync.db")),
            log_level: LogLevel::Normal,
            log_file: None,
            expand_delay: EXPAND_DELAY_DEFAULT,
            lock_timeout: LOCK_TIMEOUT_DEFAULT,
            disable_locks: false,
            include_hidden: true,
            refresh_after_move: false,
        }
    }
}

impl Config {
    /// Construct a Config around an explicit store directory; other fields use defaults.
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            ..Default::default()
        }
    }
}
