//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - Creates a secure template if missing (unless FOLDERSYNC_CONFIG is set).
//!
//! Unknown XML fields are rejected so misconfigurations surface early.

use anyhow::{Context, Result, bail};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::paths::{default_config_path, default_store_path, path_has_symlink_ancestor};
use super::types::{Config, LogLevel};
use super::{CONFIG_ENV, EXPAND_DELAY_DEFAULT, LOCK_TIMEOUT_DEFAULT};
use crate::platform::{set_dir_mode_0700, set_file_mode_0600, write_config_secure_new_0600};

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    store_path: Option<String>,
    log_level: Option<String>,
    log_file: Option<String>,
    #[serde(default, deserialize_with = "de_u64_trimmed_opt")]
    expand_delay_ms: Option<u64>,
    #[serde(default, deserialize_with = "de_u64_trimmed_opt")]
    lock_timeout_ms: Option<u64>,
    disable_locks: Option<bool>,
    include_hidden: Option<bool>,
    refresh_after_move: Option<bool>,
}

// Trims surrounding whitespace for optional u64 values
fn de_u64_trimmed_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<u64>().map(Some).map_err(serde::de::Error::custom),
    }
}

fn non_empty_path(s: Option<&str>) -> Option<PathBuf> {
    s.map(str::trim).filter(|t| !t.is_empty()).map(PathBuf::from)
}

// Map XmlConfig -> Config
fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(p) = non_empty_path(parsed.store_path.as_deref()) {
        cfg.store_path = p;
    }
    cfg.log_file = non_empty_path(parsed.log_file.as_deref());
    if let Some(s) = parsed.log_level.as_deref() {
        cfg.log_level = s.trim().parse::<LogLevel>().map_err(anyhow::Error::msg)?;
    }
    cfg.expand_delay = parsed
        .expand_delay_ms
        .map(Duration::from_millis)
        .unwrap_or(EXPAND_DELAY_DEFAULT);
    cfg.lock_timeout = parsed
        .lock_timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(LOCK_TIMEOUT_DEFAULT);
    cfg.disable_locks = parsed.disable_locks.unwrap_or(false);
    cfg.include_hidden = parsed.include_hidden.unwrap_or(true);
    cfg.refresh_after_move = parsed.refresh_after_move.unwrap_or(false);
    Ok(cfg)
}

/// Load a Config from a specific XML file path.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig =
        from_xml_str(&contents).with_context(|| format!("parse config xml '{}'", path.display()))?;
    let cfg = xml_to_config(parsed).with_context(|| format!("config xml '{}'", path.display()))?;
    debug!(path = %path.display(), store = %cfg.store_path.display(), "config loaded");
    Ok(cfg)
}

/// If FOLDERSYNC_CONFIG is set and the file exists, load and return that Config;
/// otherwise Ok(None).
pub fn load_config_from_xml_env() -> Result<Option<Config>> {
    if env::var_os(CONFIG_ENV).is_none() {
        return Ok(None);
    }
    let path = default_config_path().context("resolve FOLDERSYNC_CONFIG path")?;
    if !path.exists() {
        debug!(path = %path.display(), "FOLDERSYNC_CONFIG points at a missing file; using defaults");
        return Ok(None);
    }
    load_config_from_xml_path(&path).map(Some)
}

/// Try loading Config from the platform default config.xml path.
/// Returns Ok(Some(cfg)) if the file exists and parses; Ok(None) if missing.
pub fn load_config_from_default_xml() -> Result<Option<Config>> {
    let Some(path) = default_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    load_config_from_xml_path(&path).map(Some)
}

/// Create default template config file and parent directory (best-effort permissions).
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        bail!("Refusing to create config: ancestor of {} is a symlink", path.display());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
        let _ = set_dir_mode_0700(parent);
    }

    let suggested_store = default_store_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "/path/to/foldersync/store".into());

    let content = format!(
        "<!--\n  foldersync configuration (XML)\n\n  Fields:\n    store_path          -> directory of the metadata store\n    log_level           -> quiet | normal | info | debug\n    log_file            -> path to log file (optional; stdout still used)\n    expand_delay_ms     -> pause between sidebar expand notifications\n    lock_timeout_ms     -> how long a move waits for path coordination\n    disable_locks       -> skip cross-process lock files (true/false)\n    include_hidden      -> relocate identities of hidden files too (true/false)\n    refresh_after_move  -> ask file listings to refresh after a folder move\n\n  CLI flags override XML values.\n-->\n<config>\n  <store_path>{}</store_path>\n  <log_level>normal</log_level>\n  <log_file></log_file>\n  <expand_delay_ms>{}</expand_delay_ms>\n  <lock_timeout_ms>{}</lock_timeout_ms>\n  <disable_locks>false</disable_locks>\n  <include_hidden>true</include_hidden>\n  <refresh_after_move>false</refresh_after_move>\n</config>\n",
        suggested_store,
        EXPAND_DELAY_DEFAULT.as_millis(),
        LOCK_TIMEOUT_DEFAULT.as_millis(),
    );

    write_config_secure_new_0600(path, content.as_bytes())?;
    let _ = set_file_mode_0600(path);

    info!("Created template config at {}", path.display());
    Ok(())
}

/// Create the default config if FOLDERSYNC_CONFIG is not set; return the created path so
/// the CLI can tell the user.
pub fn ensure_default_config_exists() -> Option<PathBuf> {
    if env::var_os(CONFIG_ENV).is_some() {
        return None;
    }
    let cfg_path = default_config_path()?;
    if cfg_path.exists() {
        return None;
    }
    match create_template_config(&cfg_path) {
        Ok(()) => Some(cfg_path),
        Err(e) => {
            debug!(path = %cfg_path.display(), error = %e, "template config not created");
            None
        }
    }
}
