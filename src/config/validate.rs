//! Config validation logic.

use anyhow::{Context, Result, bail};
use std::fs;
use tracing::info;

use super::paths::path_has_symlink_ancestor;
use super::types::Config;
use crate::platform::set_dir_mode_0700;

impl Config {
    /// Check timeouts, prepare the store directory, and refuse symlinked log locations.
    pub fn validate(&self) -> Result<()> {
        if self.lock_timeout.is_zero() {
            bail!("lock_timeout must be greater than zero");
        }

        let store = &self.store_path;
        if store.exists() {
            if !store.is_dir() {
                bail!("store_path exists but isn't a directory: {}", store.display());
            }
        } else {
            fs::create_dir_all(store)
                .with_context(|| format!("Failed to create store directory '{}'", store.display()))?;
            let _ = set_dir_mode_0700(store);
            info!("Created store directory: {}", store.display());
        }

        if let Some(log) = &self.log_file {
            if path_has_symlink_ancestor(log)
                .with_context(|| format!("inspect log path '{}'", log.display()))?
            {
                bail!("log_file '{}' has a symlinked ancestor", log.display());
            }
            if log.is_dir() {
                bail!("log_file '{}' is a directory", log.display());
            }
        }
        Ok(())
    }
}
