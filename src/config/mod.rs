//! Config module.
//! Provides configuration types, default paths, XML loading, and validation.

pub mod paths;
pub mod types;
mod validate;
pub mod xml;

pub use paths::{default_config_path, default_log_path, default_store_path, path_has_symlink_ancestor};
pub use types::{Config, LogLevel};
pub use xml::{
    create_template_config, ensure_default_config_exists, load_config_from_default_xml,
    load_config_from_xml_env, load_config_from_xml_path,
};

use std::time::Duration;

/// Environment variable naming an explicit config.xml.
pub const CONFIG_ENV: &str = "FOLDERSYNC_CONFIG";

/// Spacing between consecutive expand notifications.
pub const EXPAND_DELAY_DEFAULT: Duration = Duration::from_millis(200);

/// Bound on waiting for path coordination before giving up with an access denial.
pub const LOCK_TIMEOUT_DEFAULT: Duration = Duration::from_secs(10);
