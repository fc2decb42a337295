//! On-disk layout.
//!
//! ```text
//! ~/.worktime/
//!   config.yaml                 (optional, defaults apply when absent)
//!   registrations.yaml          (local store, mode 0600)
//!   remote/registrations.yaml   (default remote store for `worktime sync`)
//! ```

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "config.yaml";
pub const REGISTRATIONS_FILE: &str = "registrations.yaml";

pub fn worktime_root(home: &Path) -> PathBuf {
    home.join(".worktime")
}

pub fn config_path(home: &Path) -> PathBuf {
    worktime_root(home).join(CONFIG_FILE)
}

pub fn local_store_path(home: &Path) -> PathBuf {
    worktime_root(home).join(REGISTRATIONS_FILE)
}

pub fn remote_store_path(home: &Path) -> PathBuf {
    worktime_root(home).join("remote").join(REGISTRATIONS_FILE)
}

/// The user's home directory, via `dirs::home_dir()`.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
