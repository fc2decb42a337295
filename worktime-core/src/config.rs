//! User configuration at `<home>/.worktime/config.yaml`.
//!
//! A missing file yields [`Config::default`]; missing keys fall back to their
//! defaults. Functions take an explicit home; the CLI resolves it once with
//! [`paths::home`].
//!
//! ```yaml
//! list:
//!   page_size: 10
//! sync:
//!   poll_interval_ms: 500
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{config_io_err, ConfigError};
use crate::paths;

/// Number of registrations fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Period of the sync lock poll loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Shortest period the poll loop accepts.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Paginated list settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    pub page_size: usize,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Sync lock observer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncLockConfig {
    pub poll_interval_ms: u64,
}

impl SyncLockConfig {
    /// Sub-millisecond intervals round up to whole milliseconds.
    pub fn with_poll_interval(interval: Duration) -> Self {
        let millis = interval.as_nanos().div_ceil(1_000_000);
        Self {
            poll_interval_ms: u64::try_from(millis).unwrap_or(u64::MAX),
        }
    }

    /// The configured period, never shorter than [`MIN_POLL_INTERVAL`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }
}

impl Default for SyncLockConfig {
    fn default() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }
}

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub list: ListConfig,
    pub sync: SyncLockConfig,
}

impl Config {
    /// Reject values the list controller or poll loop cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.list.page_size == 0 {
            return Err(ConfigError::Invalid(
                "list.page_size must be at least 1".to_string(),
            ));
        }
        if self.sync.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "sync.poll_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load `<home>/.worktime/config.yaml`, or defaults when absent.
    pub fn load_at(home: &Path) -> Result<Self, ConfigError> {
        let path = paths::config_path(home);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| config_io_err(&path, e))?;
        // An empty file parses as YAML null; treat it like a missing one.
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::Parse { path: path.clone(), source: e })?;
        config.validate()?;
        Ok(config)
    }

    /// Atomically write `<home>/.worktime/config.yaml`.
    pub fn save_at(&self, home: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        let path = paths::config_path(home);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| config_io_err(dir, e))?;
        }
        let tmp = path.with_extension("yaml.tmp");
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(&tmp, yaml).map_err(|e| config_io_err(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| config_io_err(&path, e))?;
        Ok(())
    }
}
