//! Error types for worktime-core.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::RegistrationId;

/// All errors that can arise from registration store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load. Includes file path and line context from serde_yaml.
    #[error("failed to parse registrations at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("time registration {id} not found")]
    NotFound { id: RegistrationId },

    /// Non-positive ids (including the list sentinel) never name a stored record.
    #[error("{id} is not a valid time registration id")]
    InvalidId { id: RegistrationId },

    #[error("already punched in (registration {id} is still ongoing)")]
    AlreadyPunchedIn { id: RegistrationId },

    #[error("not punched in; there is no ongoing time registration")]
    NotPunchedIn,

    #[error("end time {end} is before start time {start}")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// A thread panicked while holding the store lock.
    #[error("registration store lock poisoned")]
    Poisoned,
}

/// All errors that can arise from loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`, so `~/.worktime/` cannot be located.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn config_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
