//! Worktime core library: domain types, registration store, configuration, errors.
//!
//! Public API surface:
//! - [`types`]: newtypes and domain structs
//! - [`error`]: [`StoreError`], [`ConfigError`]
//! - [`store`]: the [`RegistrationStore`] seam and the YAML-backed [`YamlStore`]
//! - [`punch`]: punch-in / punch-out rules on top of a store
//! - [`config`]: `~/.worktime/config.yaml` load / save

pub mod config;
pub mod error;
pub mod paths;
pub mod punch;
pub mod store;
pub mod types;

pub use config::{Config, ListConfig, SyncLockConfig};
pub use error::{ConfigError, StoreError};
pub use store::{RegistrationStore, YamlStore};
pub use types::{NewRegistration, RegistrationId, TaskRef, TimeRegistration};
