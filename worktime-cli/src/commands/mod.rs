//! Subcommand implementations.

pub mod config;
pub mod list;
pub mod punch;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};

use worktime_core::{paths, YamlStore};

pub(crate) fn home_dir() -> Result<PathBuf> {
    paths::home().context("could not determine home directory")
}

pub(crate) fn open_local_store(home: &std::path::Path) -> Result<YamlStore> {
    let path = paths::local_store_path(home);
    YamlStore::open_at(path.clone())
        .with_context(|| format!("failed to open registrations at {}", path.display()))
}

/// Multi-threaded runtime for commands that page or observe a sync.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
