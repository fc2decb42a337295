//! Error types for worktime-sync.

use thiserror::Error;

use worktime_core::StoreError;

use crate::session::{SyncAction, SyncStatus};

/// All errors that can arise from synchronization and its observation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the local or remote registration store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("a synchronization is already running")]
    SyncBusy,

    /// The coordinator's poll loop is still active.
    #[error("sync lock is already being observed")]
    AlreadyObserving,

    #[error("cannot move sync session from {status:?} to {action:?}")]
    InvalidTransition {
        status: SyncStatus,
        action: SyncAction,
    },

    #[error("synchronization cancelled")]
    Cancelled,

    /// The local store breaks the one-ongoing-registration rule.
    #[error("{count} time registrations are ongoing, at most one is allowed")]
    MultipleOngoing { count: usize },

    #[error("sync session lock poisoned")]
    Poisoned,

    #[error("sync lock requires a running tokio runtime")]
    NoRuntime,

    #[error("sync task join error: {0}")]
    Join(String),
}
