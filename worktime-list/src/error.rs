//! Error types for worktime-list.

use thiserror::Error;

use worktime_core::StoreError;

/// All errors that can arise from list loading.
#[derive(Debug, Error)]
pub enum ListError {
    /// The store failed during a reload; the rendered rows were left as they were.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A load-more task was handed out and has not been applied yet.
    #[error("a load-more request is already in flight")]
    LoadMoreInFlight,

    #[error("load-more task join failure: {0}")]
    Join(String),
}
