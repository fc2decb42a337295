//! # worktime-sync
//!
//! Synchronization of the local registration store with a remote one.
//!
//! - [`SyncSession`] tracks one run: busy/idle, the current [`SyncAction`],
//!   cooperative cancellation and the terminal [`SyncHistory`].
//! - [`engine::reconcile`] performs the actual push/pull and ghost detection.
//! - [`SyncAccount`] ties both together behind the [`SyncAccountService`]
//!   query surface.
//! - [`SyncLockCoordinator`] observes a running session from an async task and
//!   reports progress until it finishes or the observer is cancelled.

pub mod account;
pub mod engine;
pub mod error;
pub mod lock;
pub mod session;

pub use account::{SyncAccount, SyncAccountService};
pub use error::SyncError;
pub use lock::{LockEvent, LockExit, SyncLockCoordinator, SyncLockHandle};
pub use session::{SyncAction, SyncHistory, SyncOutcome, SyncReport, SyncSession, SyncStatus};
