//! # worktime-list
//!
//! Windowed, incrementally loaded view over a [`RegistrationStore`].
//!
//! [`PaginatedListController`] keeps the rendered rows, terminates them with a
//! single "load more" sentinel while the store holds more records than are
//! loaded, and reports every change as a [`RefillDiff`].
//!
//! [`RegistrationStore`]: worktime_core::RegistrationStore

pub mod controller;
pub mod diff;
pub mod error;
pub mod load_more;
pub mod row;

pub use controller::PaginatedListController;
pub use diff::{ListView, RefillDiff, SentinelChange};
pub use error::ListError;
pub use load_more::{LoadMoreOutcome, LoadMoreTask, PageFetch};
pub use row::{ListRow, PageWindow};
