//! Punch-in / punch-out rules.
//!
//! At most one registration per account may be ongoing; both operations
//! enforce that through the store's latest registration.

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::store::RegistrationStore;
use crate::types::{NewRegistration, TaskRef, TimeRegistration};

/// Start a new ongoing registration on `task` at `at`.
pub fn punch_in<S: RegistrationStore + ?Sized>(
    store: &S,
    task: TaskRef,
    at: DateTime<Utc>,
) -> Result<TimeRegistration, StoreError> {
    if let Some(latest) = store.get_latest()? {
        if latest.is_ongoing() {
            return Err(StoreError::AlreadyPunchedIn { id: latest.id });
        }
    }
    store.insert(NewRegistration::started(task, at))
}

/// End the ongoing registration at `at`, optionally attaching a comment.
pub fn punch_out<S: RegistrationStore + ?Sized>(
    store: &S,
    at: DateTime<Utc>,
    comment: Option<String>,
) -> Result<TimeRegistration, StoreError> {
    let mut ongoing = match store.get_latest()? {
        Some(latest) if latest.is_ongoing() => latest,
        _ => return Err(StoreError::NotPunchedIn),
    };
    if at < ongoing.start {
        return Err(StoreError::EndBeforeStart {
            start: ongoing.start,
            end: at,
        });
    }
    ongoing.end = Some(at);
    if comment.is_some() {
        ongoing.comment = comment;
    }
    ongoing.updated_at = at;
    store.update(&ongoing)?;
    Ok(ongoing)
}
