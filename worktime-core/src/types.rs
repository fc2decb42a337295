//! Domain types for time registrations.
//!
//! All timestamps are `DateTime<Utc>`; formatting to local time is a
//! presentation concern of the caller.
//! All types are serializable/deserializable via serde + serde_yaml.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed identifier for a time registration.
///
/// Store-assigned identifiers are strictly positive. [`RegistrationId::SENTINEL`]
/// is reserved for the "load more" row of a paginated list and never names a
/// persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationId(pub i64);

impl RegistrationId {
    /// Reserved identifier of the "load more" sentinel row.
    pub const SENTINEL: RegistrationId = RegistrationId(-1);

    /// `true` for identifiers a store may have assigned.
    pub fn is_persistable(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for RegistrationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// The project/task pair a registration is booked on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskRef {
    pub project: String,
    pub task: String,
}

impl TaskRef {
    pub fn new(project: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            task: task.into(),
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.task)
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A persisted time registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRegistration {
    pub id: RegistrationId,
    pub start: DateTime<Utc>,
    /// `None` while the registration is ongoing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub task: TaskRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Identifier assigned by the remote store on the last successful sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RegistrationId>,
    pub updated_at: DateTime<Utc>,
}

impl TimeRegistration {
    pub fn is_ongoing(&self) -> bool {
        self.end.is_none()
    }

    /// Elapsed time of a finished registration; `None` while ongoing.
    pub fn duration(&self) -> Option<Duration> {
        self.end.map(|end| end - self.start)
    }

    /// Copy of this registration's payload, ready to be inserted in another store.
    pub fn to_new(&self) -> NewRegistration {
        NewRegistration {
            start: self.start,
            end: self.end,
            task: self.task.clone(),
            comment: self.comment.clone(),
            remote_id: self.remote_id,
            updated_at: self.updated_at,
        }
    }

    /// `true` when every user-visible field matches `other` (ids and sync
    /// bookkeeping ignored).
    pub fn same_content(&self, other: &TimeRegistration) -> bool {
        self.start == other.start
            && self.end == other.end
            && self.task == other.task
            && self.comment == other.comment
    }
}

/// Payload of a registration that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRegistration {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub task: TaskRef,
    pub comment: Option<String>,
    pub remote_id: Option<RegistrationId>,
    pub updated_at: DateTime<Utc>,
}

impl NewRegistration {
    /// An ongoing registration started at `at`.
    pub fn started(task: TaskRef, at: DateTime<Utc>) -> Self {
        Self {
            start: at,
            end: None,
            task,
            comment: None,
            remote_id: None,
            updated_at: at,
        }
    }

    /// A finished registration spanning `start..end`.
    pub fn finished(task: TaskRef, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(end),
            task,
            comment: None,
            remote_id: None,
            updated_at: end,
        }
    }

    pub fn into_registration(self, id: RegistrationId) -> TimeRegistration {
        TimeRegistration {
            id,
            start: self.start,
            end: self.end,
            task: self.task,
            comment: self.comment,
            remote_id: self.remote_id,
            updated_at: self.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
