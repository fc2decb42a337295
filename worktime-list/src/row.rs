//! Rendered list rows and the page window bookkeeping.

use worktime_core::{RegistrationId, TimeRegistration};

/// One element of the rendered registration list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListRow {
    /// A persisted registration.
    Record(TimeRegistration),
    /// Optimistic head row standing in for a registration that arrived while
    /// the list was in the background. Has no identifier.
    Placeholder,
    /// The "load more" sentinel. Only ever the last row.
    LoadMore,
}

impl ListRow {
    /// Identifier used for sentinel detection. Placeholders have none.
    pub fn id(&self) -> Option<RegistrationId> {
        match self {
            ListRow::Record(registration) => Some(registration.id),
            ListRow::Placeholder => None,
            ListRow::LoadMore => Some(RegistrationId::SENTINEL),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.id() == Some(RegistrationId::SENTINEL)
    }

    pub fn as_record(&self) -> Option<&TimeRegistration> {
        match self {
            ListRow::Record(registration) => Some(registration),
            _ => None,
        }
    }
}

/// Where the loaded window sits in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Offset of the most recently fetched page.
    pub lower_offset: usize,
    pub page_size: usize,
    /// Store count seen by the last effective reload.
    pub observed_count: usize,
}

impl PageWindow {
    pub fn new(page_size: usize) -> Self {
        Self {
            lower_offset: 0,
            page_size,
            observed_count: 0,
        }
    }
}

/// Rows minus the trailing sentinel, if any.
pub(crate) fn loaded_count(rows: &[ListRow]) -> usize {
    match rows.last() {
        Some(last) if last.is_sentinel() => rows.len() - 1,
        _ => rows.len(),
    }
}
