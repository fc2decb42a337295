//! Off-thread page fetch for "load more".
//!
//! The controller hands out a [`LoadMoreTask`] snapshot, the task runs on a
//! worker (it only touches the store), and the resulting [`PageFetch`] is
//! applied back on the controller's owner. A fetch is only usable if the store
//! count did not move while it ran; anything else is [`PageFetch::Stale`].

use std::sync::Arc;

use worktime_core::{RegistrationStore, StoreError, TimeRegistration};

/// Result of applying a page fetch to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMoreOutcome {
    /// `added` records were appended below the previously loaded ones.
    Appended { added: usize },
    /// The window went stale; the rendered rows were left untouched and the
    /// caller must reload with `load(true, false)`.
    ReloadRequired,
}

/// Why a fetch could not be applied.
#[derive(Debug)]
pub enum StaleReason {
    CountChanged { observed: usize, live: usize },
    Store(StoreError),
}

/// What a [`LoadMoreTask`] brings back to the owner.
#[derive(Debug)]
pub enum PageFetch {
    Page {
        generation: u64,
        offset: usize,
        records: Vec<TimeRegistration>,
    },
    Stale {
        generation: u64,
        reason: StaleReason,
    },
}

/// Snapshot of the window needed to fetch the next page.
pub struct LoadMoreTask {
    pub(crate) store: Arc<dyn RegistrationStore>,
    pub(crate) generation: u64,
    pub(crate) observed_count: usize,
    pub(crate) offset: usize,
    pub(crate) page_size: usize,
}

impl LoadMoreTask {
    /// Offset the next page starts at.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Fetch the page. Blocking; meant for a worker thread.
    ///
    /// The live count is checked before and after the fetch so a writer that
    /// slips in while the page is read still invalidates it.
    pub fn run(self) -> PageFetch {
        let generation = self.generation;
        match self.fetch() {
            Ok(records) => PageFetch::Page {
                generation,
                offset: self.offset,
                records,
            },
            Err(reason) => PageFetch::Stale { generation, reason },
        }
    }

    fn fetch(&self) -> Result<Vec<TimeRegistration>, StaleReason> {
        self.check_count()?;
        let records = self
            .store
            .find_all(self.offset, self.page_size)
            .map_err(StaleReason::Store)?;
        self.check_count()?;
        tracing::debug!(
            offset = self.offset,
            fetched = records.len(),
            "fetched extra registrations"
        );
        Ok(records)
    }

    fn check_count(&self) -> Result<(), StaleReason> {
        let live = self.store.count().map_err(StaleReason::Store)?;
        if live != self.observed_count {
            return Err(StaleReason::CountChanged {
                observed: self.observed_count,
                live,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for LoadMoreTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadMoreTask")
            .field("generation", &self.generation)
            .field("observed_count", &self.observed_count)
            .field("offset", &self.offset)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}
