//! Paginated registration list.
//!
//! ## `load(force_reload, start_fresh)` decision table
//!
//! The effective reload flag is `force_reload || start_fresh || live count !=
//! observed count`.
//!
//! | reload | start_fresh | behavior                              |
//! |--------|-------------|---------------------------------------|
//! | false  | false       | reuse the cached rows as-is           |
//! | true   | true        | fetch `[0, page_size)`                |
//! | true   | false       | fetch `[0, currently loaded count)`   |
//!
//! After a fetch exactly one sentinel is appended when the store holds more
//! records than were loaded. The next load-more page always starts at the
//! loaded count, so consecutive pages never overlap or leave gaps.

use std::sync::Arc;

use worktime_core::{ListConfig, RegistrationStore};

use crate::diff::{ListView, RefillDiff};
use crate::error::ListError;
use crate::load_more::{LoadMoreOutcome, LoadMoreTask, PageFetch, StaleReason};
use crate::row::{loaded_count, ListRow, PageWindow};

/// Owner of the rendered registration rows.
///
/// Not shared between threads: only [`LoadMoreTask::run`] leaves the owner,
/// and its result comes back through [`apply_load_more`](Self::apply_load_more).
pub struct PaginatedListController {
    store: Arc<dyn RegistrationStore>,
    rows: Vec<ListRow>,
    window: PageWindow,
    /// Bumped on every effective reload; fetches from older generations are stale.
    generation: u64,
    load_more_in_flight: bool,
    last_refill: RefillDiff,
    view: Option<Box<dyn ListView>>,
}

impl PaginatedListController {
    pub fn new(store: Arc<dyn RegistrationStore>, config: &ListConfig) -> Self {
        Self {
            store,
            rows: Vec::new(),
            window: PageWindow::new(config.page_size.max(1)),
            generation: 0,
            load_more_in_flight: false,
            last_refill: RefillDiff::default(),
            view: None,
        }
    }

    /// Attach a view that is refilled after every change.
    pub fn with_view(mut self, view: Box<dyn ListView>) -> Self {
        self.view = Some(view);
        self
    }

    pub fn rows(&self) -> &[ListRow] {
        &self.rows
    }

    pub fn window(&self) -> PageWindow {
        self.window
    }

    pub fn last_refill(&self) -> RefillDiff {
        self.last_refill
    }

    pub fn has_sentinel(&self) -> bool {
        self.rows.last().is_some_and(ListRow::is_sentinel)
    }

    pub fn is_load_more_in_flight(&self) -> bool {
        self.load_more_in_flight
    }

    /// Rendered rows minus the trailing sentinel.
    pub fn effective_loaded_count(&self) -> usize {
        loaded_count(&self.rows)
    }

    /// (Re)load the rows. See the module docs for the decision table.
    ///
    /// On a store error the previous rows stay rendered.
    pub fn load(&mut self, force_reload: bool, start_fresh: bool) -> Result<&[ListRow], ListError> {
        let live_count = self.store.count()?;
        let reload = force_reload || start_fresh || live_count != self.window.observed_count;
        if !reload {
            tracing::debug!(rows = self.rows.len(), "reusing cached registrations");
            self.refill(self.rows.clone());
            return Ok(&self.rows);
        }

        let loaded = self.effective_loaded_count();
        let limit = if start_fresh || loaded == 0 {
            self.window.page_size
        } else {
            loaded
        };
        let records = self.store.find_all(0, limit)?;

        // Any fetch handed out before this point is discarded by generation,
        // so an abandoned one no longer blocks the next load-more.
        self.generation += 1;
        self.load_more_in_flight = false;
        self.window.observed_count = live_count;
        self.window.lower_offset = 0;

        let mut rows: Vec<ListRow> = records.into_iter().map(ListRow::Record).collect();
        if live_count > rows.len() {
            rows.push(ListRow::LoadMore);
        }
        tracing::debug!(
            total = live_count,
            loaded = loaded_count(&rows),
            start_fresh,
            "registrations reloaded"
        );
        self.refill(rows);
        Ok(&self.rows)
    }

    /// Hand out the next page fetch. Only one may be outstanding at a time.
    pub fn begin_load_more(&mut self) -> Result<LoadMoreTask, ListError> {
        if self.load_more_in_flight {
            return Err(ListError::LoadMoreInFlight);
        }
        self.load_more_in_flight = true;
        Ok(LoadMoreTask {
            store: Arc::clone(&self.store),
            generation: self.generation,
            observed_count: self.window.observed_count,
            offset: self.effective_loaded_count(),
            page_size: self.window.page_size,
        })
    }

    /// Apply a finished fetch on the owner and release the in-flight guard.
    ///
    /// Stale fetches, and fetches started before a reload, leave the rows untouched.
    pub fn apply_load_more(&mut self, fetch: PageFetch) -> LoadMoreOutcome {
        self.load_more_in_flight = false;
        let (generation, offset, records) = match fetch {
            PageFetch::Page {
                generation,
                offset,
                records,
            } => (generation, offset, records),
            PageFetch::Stale { reason, .. } => {
                match reason {
                    StaleReason::CountChanged { observed, live } => tracing::warn!(
                        observed,
                        live,
                        "registration count changed while loading more, reload required"
                    ),
                    StaleReason::Store(err) => tracing::warn!(
                        error = %err,
                        "loading extra registrations failed, reload required"
                    ),
                }
                return LoadMoreOutcome::ReloadRequired;
            }
        };
        if generation != self.generation || offset != self.effective_loaded_count() {
            tracing::warn!(
                generation,
                current = self.generation,
                "discarding page fetched for an outdated window"
            );
            return LoadMoreOutcome::ReloadRequired;
        }

        let added = records.len();
        let mut rows = self.rows.clone();
        if rows.last().is_some_and(ListRow::is_sentinel) {
            rows.pop();
        }
        rows.extend(records.into_iter().map(ListRow::Record));
        if self.window.observed_count > rows.len() {
            rows.push(ListRow::LoadMore);
        }
        self.window.lower_offset = offset;
        tracing::debug!(
            added,
            loaded = loaded_count(&rows),
            total = self.window.observed_count,
            "extra registrations applied"
        );
        self.refill(rows);
        LoadMoreOutcome::Appended { added }
    }

    /// Fetch the next page on the blocking pool and apply it.
    ///
    /// Dropping the future before it resolves releases the in-flight guard;
    /// the abandoned fetch result is never applied.
    pub async fn load_more(&mut self) -> Result<LoadMoreOutcome, ListError> {
        let task = self.begin_load_more()?;
        let pending = InFlight(self);
        match tokio::task::spawn_blocking(move || task.run()).await {
            Ok(fetch) => Ok(pending.0.apply_load_more(fetch)),
            Err(err) => Err(ListError::Join(err.to_string())),
        }
    }

    /// [`load_more`](Self::load_more), falling back to `load(true, false)`
    /// when the window went stale.
    pub async fn load_more_or_reload(&mut self) -> Result<LoadMoreOutcome, ListError> {
        let outcome = self.load_more().await?;
        if outcome == LoadMoreOutcome::ReloadRequired {
            self.load(true, false)?;
        }
        Ok(outcome)
    }

    /// Back in the foreground: registrations created meanwhile are announced
    /// as placeholder rows at the head, then the grown window is reloaded.
    pub fn reconcile_on_resume(&mut self, live_count: usize) -> Result<&[ListRow], ListError> {
        let arrived = live_count.saturating_sub(self.window.observed_count);
        if arrived > 0 {
            tracing::debug!(arrived, "registrations arrived while in background");
            self.prepend_placeholders(arrived);
        }
        self.reload_keeping_depth()
    }

    /// A registration was split in two; grow the window by one and reload.
    pub fn note_split(&mut self) -> Result<&[ListRow], ListError> {
        self.prepend_placeholders(1);
        self.reload_keeping_depth()
    }

    /// The dataset changed out-of-band (ghost records after a sync): start over.
    pub fn invalidate(&mut self) -> Result<&[ListRow], ListError> {
        tracing::info!("registration list invalidated, reloading from the first page");
        self.load(true, true)
    }

    fn prepend_placeholders(&mut self, count: usize) {
        let mut rows = Vec::with_capacity(self.rows.len() + count);
        rows.extend(std::iter::repeat(ListRow::Placeholder).take(count));
        rows.extend(self.rows.iter().cloned());
        self.refill(rows);
    }

    /// `load(true, false)`, dropping any placeholders again if the store fails.
    fn reload_keeping_depth(&mut self) -> Result<&[ListRow], ListError> {
        if let Err(err) = self.load(true, false).map(|_| ()) {
            let rows: Vec<ListRow> = self
                .rows
                .iter()
                .filter(|row| **row != ListRow::Placeholder)
                .cloned()
                .collect();
            self.refill(rows);
            return Err(err);
        }
        Ok(&self.rows)
    }

    fn refill(&mut self, rows: Vec<ListRow>) {
        self.last_refill = RefillDiff::between(&self.rows, &rows);
        self.rows = rows;
        if let Some(view) = self.view.as_mut() {
            view.refill(&self.rows, &self.last_refill);
        }
    }
}

/// Releases the load-more guard when [`PaginatedListController::load_more`]
/// finishes or is dropped mid-fetch.
struct InFlight<'a>(&'a mut PaginatedListController);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.load_more_in_flight = false;
    }
}
