//! The account that owns synchronization runs.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;
use worktime_core::RegistrationStore;

use crate::engine;
use crate::error::SyncError;
use crate::session::{SyncHistory, SyncReport, SyncSession, SyncStatus, CANCELLED_REASON};

/// Read-only query surface the sync lock observes.
pub trait SyncAccountService: Send + Sync {
    fn is_sync_busy(&self) -> bool;

    fn last_sync_history(&self) -> Option<SyncHistory>;
}

/// Drives runs of [`engine::reconcile`] through a single [`SyncSession`].
#[derive(Debug)]
pub struct SyncAccount {
    session: Mutex<SyncSession>,
    status: watch::Sender<SyncStatus>,
}

impl Default for SyncAccount {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncAccount {
    pub fn new() -> Self {
        let session = SyncSession::new();
        let (status, _) = watch::channel(session.status());
        Self {
            session: Mutex::new(session),
            status,
        }
    }

    /// Session status as published when a run begins and when it returns.
    ///
    /// Every call to [`synchronize`](Self::synchronize) publishes at least
    /// once, so awaiting a change never outlives the run.
    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Run one synchronization to completion on the calling thread.
    ///
    /// Fails with [`SyncError::SyncBusy`] while another run is in progress.
    /// Whatever the result, the session ends terminal and its history tells
    /// observers how it went.
    pub fn synchronize(
        &self,
        local: &dyn RegistrationStore,
        remote: &dyn RegistrationStore,
    ) -> Result<SyncReport, SyncError> {
        let result = self.run(local, remote);
        self.publish_status();
        result
    }

    fn run(
        &self,
        local: &dyn RegistrationStore,
        remote: &dyn RegistrationStore,
    ) -> Result<SyncReport, SyncError> {
        self.lock()?.begin()?;
        self.publish_status();

        let result = engine::reconcile(&self.session, local, remote);

        let mut session = self.lock()?;
        match &result {
            Ok(report) => session.succeed(report.clone())?,
            Err(SyncError::Cancelled) => session.fail(CANCELLED_REASON)?,
            Err(err) => session.fail(err.to_string())?,
        }
        result
    }

    fn publish_status(&self) {
        let status = self.lock().map_or(SyncStatus::Failed, |session| session.status());
        self.status.send_replace(status);
    }

    /// Ask the running synchronization to stop at its next step.
    pub fn cancel(&self) {
        if let Ok(mut session) = self.lock() {
            tracing::info!("sync cancellation requested");
            session.request_cancel();
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SyncSession>, SyncError> {
        self.session.lock().map_err(|_| SyncError::Poisoned)
    }
}

impl SyncAccountService for SyncAccount {
    fn is_sync_busy(&self) -> bool {
        self.lock().is_ok_and(|session| session.is_busy())
    }

    fn last_sync_history(&self) -> Option<SyncHistory> {
        self.lock().ok()?.history().cloned()
    }
}
