//! One synchronization run as a state machine.
//!
//! ```text
//! Idle ──begin──▶ Busy(CheckDevice) ──advance──▶ Busy(PrepareData) ──▶ … ──succeed──▶ Succeeded(Done)
//!                   │                                                   │
//!                   └──────────────────────── fail / cancel ────────────┴──▶ Failed
//! ```
//!
//! A terminal session can be begun again; a busy one cannot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use worktime_core::RegistrationId;

use crate::error::SyncError;

/// Failure reason recorded for a cancelled run.
pub const CANCELLED_REASON: &str = "cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Busy,
    Succeeded,
    Failed,
}

/// Progress tokens of a run, in the order they occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    CheckDevice,
    PrepareData,
    SyncServer,
    SyncLocal,
    Done,
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SyncAction::CheckDevice => "checking device",
            SyncAction::PrepareData => "preparing data",
            SyncAction::SyncServer => "synchronizing server",
            SyncAction::SyncLocal => "synchronizing local data",
            SyncAction::Done => "done",
        };
        f.write_str(label)
    }
}

/// What a finished run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Local registrations created remotely.
    pub pushed: usize,
    /// Remote registrations created locally.
    pub pulled: usize,
    pub updated_remote: usize,
    pub updated_local: usize,
    /// Local ids removed because their remote counterpart disappeared.
    pub ghosts: Vec<RegistrationId>,
}

impl SyncReport {
    /// Whether the local dataset changed underneath any open list.
    pub fn dataset_changed(&self) -> bool {
        self.pulled > 0 || self.updated_local > 0 || !self.ghosts.is_empty()
    }
}

/// The record of the last (or current) run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncHistory {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SyncStatus,
    pub action: SyncAction,
    pub failure_reason: Option<String>,
    pub report: Option<SyncReport>,
}

/// Terminal classification handed to whoever waited on a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Success,
    Error,
}

impl SyncOutcome {
    /// `Failed` is an error; anything else, including no history at all, is not.
    pub fn classify(history: Option<&SyncHistory>) -> Self {
        match history.map(|h| h.status) {
            Some(SyncStatus::Failed) => SyncOutcome::Error,
            _ => SyncOutcome::Success,
        }
    }
}

#[derive(Debug, Default)]
pub struct SyncSession {
    history: Option<SyncHistory>,
    cancel_requested: bool,
}

impl SyncSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SyncStatus {
        self.history
            .as_ref()
            .map_or(SyncStatus::Idle, |history| history.status)
    }

    pub fn is_busy(&self) -> bool {
        self.status() == SyncStatus::Busy
    }

    pub fn history(&self) -> Option<&SyncHistory> {
        self.history.as_ref()
    }

    pub fn outcome(&self) -> SyncOutcome {
        SyncOutcome::classify(self.history.as_ref())
    }

    /// Start a new run at `CheckDevice`.
    pub fn begin(&mut self) -> Result<(), SyncError> {
        if self.is_busy() {
            return Err(SyncError::SyncBusy);
        }
        self.cancel_requested = false;
        self.history = Some(SyncHistory {
            started_at: Utc::now(),
            ended_at: None,
            status: SyncStatus::Busy,
            action: SyncAction::CheckDevice,
            failure_reason: None,
            report: None,
        });
        tracing::info!("sync session started");
        Ok(())
    }

    /// Move a busy run forward. Actions never go backwards and `Done` is only
    /// reached through [`succeed`](Self::succeed).
    pub fn advance(&mut self, action: SyncAction) -> Result<(), SyncError> {
        let status = self.status();
        let history = match self.history.as_mut() {
            Some(history) if status == SyncStatus::Busy => history,
            _ => return Err(SyncError::InvalidTransition { status, action }),
        };
        if action <= history.action || action == SyncAction::Done {
            return Err(SyncError::InvalidTransition { status, action });
        }
        history.action = action;
        tracing::info!(action = ?action, "sync session progressed");
        Ok(())
    }

    pub fn succeed(&mut self, report: SyncReport) -> Result<(), SyncError> {
        let history = self.busy_history(SyncAction::Done)?;
        history.status = SyncStatus::Succeeded;
        history.action = SyncAction::Done;
        history.ended_at = Some(Utc::now());
        tracing::info!(
            pushed = report.pushed,
            pulled = report.pulled,
            ghosts = report.ghosts.len(),
            "sync session succeeded"
        );
        history.report = Some(report);
        Ok(())
    }

    /// End the run as `Failed`. The action stays where the run stopped.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), SyncError> {
        let action = self.history.as_ref().map_or(SyncAction::CheckDevice, |h| h.action);
        let history = self.busy_history(action)?;
        let reason = reason.into();
        history.status = SyncStatus::Failed;
        history.ended_at = Some(Utc::now());
        tracing::warn!(action = ?history.action, reason = %reason, "sync session failed");
        history.failure_reason = Some(reason);
        Ok(())
    }

    /// Ask a busy run to stop at its next step boundary. No-op otherwise.
    pub fn request_cancel(&mut self) {
        if self.is_busy() {
            self.cancel_requested = true;
        }
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    fn busy_history(&mut self, action: SyncAction) -> Result<&mut SyncHistory, SyncError> {
        let status = self.status();
        match self.history.as_mut() {
            Some(history) if status == SyncStatus::Busy => Ok(history),
            _ => Err(SyncError::InvalidTransition { status, action }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_idle_and_successful() {
        let session = SyncSession::new();
        assert_eq!(session.status(), SyncStatus::Idle);
        assert!(session.history().is_none());
        assert_eq!(session.outcome(), SyncOutcome::Success);
    }

    #[test]
    fn full_run_ends_succeeded_at_done() {
        let mut session = SyncSession::new();
        session.begin().unwrap();
        for action in [
            SyncAction::PrepareData,
            SyncAction::SyncServer,
            SyncAction::SyncLocal,
        ] {
            session.advance(action).unwrap();
            assert_eq!(session.history().unwrap().action, action);
        }
        session.succeed(SyncReport::default()).unwrap();

        let history = session.history().unwrap();
        assert_eq!(history.status, SyncStatus::Succeeded);
        assert_eq!(history.action, SyncAction::Done);
        assert!(history.ended_at.is_some());
        assert_eq!(session.outcome(), SyncOutcome::Success);
    }

    #[test]
    fn begin_while_busy_is_rejected() {
        let mut session = SyncSession::new();
        session.begin().unwrap();
        assert!(matches!(session.begin(), Err(SyncError::SyncBusy)));
    }

    #[test]
    fn actions_are_monotonic() {
        let mut session = SyncSession::new();
        session.begin().unwrap();
        session.advance(SyncAction::SyncServer).unwrap();
        assert!(matches!(
            session.advance(SyncAction::PrepareData),
            Err(SyncError::InvalidTransition { .. })
        ));
        assert!(matches!(
            session.advance(SyncAction::SyncServer),
            Err(SyncError::InvalidTransition { .. })
        ));
        assert!(matches!(
            session.advance(SyncAction::Done),
            Err(SyncError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn idle_session_cannot_advance_or_finish() {
        let mut session = SyncSession::new();
        assert!(session.advance(SyncAction::PrepareData).is_err());
        assert!(session.succeed(SyncReport::default()).is_err());
        assert!(session.fail("nope").is_err());
    }

    #[test]
    fn failure_keeps_action_and_classifies_as_error() {
        let mut session = SyncSession::new();
        session.begin().unwrap();
        session.advance(SyncAction::PrepareData).unwrap();
        session.fail("remote unreachable").unwrap();

        let history = session.history().unwrap();
        assert_eq!(history.status, SyncStatus::Failed);
        assert_eq!(history.action, SyncAction::PrepareData);
        assert_eq!(history.failure_reason.as_deref(), Some("remote unreachable"));
        assert_eq!(session.outcome(), SyncOutcome::Error);
    }

    #[test]
    fn cancel_only_sticks_while_busy_and_resets_on_begin() {
        let mut session = SyncSession::new();
        session.request_cancel();
        assert!(!session.is_cancel_requested());

        session.begin().unwrap();
        session.request_cancel();
        assert!(session.is_cancel_requested());
        session.fail(CANCELLED_REASON).unwrap();

        session.begin().unwrap();
        assert!(!session.is_cancel_requested());
    }

    #[test]
    fn report_flags_dataset_changes() {
        assert!(!SyncReport::default().dataset_changed());
        let pushed_only = SyncReport {
            pushed: 3,
            updated_remote: 1,
            ..SyncReport::default()
        };
        assert!(!pushed_only.dataset_changed());
        let ghost = SyncReport {
            ghosts: vec![RegistrationId(4)],
            ..SyncReport::default()
        };
        assert!(ghost.dataset_changed());
    }
}
