//! Sync lock: observe a running synchronization until it finishes.
//!
//! ```text
//! Observing ──busy, new action──▶ Progress ──▶ Observing
//!     │
//!     ├──not busy──▶ Done       (publishes Completed, returns LockExit::Completed)
//!     └──cancel────▶ Cancelled  (publishes nothing, returns LockExit::Cancelled)
//! ```
//!
//! The account is queried on the blocking pool, raced against cancellation,
//! so a slow account never delays stopping the loop by more than one tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use worktime_core::SyncLockConfig;

use crate::account::SyncAccountService;
use crate::error::SyncError;
use crate::session::{SyncAction, SyncHistory, SyncOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockEvent {
    Progress(SyncAction),
    Completed(SyncOutcome),
}

/// How a poll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockExit {
    Completed(SyncOutcome),
    Cancelled,
}

/// Single-flight observer of one account's synchronization.
pub struct SyncLockCoordinator {
    account: Arc<dyn SyncAccountService>,
    config: SyncLockConfig,
    observing: Arc<AtomicBool>,
}

impl SyncLockCoordinator {
    pub fn new(account: Arc<dyn SyncAccountService>, config: SyncLockConfig) -> Self {
        Self {
            account,
            config,
            observing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_observing(&self) -> bool {
        self.observing.load(Ordering::Acquire)
    }

    /// Spawn the poll loop on the current tokio runtime.
    ///
    /// Rejected with [`SyncError::AlreadyObserving`] while a previous loop of
    /// this coordinator is still running.
    pub fn activate(&self) -> Result<SyncLockHandle, SyncError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        if self
            .observing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SyncError::AlreadyObserving);
        }
        let guard = ObservingGuard(Arc::clone(&self.observing));

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let poll = PollLoop {
            account: Arc::clone(&self.account),
            interval: self.config.poll_interval(),
            events: event_tx,
            cancel: cancel_rx,
            last_published: None,
        };
        let task = runtime.spawn(async move {
            let _guard = guard;
            poll.run().await
        });
        tracing::debug!(interval = ?self.config.poll_interval(), "sync lock activated");

        Ok(SyncLockHandle {
            events: event_rx,
            cancel: cancel_tx,
            task,
        })
    }
}

/// Clears the single-flight flag when the loop exits, however it exits.
struct ObservingGuard(Arc<AtomicBool>);

impl Drop for ObservingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Caller's side of an active poll loop. Dropping it cancels the loop.
pub struct SyncLockHandle {
    events: mpsc::UnboundedReceiver<LockEvent>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<Result<LockExit, SyncError>>,
}

impl SyncLockHandle {
    /// Next event in publish order; `None` once the loop has exited and every
    /// event was drained.
    pub async fn next_event(&mut self) -> Option<LockEvent> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Wait for the loop to exit. Does not cancel it.
    pub async fn wait(self) -> Result<LockExit, SyncError> {
        let SyncLockHandle { events, cancel, task } = self;
        drop(events);
        let exit = task.await.map_err(|err| SyncError::Join(err.to_string()))?;
        drop(cancel);
        exit
    }
}

enum Probe {
    Busy(Option<SyncAction>),
    Idle(Option<SyncHistory>),
}

struct PollLoop {
    account: Arc<dyn SyncAccountService>,
    interval: std::time::Duration,
    events: mpsc::UnboundedSender<LockEvent>,
    cancel: watch::Receiver<bool>,
    last_published: Option<SyncAction>,
}

impl PollLoop {
    async fn run(mut self) -> Result<LockExit, SyncError> {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => return Ok(self.cancelled()),
                _ = interval.tick() => {}
            }

            let account = Arc::clone(&self.account);
            let query = tokio::task::spawn_blocking(move || probe(account.as_ref()));
            let state = tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => return Ok(self.cancelled()),
                joined = query => joined.map_err(|err| SyncError::Join(err.to_string()))?,
            };
            if *self.cancel.borrow() {
                return Ok(self.cancelled());
            }

            match state {
                Probe::Busy(Some(action)) => {
                    if self.last_published != Some(action) {
                        tracing::debug!(action = ?action, "sync progress");
                        let _ = self.events.send(LockEvent::Progress(action));
                        self.last_published = Some(action);
                    }
                }
                Probe::Busy(None) => {}
                Probe::Idle(history) => {
                    let outcome = SyncOutcome::classify(history.as_ref());
                    tracing::info!(outcome = ?outcome, "sync lock released");
                    let _ = self.events.send(LockEvent::Completed(outcome));
                    return Ok(LockExit::Completed(outcome));
                }
            }
        }
    }

    fn cancelled(&self) -> LockExit {
        tracing::debug!("sync lock observation cancelled");
        LockExit::Cancelled
    }
}

fn probe(account: &dyn SyncAccountService) -> Probe {
    if account.is_sync_busy() {
        Probe::Busy(account.last_sync_history().map(|history| history.action))
    } else {
        Probe::Idle(account.last_sync_history())
    }
}

/// Resolves once cancellation was requested or the handle is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::session::SyncStatus;

    /// Answers `is_sync_busy` from a script; the last answer repeats.
    struct ScriptedAccount {
        busy: Mutex<VecDeque<bool>>,
        actions: Mutex<VecDeque<SyncAction>>,
        final_status: SyncStatus,
    }

    impl ScriptedAccount {
        fn new(busy: &[bool], actions: &[SyncAction], final_status: SyncStatus) -> Arc<Self> {
            Arc::new(Self {
                busy: Mutex::new(busy.iter().copied().collect()),
                actions: Mutex::new(actions.iter().copied().collect()),
                final_status,
            })
        }

        fn history(&self, status: SyncStatus, action: SyncAction) -> SyncHistory {
            SyncHistory {
                started_at: Utc::now(),
                ended_at: None,
                status,
                action,
                failure_reason: None,
                report: None,
            }
        }
    }

    impl SyncAccountService for ScriptedAccount {
        fn is_sync_busy(&self) -> bool {
            let mut busy = self.busy.lock().unwrap();
            if busy.len() > 1 {
                busy.pop_front().unwrap()
            } else {
                busy.front().copied().unwrap_or(false)
            }
        }

        fn last_sync_history(&self) -> Option<SyncHistory> {
            let mut actions = self.actions.lock().unwrap();
            let action = if actions.len() > 1 {
                actions.pop_front().unwrap()
            } else {
                actions.front().copied().unwrap_or(SyncAction::Done)
            };
            let status = if action == SyncAction::Done {
                self.final_status
            } else {
                SyncStatus::Busy
            };
            Some(self.history(status, action))
        }
    }

    fn coordinator(account: Arc<ScriptedAccount>) -> SyncLockCoordinator {
        SyncLockCoordinator::new(
            account,
            SyncLockConfig::with_poll_interval(Duration::from_millis(500)),
        )
    }

    async fn drain(handle: &mut SyncLockHandle) -> Vec<LockEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn busy_busy_idle_publishes_each_action_then_one_completion() {
        let account = ScriptedAccount::new(
            &[true, true, false],
            &[SyncAction::CheckDevice, SyncAction::SyncServer, SyncAction::Done],
            SyncStatus::Succeeded,
        );
        let mut handle = coordinator(account).activate().expect("activate");

        let events = drain(&mut handle).await;
        assert_eq!(
            events,
            vec![
                LockEvent::Progress(SyncAction::CheckDevice),
                LockEvent::Progress(SyncAction::SyncServer),
                LockEvent::Completed(SyncOutcome::Success),
            ]
        );
        assert_eq!(
            handle.wait().await.unwrap(),
            LockExit::Completed(SyncOutcome::Success)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_action_is_published_once() {
        let account = ScriptedAccount::new(
            &[true, true, true, true, false],
            &[
                SyncAction::PrepareData,
                SyncAction::PrepareData,
                SyncAction::SyncLocal,
                SyncAction::SyncLocal,
                SyncAction::Done,
            ],
            SyncStatus::Failed,
        );
        let mut handle = coordinator(account).activate().unwrap();

        let events = drain(&mut handle).await;
        assert_eq!(
            events,
            vec![
                LockEvent::Progress(SyncAction::PrepareData),
                LockEvent::Progress(SyncAction::SyncLocal),
                LockEvent::Completed(SyncOutcome::Error),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_first_busy_tick_never_completes() {
        let account = ScriptedAccount::new(&[true], &[SyncAction::SyncServer], SyncStatus::Succeeded);
        let mut handle = coordinator(account).activate().unwrap();

        assert_eq!(
            handle.next_event().await,
            Some(LockEvent::Progress(SyncAction::SyncServer))
        );
        handle.cancel();

        let rest = drain(&mut handle).await;
        assert!(
            rest.iter().all(|e| !matches!(e, LockEvent::Completed(_))),
            "no completion after cancel, got {rest:?}"
        );
        assert_eq!(handle.wait().await.unwrap(), LockExit::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn second_activation_is_rejected_while_observing() {
        let account = ScriptedAccount::new(&[true], &[SyncAction::CheckDevice], SyncStatus::Succeeded);
        let coordinator = coordinator(account);

        let handle = coordinator.activate().unwrap();
        assert!(coordinator.is_observing());
        assert!(matches!(
            coordinator.activate(),
            Err(SyncError::AlreadyObserving)
        ));

        handle.cancel();
        assert_eq!(handle.wait().await.unwrap(), LockExit::Cancelled);
        assert!(!coordinator.is_observing());
        coordinator.activate().expect("reactivate after exit").cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_loop() {
        let account = ScriptedAccount::new(&[true], &[SyncAction::CheckDevice], SyncStatus::Succeeded);
        let coordinator = coordinator(account);
        drop(coordinator.activate().unwrap());

        for _ in 0..10 {
            if !coordinator.is_observing() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert!(!coordinator.is_observing());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_account_completes_on_first_tick() {
        let account = ScriptedAccount::new(&[false], &[SyncAction::Done], SyncStatus::Succeeded);
        let mut handle = coordinator(account).activate().unwrap();
        assert_eq!(
            handle.next_event().await,
            Some(LockEvent::Completed(SyncOutcome::Success))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_poll_interval_still_observes() {
        let account = ScriptedAccount::new(
            &[true, false],
            &[SyncAction::PrepareData, SyncAction::Done],
            SyncStatus::Succeeded,
        );
        let coordinator = SyncLockCoordinator::new(account, SyncLockConfig { poll_interval_ms: 0 });
        let mut handle = coordinator.activate().expect("activate");

        assert_eq!(
            drain(&mut handle).await,
            vec![
                LockEvent::Progress(SyncAction::PrepareData),
                LockEvent::Completed(SyncOutcome::Success),
            ]
        );
        assert_eq!(
            handle.wait().await.unwrap(),
            LockExit::Completed(SyncOutcome::Success)
        );
    }

    #[test]
    fn activation_outside_a_runtime_fails() {
        let account = ScriptedAccount::new(&[false], &[], SyncStatus::Idle);
        assert!(matches!(
            coordinator(account).activate(),
            Err(SyncError::NoRuntime)
        ));
    }
}
