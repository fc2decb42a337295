//! Reconciliation of the local store with the remote one.
//!
//! Identity: a remote registration is known locally when some local record
//! carries its id as `remote_id`. Conflicts are settled by `updated_at`, the
//! newer side wins; equal content is never rewritten.
//!
//! Local deletions of synced records are not propagated: the remote copy is
//! pulled back on the next run.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use worktime_core::{NewRegistration, RegistrationId, RegistrationStore, TimeRegistration};

use crate::error::SyncError;
use crate::session::{SyncAction, SyncReport, SyncSession};

/// Run one reconciliation inside an already begun `session`.
///
/// The cancel flag is checked before every step; a cancelled run returns
/// [`SyncError::Cancelled`] without touching either store any further.
pub fn reconcile(
    session: &Mutex<SyncSession>,
    local: &dyn RegistrationStore,
    remote: &dyn RegistrationStore,
) -> Result<SyncReport, SyncError> {
    checkpoint(session, None)?;
    check_device(local)?;

    checkpoint(session, Some(SyncAction::PrepareData))?;
    let local_records = snapshot(local)?;
    let remote_records = snapshot(remote)?;
    tracing::debug!(
        local = local_records.len(),
        remote = remote_records.len(),
        "sync snapshots taken"
    );

    let mut report = SyncReport::default();

    checkpoint(session, Some(SyncAction::SyncServer))?;
    let remote_by_id: HashMap<RegistrationId, &TimeRegistration> =
        remote_records.iter().map(|r| (r.id, r)).collect();
    let mut known_remote: HashSet<RegistrationId> = HashSet::new();
    let mut linked: Vec<(TimeRegistration, RegistrationId)> = Vec::new();
    let mut ghosts: Vec<&TimeRegistration> = Vec::new();

    for record in &local_records {
        match record.remote_id {
            None => {
                let created = remote.insert(NewRegistration {
                    remote_id: None,
                    ..record.to_new()
                })?;
                let mut stamped = record.clone();
                stamped.remote_id = Some(created.id);
                if let Err(err) = local.update(&stamped) {
                    withdraw_push(remote, created.id);
                    return Err(err.into());
                }
                known_remote.insert(created.id);
                report.pushed += 1;
            }
            Some(remote_id) => match remote_by_id.get(&remote_id) {
                Some(remote_record) => {
                    known_remote.insert(remote_id);
                    if record.updated_at > remote_record.updated_at
                        && !record.same_content(remote_record)
                    {
                        let mut updated = record.clone();
                        updated.id = remote_id;
                        updated.remote_id = None;
                        remote.update(&updated)?;
                        report.updated_remote += 1;
                    } else {
                        linked.push((record.clone(), remote_id));
                    }
                }
                None => ghosts.push(record),
            },
        }
    }

    checkpoint(session, Some(SyncAction::SyncLocal))?;
    // At most one ongoing registration may exist locally after every write.
    let mut local_ongoing = local_records
        .iter()
        .any(|r| r.is_ongoing() && !ghosts.iter().any(|g| g.id == r.id));
    for (record, remote_id) in linked {
        let Some(remote_record) = remote_by_id.get(&remote_id) else {
            continue;
        };
        if remote_record.updated_at > record.updated_at && !record.same_content(remote_record) {
            let reopens = remote_record.is_ongoing() && !record.is_ongoing();
            if reopens && local_ongoing {
                tracing::warn!(
                    id = %record.id,
                    remote_id = %remote_id,
                    "not applying ongoing remote copy, one is already ongoing locally"
                );
                continue;
            }
            let mut updated = (*remote_record).clone();
            updated.id = record.id;
            updated.remote_id = Some(remote_id);
            local.update(&updated)?;
            if reopens {
                local_ongoing = true;
            } else if record.is_ongoing() && !remote_record.is_ongoing() {
                local_ongoing = false;
            }
            report.updated_local += 1;
        }
    }

    for remote_record in &remote_records {
        if known_remote.contains(&remote_record.id) {
            continue;
        }
        if remote_record.is_ongoing() {
            if local_ongoing {
                tracing::warn!(
                    remote_id = %remote_record.id,
                    "not pulling ongoing remote registration, one is already ongoing locally"
                );
                continue;
            }
            local_ongoing = true;
        }
        local.insert(NewRegistration {
            remote_id: Some(remote_record.id),
            ..remote_record.to_new()
        })?;
        report.pulled += 1;
    }

    for ghost in ghosts {
        local.delete(ghost.id)?;
        tracing::info!(
            id = %ghost.id,
            remote_id = ?ghost.remote_id,
            "removed ghost registration"
        );
        report.ghosts.push(ghost.id);
    }

    Ok(report)
}

/// Best-effort removal of a remote copy whose local record could not be
/// stamped; otherwise the next run would push it a second time.
fn withdraw_push(remote: &dyn RegistrationStore, remote_id: RegistrationId) {
    match remote.delete(remote_id) {
        Ok(()) => tracing::warn!(
            remote_id = %remote_id,
            "local stamp failed, pushed registration withdrawn"
        ),
        Err(err) => tracing::error!(
            remote_id = %remote_id,
            error = %err,
            "local stamp failed and the pushed registration could not be withdrawn"
        ),
    }
}

/// Bail out if cancelled, otherwise move the session to `action`.
fn checkpoint(session: &Mutex<SyncSession>, action: Option<SyncAction>) -> Result<(), SyncError> {
    let mut session = session.lock().map_err(|_| SyncError::Poisoned)?;
    if session.is_cancel_requested() {
        return Err(SyncError::Cancelled);
    }
    match action {
        Some(action) => session.advance(action),
        None => Ok(()),
    }
}

fn check_device(local: &dyn RegistrationStore) -> Result<(), SyncError> {
    let ongoing = snapshot(local)?.iter().filter(|r| r.is_ongoing()).count();
    if ongoing > 1 {
        return Err(SyncError::MultipleOngoing { count: ongoing });
    }
    Ok(())
}

fn snapshot(store: &dyn RegistrationStore) -> Result<Vec<TimeRegistration>, SyncError> {
    let count = store.count()?;
    Ok(store.find_all(0, count)?)
}
