//! Reconciliation of remote rows with local state.
//!
//! A notification only says that something changed for the user, so every
//! notification triggers a read followed by [`merge_rows`]. Per row:
//!
//! - tombstoned locally: ignored until the remote stops returning it
//! - pending local change: fields the change does not hold are adopted at
//!   once; the row is kept and replayed with last-writer-wins once the local
//!   change resolves
//! - otherwise: last-writer-wins on `updated_at`
//!
//! Rows that would take the Big Three past its limit keep the local
//! `important` value (false for unseen rows) and are reported as conflicts.

use crate::api::{RemoteStore, Subscription};
use crate::libs::error::{ConflictError, NetworkError, TaskError};
use crate::libs::event::StoreEvent;
use crate::libs::section::BIG_THREE_LIMIT;
use crate::libs::state::StoreState;
use crate::libs::task::{Field, Task, TaskId};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Whether a batch of rows is the user's whole collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeScope {
    /// Local tasks missing from the rows were deleted elsewhere.
    Full,
    /// Rows are a subset; absence means nothing.
    Incremental,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub inserted: Vec<TaskId>,
    pub updated: Vec<TaskId>,
    pub removed: Vec<TaskId>,
    /// Pending tasks whose remote row was held back.
    pub deferred: Vec<TaskId>,
    pub conflicts: Vec<ConflictError>,
}

impl MergeReport {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.removed.is_empty() && self.deferred.is_empty() && self.conflicts.is_empty()
    }
}

/// Merges remote rows into local state.
pub fn merge_rows(state: &mut StoreState, rows: Vec<Task>, scope: MergeScope) -> MergeReport {
    let mut report = MergeReport::default();
    let seen: HashSet<TaskId> = rows.iter().map(|r| r.id.clone()).collect();

    // Rows that free Big Three slots go first, so a swap inside one read fits.
    let (gaining, rest): (Vec<Task>, Vec<Task>) = rows.into_iter().partition(Task::is_active_important);
    for row in rest.into_iter().chain(gaining) {
        if state.tombstones.contains(&row.id) {
            continue;
        }
        if state.is_pending(&row.id) {
            merge_pending(state, row, &mut report);
        } else {
            merge_settled(state, row, &mut report);
        }
    }

    if scope == MergeScope::Full {
        let gone: Vec<TaskId> = state.board.ids().filter(|id| !seen.contains(*id) && !state.is_pending(id)).cloned().collect();
        for id in gone {
            state.board.remove(&id);
            state.forget(&id);
            report.removed.push(id);
        }
        state.tombstones.retain(|id| seen.contains(id));
    }

    report
}

fn merge_pending(state: &mut StoreState, row: Task, report: &mut MergeReport) {
    let Some(local) = state.board.get(&row.id).cloned() else {
        return;
    };
    let touched = state.touched_fields(&row.id);
    let base = state.base(&row.id).cloned();

    let mut merged = local.clone();
    let mut contested = Vec::new();
    for field in local.differing_fields(&row).iter() {
        if !touched.contains(field) {
            merged.copy_field(&row, field);
            continue;
        }
        let moved_remotely = base.as_ref().map_or(true, |b| b.differing_fields(&row).contains(field));
        if moved_remotely {
            contested.push(field);
        }
    }
    clamp_capacity(state, &local, &mut merged, report);

    if merged != local {
        merged.updated_at = local.updated_at;
        state.board.upsert(merged);
        report.updated.push(row.id.clone());
    }
    if !contested.is_empty() {
        let fields = contested.iter().map(|f| f.name()).collect::<Vec<_>>().join(", ");
        tracing::warn!(task_id = %row.id, %fields, "remote edit overlaps a pending local change");
        report.conflicts.push(ConflictError::ConcurrentEdit { task_id: row.id.clone(), fields });
    }
    tracing::debug!(task_id = %row.id, "deferring remote row until local change resolves");
    report.deferred.push(row.id.clone());
    state.deferred.insert(row.id.clone(), row);
}

fn merge_settled(state: &mut StoreState, row: Task, report: &mut MergeReport) {
    match state.board.get(&row.id).cloned() {
        Some(local) => {
            let stale = row.updated_at < local.updated_at || (row.updated_at == local.updated_at && !state.clamped.contains(&row.id));
            if stale {
                return;
            }
            state.set_base(row.clone());
            let mut merged = row;
            let clamped = clamp_capacity(state, &local, &mut merged, report);
            track_clamp(state, clamped, &merged.id);
            if merged != local {
                report.updated.push(merged.id.clone());
                state.board.upsert(merged);
            }
        }
        None => {
            state.set_base(row.clone());
            let mut merged = row;
            let blank = Task { important: false, ..merged.clone() };
            let clamped = clamp_capacity(state, &blank, &mut merged, report);
            track_clamp(state, clamped, &merged.id);
            report.inserted.push(merged.id.clone());
            state.board.upsert(merged);
        }
    }
}

/// Keeps `merged` from raising the active-important count past the limit by
/// falling back to the local `important` value. Returns true if it did.
fn clamp_capacity(state: &StoreState, local: &Task, merged: &mut Task, report: &mut MergeReport) -> bool {
    let gains = merged.is_active_important() && !(state.board.contains(&local.id) && local.is_active_important());
    if gains && state.board.active_important_count() >= BIG_THREE_LIMIT {
        merged.copy_field(local, Field::Important);
        tracing::warn!(task_id = %merged.id, "remote row would exceed the Big Three limit, keeping local priority");
        report.conflicts.push(ConflictError::Capacity { task_id: merged.id.clone() });
        return true;
    }
    false
}

fn track_clamp(state: &mut StoreState, clamped: bool, task_id: &str) {
    if clamped {
        state.clamped.insert(task_id.to_string());
    } else {
        state.clamped.remove(task_id);
    }
}

/// Listens for remote change notifications and merges fresh reads into the
/// shared state.
pub struct RemoteSyncChannel<R> {
    state: Arc<Mutex<StoreState>>,
    remote: Arc<R>,
    events: broadcast::Sender<StoreEvent>,
    user_id: String,
}

impl<R: RemoteStore> RemoteSyncChannel<R> {
    pub fn new(state: Arc<Mutex<StoreState>>, remote: Arc<R>, events: broadcast::Sender<StoreEvent>, user_id: &str) -> Self {
        Self {
            state,
            remote,
            events,
            user_id: user_id.to_string(),
        }
    }

    /// Merges `rows` and broadcasts the outcome.
    pub fn apply(&self, rows: Vec<Task>, scope: MergeScope) -> MergeReport {
        let report = merge_rows(&mut self.state.lock(), rows, scope);
        for conflict in &report.conflicts {
            let _ = self.events.send(StoreEvent::Conflict(conflict.clone()));
        }
        if !report.is_empty() {
            tracing::debug!(
                inserted = report.inserted.len(),
                updated = report.updated.len(),
                removed = report.removed.len(),
                deferred = report.deferred.len(),
                "merged remote rows"
            );
            let _ = self.events.send(StoreEvent::Merged(report.clone()));
        }
        report
    }

    /// Reads the user's rows and merges them as a full snapshot.
    pub async fn refresh(&self) -> Result<MergeReport, TaskError> {
        let rows = self.remote.read_tasks(&self.user_id).await.map_err(NetworkError::Read)?;
        Ok(self.apply(rows, MergeScope::Full))
    }

    /// Subscribes and keeps merging until the handle is stopped or dropped.
    /// Notifications that pile up during a refresh collapse into one read.
    pub fn spawn(self) -> SyncHandle {
        let mut subscription: Subscription = self.remote.subscribe_to_changes(&self.user_id);
        let handle = tokio::spawn(async move {
            while subscription.changed().await {
                subscription.drain();
                if let Err(error) = self.refresh().await {
                    tracing::warn!(error = %error, "refreshing after remote change failed");
                    let _ = self.events.send(StoreEvent::SyncFailed(error));
                }
            }
            tracing::debug!("remote change stream closed");
        });
        SyncHandle { handle: Some(handle) }
    }
}

/// Running sync loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct SyncHandle {
    handle: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
