//! Optimistic mutation: apply locally, persist in the background, confirm or
//! roll back.
//!
//! Every local change goes through the same contract:
//!
//! 1. Under the state lock, plan the change against the current board, stamp
//!    each affected task with a fresh local version and apply the patches.
//! 2. Release the lock and spawn the remote write. The caller gets a
//!    [`MutationHandle`] straight away; the board already shows the change.
//! 3. On success, adopt the server row unless a newer local change exists.
//! 4. On failure (after one retry), revert to the stamped snapshot unless a
//!    newer local change superseded this one.
//!
//! Writes may finish in any order. Rollback correctness depends only on the
//! version comparison in [`StoreState::rollback`].

use crate::api::RemoteStore;
use crate::libs::board::Board;
use crate::libs::classifier::classify;
use crate::libs::error::{NetworkError, RemoteError, TaskError, ValidationError};
use crate::libs::event::StoreEvent;
use crate::libs::ordering::{self, MovePlan};
use crate::libs::state::{BatchEntry, Stamp, StoreState};
use crate::libs::task::{FieldSet, Task, TaskId, TaskPatch};
use chrono::Utc;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutatorSettings {
    pub persist_timeout: Duration,
    pub reorder_debounce: Duration,
    pub retry_once: bool,
}

impl Default for MutatorSettings {
    fn default() -> Self {
        Self {
            persist_timeout: Duration::from_millis(8000),
            reorder_debounce: Duration::from_millis(100),
            retry_once: true,
        }
    }
}

/// Completion of a mutation's remote write.
///
/// The local effect is visible before the handle exists; awaiting it only
/// reports how persistence ended. Dropping the handle does not cancel the
/// write.
#[derive(Debug)]
pub struct MutationHandle<T = ()> {
    inner: HandleInner<T>,
}

#[derive(Debug)]
enum HandleInner<T> {
    Ready(Result<T, TaskError>),
    Spawned(JoinHandle<Result<T, TaskError>>),
}

impl<T: Send + 'static> MutationHandle<T> {
    pub fn ready(result: Result<T, TaskError>) -> Self {
        Self { inner: HandleInner::Ready(result) }
    }

    pub fn spawn(future: impl Future<Output = Result<T, TaskError>> + Send + 'static) -> Self {
        Self {
            inner: HandleInner::Spawned(tokio::spawn(future)),
        }
    }

    pub async fn wait(self) -> Result<T, TaskError> {
        match self.inner {
            HandleInner::Ready(result) => result,
            HandleInner::Spawned(handle) => handle.await.map_err(|e| TaskError::Interrupted(e.to_string()))?,
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.inner {
            HandleInner::Ready(_) => true,
            HandleInner::Spawned(handle) => handle.is_finished(),
        }
    }
}

pub struct OptimisticMutator<R> {
    state: Arc<Mutex<StoreState>>,
    remote: Arc<R>,
    events: broadcast::Sender<StoreEvent>,
    settings: MutatorSettings,
    user_id: Arc<str>,
}

impl<R> Clone for OptimisticMutator<R> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            remote: self.remote.clone(),
            events: self.events.clone(),
            settings: self.settings,
            user_id: self.user_id.clone(),
        }
    }
}

impl<R: RemoteStore> OptimisticMutator<R> {
    pub fn new(state: Arc<Mutex<StoreState>>, remote: Arc<R>, events: broadcast::Sender<StoreEvent>, settings: MutatorSettings, user_id: &str) -> Self {
        Self {
            state,
            remote,
            events,
            settings,
            user_id: Arc::from(user_id),
        }
    }

    pub fn settings(&self) -> MutatorSettings {
        self.settings
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }

    /// Plans against the current board and applies the result, all under one
    /// lock. Validation errors leave the board untouched.
    fn apply_planned(&self, plan: impl FnOnce(&Board) -> Result<MovePlan, ValidationError>) -> Result<(MovePlan, Vec<Stamp>), TaskError> {
        let mut state = self.state.lock();
        let plan = plan(&state.board)?;
        let now = Utc::now();
        let mut stamps = Vec::with_capacity(plan.patches.len());
        for (task_id, patch) in &plan.patches {
            stamps.push(state.begin(task_id, patch.fields()));
            state.board.apply_patch(task_id, patch, now);
        }
        Ok((plan, stamps))
    }

    /// Applies a planned change and persists each row in turn. The first
    /// failed row rolls back every row of the plan; rows already written are
    /// reverted on the server and the collection is reloaded.
    pub fn submit(&self, plan: impl FnOnce(&Board) -> Result<MovePlan, ValidationError>) -> Result<MutationHandle, TaskError> {
        let (plan, stamps) = self.apply_planned(plan)?;
        if plan.is_empty() {
            return Ok(MutationHandle::ready(Ok(())));
        }
        let task_ids = plan.task_ids();
        tracing::debug!(tasks = ?task_ids, "applied local change");
        self.emit(StoreEvent::Changed { task_ids: task_ids.clone() });

        let mutator = self.clone();
        Ok(MutationHandle::spawn(async move {
            let remote = mutator.remote.clone();
            let mut rows = Vec::with_capacity(plan.patches.len());
            for (index, (task_id, patch)) in plan.patches.iter().enumerate() {
                match persist(mutator.settings, || remote.update_task(task_id, patch)).await {
                    Ok(row) => rows.push(row),
                    Err(error) => {
                        mutator.roll_back(&stamps, error.clone());
                        if index > 0 {
                            mutator.undo_persisted(&plan.patches[..index], &stamps[..index]).await;
                        }
                        return Err(error.into());
                    }
                }
            }

            {
                let mut state = mutator.state.lock();
                for (stamp, row) in stamps.iter().zip(rows) {
                    state.confirm(stamp, Some(row));
                }
            }
            mutator.emit(StoreEvent::Confirmed { task_ids });
            Ok(())
        }))
    }

    /// Places a new task at the end of its section, adds it locally and
    /// persists it with `insert_task`. Returns the task as placed.
    pub fn submit_insert(&self, mut task: Task) -> (Task, MutationHandle<Task>) {
        let stamp = {
            let mut state = self.state.lock();
            task.order = ordering::next_order(&state.board, &classify(&task));
            let stamp = state.begin(&task.id, FieldSet::PLACEMENT);
            state.board.upsert(task.clone());
            stamp
        };
        tracing::debug!(task_id = %task.id, "created task locally");
        self.emit(StoreEvent::Changed { task_ids: vec![task.id.clone()] });

        let placed = task.clone();
        let mutator = self.clone();
        let handle = MutationHandle::spawn(async move {
            let remote = mutator.remote.clone();
            let user_id = mutator.user_id.clone();
            match persist(mutator.settings, || remote.insert_task(&user_id, &task)).await {
                Ok(row) => {
                    mutator.state.lock().confirm(&stamp, Some(row.clone()));
                    mutator.emit(StoreEvent::Confirmed { task_ids: vec![row.id.clone()] });
                    Ok(row)
                }
                Err(error) => {
                    mutator.roll_back(std::slice::from_ref(&stamp), error.clone());
                    Err(error.into())
                }
            }
        });
        (placed, handle)
    }

    /// Removes a task locally, leaving a tombstone, and deletes it remotely.
    /// Resolves to the deleted task so callers can release what it owned.
    pub fn submit_delete(&self, task_id: &str) -> Result<MutationHandle<Task>, TaskError> {
        let task = self.state.lock().tombstone(task_id).ok_or_else(|| ValidationError::UnknownTask(task_id.to_string()))?;
        tracing::debug!(task_id, "deleted task locally");
        self.emit(StoreEvent::Changed { task_ids: vec![task.id.clone()] });

        let mutator = self.clone();
        Ok(MutationHandle::spawn(async move {
            let remote = mutator.remote.clone();
            let result = match persist(mutator.settings, || remote.delete_task(&task.id)).await {
                Err(NetworkError::Failed { source: RemoteError::NotFound(_), .. }) => Ok(()),
                other => other,
            };
            match result {
                Ok(()) => {
                    mutator.state.lock().forget(&task.id);
                    mutator.emit(StoreEvent::Confirmed { task_ids: vec![task.id.clone()] });
                    Ok(task)
                }
                Err(error) => {
                    tracing::warn!(task_id = %task.id, error = %error, "remote delete failed, restoring task");
                    mutator.state.lock().restore(task.clone());
                    mutator.emit(StoreEvent::RolledBack {
                        task_ids: vec![task.id.clone()],
                        error: error.clone().into(),
                    });
                    Err(error.into())
                }
            }
        }))
    }

    /// Applies a reorder at once but holds the write for the debounce window.
    /// Reorders arriving inside the window are coalesced into one write per
    /// task. If the write fails the whole collection is reloaded.
    ///
    /// The handle of a reorder folded into a later one resolves as soon as the
    /// later reorder takes over the batch.
    pub fn submit_debounced(&self, plan: impl FnOnce(&Board) -> Result<MovePlan, ValidationError>) -> Result<MutationHandle, TaskError> {
        let (generation, task_ids) = {
            let mut state = self.state.lock();
            let plan = plan(&state.board)?;
            if plan.is_empty() {
                return Ok(MutationHandle::ready(Ok(())));
            }
            let task_ids = plan.task_ids();
            let now = Utc::now();
            for (task_id, patch) in plan.patches {
                let stamp = state.begin(&task_id, patch.fields());
                state.board.apply_patch(&task_id, &patch, now);
                state.batch.add(stamp, patch);
            }
            state.batch.generation += 1;
            (state.batch.generation, task_ids)
        };
        self.emit(StoreEvent::Changed { task_ids });

        let mutator = self.clone();
        Ok(MutationHandle::spawn(async move {
            tokio::time::sleep(mutator.settings.reorder_debounce).await;
            let entries = {
                let mut state = mutator.state.lock();
                if state.batch.generation != generation {
                    return Ok(());
                }
                std::mem::take(&mut state.batch.entries)
            };
            mutator.flush(entries).await
        }))
    }

    async fn flush(&self, entries: Vec<BatchEntry>) -> Result<(), TaskError> {
        tracing::debug!(tasks = entries.len(), "flushing batched reorder");
        let remote = self.remote.clone();
        let mut rows = Vec::with_capacity(entries.len());
        for entry in &entries {
            match persist(self.settings, || remote.update_task(&entry.task_id, &entry.patch)).await {
                Ok(row) => rows.push(row),
                Err(error) => {
                    tracing::warn!(error = %error, "batched reorder failed, reloading all tasks");
                    let stamps: Vec<Stamp> = entries.iter().flat_map(|e| e.stamps.iter().cloned()).collect();
                    self.roll_back(&stamps, error.clone());
                    if let Err(reload_error) = self.reload().await {
                        self.emit(StoreEvent::SyncFailed(reload_error));
                    }
                    return Err(error.into());
                }
            }
        }

        let task_ids: Vec<TaskId> = entries.iter().map(|e| e.task_id.clone()).collect();
        {
            let mut state = self.state.lock();
            for (entry, row) in entries.iter().zip(rows) {
                for stamp in &entry.stamps {
                    state.confirm(stamp, Some(row.clone()));
                }
            }
        }
        self.emit(StoreEvent::Confirmed { task_ids });
        Ok(())
    }

    /// Writes the previous values back for the rows of a plan that reached the
    /// server before a later row failed, then reloads everything.
    async fn undo_persisted(&self, patches: &[(TaskId, TaskPatch)], stamps: &[Stamp]) {
        tracing::warn!(tasks = patches.len(), "change was only partly persisted, undoing written rows");
        for ((task_id, patch), stamp) in patches.iter().zip(stamps) {
            let Some(before) = &stamp.snapshot else {
                continue;
            };
            let undo = TaskPatch::diff(&patch.applied(before), before);
            if undo.is_empty() {
                continue;
            }
            if let Err(error) = persist(self.settings, || self.remote.update_task(task_id, &undo)).await {
                tracing::warn!(task_id = %task_id, error = %error, "could not undo persisted row");
            }
        }
        if let Err(error) = self.reload().await {
            self.emit(StoreEvent::SyncFailed(error));
        }
    }

    /// Replaces the whole collection with a fresh remote read.
    pub async fn reload(&self) -> Result<usize, TaskError> {
        let rows = self.remote.read_tasks(&self.user_id).await.map_err(NetworkError::Read)?;
        let count = rows.len();
        let conflicts = self.state.lock().replace_all(rows);
        for conflict in conflicts {
            tracing::warn!(%conflict, "remote data exceeds the Big Three limit");
            self.emit(StoreEvent::Conflict(conflict));
        }
        self.emit(StoreEvent::Reloaded { tasks: count });
        Ok(count)
    }

    fn roll_back(&self, stamps: &[Stamp], error: NetworkError) {
        let reverted: Vec<TaskId> = {
            let mut state = self.state.lock();
            stamps.iter().rev().filter(|stamp| state.rollback(stamp)).map(|stamp| stamp.task_id.clone()).collect()
        };
        tracing::warn!(tasks = ?reverted, error = %error, "persisting change failed, rolled back");
        self.emit(StoreEvent::RolledBack {
            task_ids: reverted,
            error: error.into(),
        });
    }
}

/// Runs one remote write with the configured timeout, retrying once on
/// failure. A write that outlives the timeout counts as failed; its late
/// result is dropped with the future.
async fn persist<T, F, Fut>(settings: MutatorSettings, mut call: F) -> Result<T, NetworkError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let attempts = if settings.retry_once { 2 } else { 1 };
    let mut last_error = NetworkError::Timeout(settings.persist_timeout);
    for attempt in 1..=attempts {
        match tokio::time::timeout(settings.persist_timeout, call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(source)) => {
                tracing::debug!(attempt, error = %source, "remote write failed");
                last_error = NetworkError::Failed { attempts: attempt, source };
            }
            Err(_) => {
                tracing::debug!(attempt, "remote write timed out");
                last_error = NetworkError::Timeout(settings.persist_timeout);
            }
        }
    }
    Err(last_error)
}
