//! The task store: one owned collection, consistent section views, and every
//! user operation.
//!
//! `TaskStore` composes the pieces. Reads lock the shared [`StoreState`] once
//! and copy out what they need, so a caller never sees a half-applied
//! mutation. Writes plan against the board with the ordering functions and
//! hand the plan to the [`OptimisticMutator`]; the local effect is visible as
//! soon as the call returns, and the returned [`MutationHandle`] reports how
//! persistence ended.
//!
//! ```no_run
//! use tasklane::api::MemoryRemote;
//! use tasklane::libs::section::SectionId;
//! use tasklane::libs::store::{StoreOptions, TaskStore};
//!
//! # async fn demo() -> Result<(), tasklane::libs::error::TaskError> {
//! let store = TaskStore::new(MemoryRemote::new(), StoreOptions::default());
//! store.load().await?;
//! let (task, handle) = store.create_task("Call the bank")?;
//! handle.wait().await?;
//! store.toggle_important(&task.id)?.wait().await?;
//! assert_eq!(store.get_section(&SectionId::BigThree)[0].id, task.id);
//! # Ok(())
//! # }
//! ```

use crate::api::attachments::{AttachmentStore, NoAttachments};
use crate::api::preferences::DisplayPreferences;
use crate::api::RemoteStore;
use crate::libs::board::{SectionSnapshot, SectionSource};
use crate::libs::config::Config;
use crate::libs::drag::DragCommand;
use crate::libs::error::{NetworkError, TaskError, ValidationError};
use crate::libs::event::StoreEvent;
use crate::libs::mutator::{MutationHandle, MutatorSettings, OptimisticMutator};
use crate::libs::ordering::{self, MovePlan};
use crate::libs::section::SectionId;
use crate::libs::state::StoreState;
use crate::libs::sync::{MergeReport, MergeScope, RemoteSyncChannel, SyncHandle};
use crate::libs::task::{FieldEdit, Task, TaskId, TaskPatch, TaskStatus};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub user_id: String,
    pub persist_timeout: Duration,
    pub reorder_debounce: Duration,
    /// How long a task counts as "just changed" after a local mutation.
    pub just_changed: Duration,
    pub retry_once: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        let settings = MutatorSettings::default();
        Self {
            user_id: "local".to_string(),
            persist_timeout: settings.persist_timeout,
            reorder_debounce: settings.reorder_debounce,
            just_changed: Duration::from_millis(1500),
            retry_once: settings.retry_once,
        }
    }
}

impl From<&Config> for StoreOptions {
    fn from(config: &Config) -> Self {
        Self {
            user_id: config.user_id.clone(),
            persist_timeout: config.sync.persist_timeout(),
            reorder_debounce: config.sync.reorder_debounce(),
            just_changed: config.sync.just_changed(),
            retry_once: config.sync.retry_once,
        }
    }
}

impl StoreOptions {
    fn mutator_settings(&self) -> MutatorSettings {
        MutatorSettings {
            persist_timeout: self.persist_timeout,
            reorder_debounce: self.reorder_debounce,
            retry_once: self.retry_once,
        }
    }
}

/// A task plus its transient presentation state.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskView {
    pub task: Task,
    /// A write for this task is still in flight.
    pub pending: bool,
    /// The task was changed locally within the configured window.
    pub just_changed: bool,
}

/// A local user intent, as accepted by [`TaskStore::apply_local`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    ToggleComplete(TaskId),
    ToggleImportant(TaskId),
    ToggleUrgent(TaskId),
    ToggleWaiting(TaskId),
    Edit { task_id: TaskId, edit: FieldEdit },
    Reorder { section: SectionId, task_id: TaskId, index: usize },
    Move { task_id: TaskId, from: SectionId, to: SectionId, before: Option<TaskId> },
}

pub struct TaskStore<R, A = NoAttachments> {
    state: Arc<Mutex<StoreState>>,
    remote: Arc<R>,
    attachments: Arc<A>,
    mutator: OptimisticMutator<R>,
    events: broadcast::Sender<StoreEvent>,
    options: StoreOptions,
}

impl<R: RemoteStore> TaskStore<R, NoAttachments> {
    pub fn new(remote: R, options: StoreOptions) -> Self {
        Self::with_attachments(remote, NoAttachments, options)
    }
}

impl<R: RemoteStore, A: AttachmentStore> TaskStore<R, A> {
    pub fn with_attachments(remote: R, attachments: A, options: StoreOptions) -> Self {
        let state = Arc::new(Mutex::new(StoreState::new()));
        let remote = Arc::new(remote);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let mutator = OptimisticMutator::new(state.clone(), remote.clone(), events.clone(), options.mutator_settings(), &options.user_id);
        Self {
            state,
            remote,
            attachments: Arc::new(attachments),
            mutator,
            events,
            options,
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Replaces the collection with a fresh remote read.
    pub async fn load(&self) -> Result<usize, TaskError> {
        let rows = self.remote.read_tasks(&self.options.user_id).await.map_err(NetworkError::Read)?;
        let count = rows.len();
        let conflicts = self.state.lock().replace_all(rows);
        for conflict in conflicts {
            tracing::warn!(%conflict, "loaded data exceeds the Big Three limit");
            let _ = self.events.send(StoreEvent::Conflict(conflict));
        }
        tracing::debug!(tasks = count, "loaded tasks");
        let _ = self.events.send(StoreEvent::Loaded { tasks: count });
        Ok(count)
    }

    // === QUERIES ===

    /// Tasks of `section` in display order, reflecting every applied change.
    pub fn get_section(&self, section: &SectionId) -> Vec<Task> {
        self.state.lock().board.section_tasks(section)
    }

    pub fn get_section_view(&self, section: &SectionId) -> Vec<TaskView> {
        let state = self.state.lock();
        state
            .board
            .section_tasks(section)
            .into_iter()
            .map(|task| TaskView {
                pending: state.is_pending(&task.id),
                just_changed: state.just_changed(&task.id, self.options.just_changed),
                task,
            })
            .collect()
    }

    pub fn get_task(&self, task_id: &str) -> Option<Task> {
        self.state.lock().board.get(task_id).cloned()
    }

    pub fn section_of(&self, task_id: &str) -> Option<SectionId> {
        self.state.lock().board.section_of(task_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().board.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves a full id or a unique id prefix.
    pub fn resolve_id(&self, prefix: &str) -> Result<TaskId, ValidationError> {
        let state = self.state.lock();
        if state.board.contains(prefix) {
            return Ok(prefix.to_string());
        }
        let mut matches = state.board.ids().filter(|id| id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(id), None) if !prefix.is_empty() => Ok(id.clone()),
            (Some(_), _) => Err(ValidationError::AmbiguousTask(prefix.to_string())),
            (None, _) => Err(ValidationError::UnknownTask(prefix.to_string())),
        }
    }

    /// Visible sections in display order with their tasks.
    ///
    /// Sections named by the preferences come first, in that order. The rest
    /// follow in canonical order. The fixed sections always appear, even when
    /// empty, unless the preferences hide them.
    pub fn board(&self, preferences: &impl DisplayPreferences) -> Vec<(SectionId, Vec<Task>)> {
        let state = self.state.lock();
        let mut canonical: BTreeSet<SectionId> = SectionId::FIXED.iter().cloned().collect();
        canonical.extend(state.board.sections().map(|(section, _)| section.clone()));

        let mut order: Vec<SectionId> = Vec::with_capacity(canonical.len());
        for section in preferences.section_order().into_iter().chain(canonical) {
            if !order.contains(&section) {
                order.push(section);
            }
        }

        order
            .into_iter()
            .filter(|section| preferences.is_visible(section))
            .map(|section| {
                let tasks = state.board.section_tasks(&section);
                (section, tasks)
            })
            .collect()
    }

    pub fn subscribe_to_store_changes(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // === MUTATIONS ===

    pub fn apply_local(&self, mutation: Mutation) -> Result<MutationHandle, TaskError> {
        match mutation {
            Mutation::ToggleComplete(task_id) => self.toggle_complete(&task_id),
            Mutation::ToggleImportant(task_id) => self.toggle_important(&task_id),
            Mutation::ToggleUrgent(task_id) => self.toggle_urgent(&task_id),
            Mutation::ToggleWaiting(task_id) => self.toggle_waiting(&task_id),
            Mutation::Edit { task_id, edit } => self.edit(&task_id, edit),
            Mutation::Reorder { section, task_id, index } => self.reorder(&section, &task_id, index),
            Mutation::Move { task_id, from, to, before } => self.move_task(&task_id, &from, &to, before.as_deref()),
        }
    }

    /// Merges rows obtained elsewhere, with the same rules as a notification.
    pub fn apply_remote(&self, rows: Vec<Task>, scope: MergeScope) -> MergeReport {
        self.sync_channel().apply(rows, scope)
    }

    /// Creates a routine task at the end of its section.
    pub fn create_task(&self, title: &str) -> Result<(Task, MutationHandle<Task>), TaskError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle.into());
        }
        let task = Task::new(Uuid::new_v4().to_string(), title);
        Ok(self.mutator.submit_insert(task))
    }

    pub fn edit(&self, task_id: &str, edit: FieldEdit) -> Result<MutationHandle, TaskError> {
        if edit.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ValidationError::EmptyTitle.into());
        }
        let patch = edit.into_patch();
        let task_id = task_id.to_string();
        self.mutator.submit(move |board| {
            let task = board.get(&task_id).ok_or_else(|| ValidationError::UnknownTask(task_id.clone()))?;
            let patch = TaskPatch::diff(task, &patch.applied(task));
            let mut plan = MovePlan::default();
            if !patch.is_empty() {
                plan.patches.push((task_id.clone(), patch));
            }
            Ok(plan)
        })
    }

    pub fn toggle_complete(&self, task_id: &str) -> Result<MutationHandle, TaskError> {
        self.toggle(task_id, |task| TaskPatch {
            completed: Some(!task.completed),
            ..Default::default()
        })
    }

    pub fn toggle_important(&self, task_id: &str) -> Result<MutationHandle, TaskError> {
        self.toggle(task_id, |task| TaskPatch {
            important: Some(!task.important),
            ..Default::default()
        })
    }

    pub fn toggle_urgent(&self, task_id: &str) -> Result<MutationHandle, TaskError> {
        self.toggle(task_id, |task| TaskPatch {
            urgent: Some(!task.urgent),
            ..Default::default()
        })
    }

    pub fn toggle_waiting(&self, task_id: &str) -> Result<MutationHandle, TaskError> {
        self.toggle(task_id, |task| TaskPatch {
            status: Some(match task.status {
                TaskStatus::Pending => TaskStatus::Inbox,
                TaskStatus::Inbox => TaskStatus::Pending,
            }),
            ..Default::default()
        })
    }

    fn toggle(&self, task_id: &str, flip: impl FnOnce(&Task) -> TaskPatch) -> Result<MutationHandle, TaskError> {
        let task_id = task_id.to_string();
        self.mutator.submit(move |board| {
            let task = board.get(&task_id).ok_or_else(|| ValidationError::UnknownTask(task_id.clone()))?;
            ordering::reclassify(board, &task_id, flip(task))
        })
    }

    pub fn reorder(&self, section: &SectionId, task_id: &str, index: usize) -> Result<MutationHandle, TaskError> {
        self.mutator.submit(|board| ordering::reorder_within_section(board, section, task_id, index))
    }

    pub fn move_task(&self, task_id: &str, from: &SectionId, to: &SectionId, before: Option<&str>) -> Result<MutationHandle, TaskError> {
        self.mutator.submit(|board| ordering::move_across_sections(board, task_id, from, to, before))
    }

    /// Deletes a task and, once the remote delete succeeds, every attachment
    /// it owned. Attachment failures are logged only.
    pub fn delete(&self, task_id: &str) -> Result<MutationHandle<Task>, TaskError> {
        let handle = self.mutator.submit_delete(task_id)?;
        let attachments = self.attachments.clone();
        Ok(MutationHandle::spawn(async move {
            let task = handle.wait().await?;
            for attachment_id in &task.attachments {
                if let Err(error) = attachments.delete_attachment(attachment_id).await {
                    tracing::warn!(task_id = %task.id, attachment_id, error = %error, "failed to release attachment");
                }
            }
            Ok(task)
        }))
    }

    /// Stores a blob and records its id on the task. Returns the new id.
    pub async fn attach(&self, task_id: &str, blob: Vec<u8>) -> Result<String, TaskError> {
        if self.get_task(task_id).is_none() {
            return Err(ValidationError::UnknownTask(task_id.to_string()).into());
        }
        let attachment_id = self
            .attachments
            .add_attachment(task_id, blob)
            .await
            .map_err(|source| NetworkError::Failed { attempts: 1, source })?;

        let owned = attachment_id.clone();
        let handle = self.mutator.submit(move |board| {
            let task = board.get(task_id).ok_or_else(|| ValidationError::UnknownTask(task_id.to_string()))?;
            let mut list = task.attachments.clone();
            list.push(owned);
            let mut plan = MovePlan::default();
            plan.patches.push((
                task_id.to_string(),
                TaskPatch {
                    attachments: Some(list),
                    ..Default::default()
                },
            ));
            Ok(plan)
        })?;
        handle.wait().await?;
        Ok(attachment_id)
    }

    pub async fn get_attachments(&self, task_id: &str) -> Result<Vec<String>, TaskError> {
        self.attachments
            .get_attachments(task_id)
            .await
            .map_err(|source| NetworkError::Failed { attempts: 1, source }.into())
    }

    // === DRAG ===

    /// Executes a command produced by the drag coordinator.
    pub fn apply_drag(&self, command: DragCommand) -> Result<MutationHandle, TaskError> {
        match command {
            DragCommand::MoveWithinSection { section, task_id, target_index } => self
                .mutator
                .submit_debounced(|board| ordering::reorder_within_section(board, &section, &task_id, target_index)),
            DragCommand::MoveAcrossSections { task_id, from, to, before } => self.move_task(&task_id, &from, &to, before.as_deref()),
            DragCommand::Cancelled { snapshots } => {
                self.restore_orders(&snapshots);
                Ok(MutationHandle::ready(Ok(())))
            }
        }
    }

    /// Puts order values back exactly as captured. Local only: nothing was
    /// persisted for the gesture being undone.
    pub fn restore_orders(&self, snapshots: &[SectionSnapshot]) -> usize {
        let changed: Vec<TaskId> = {
            let mut state = self.state.lock();
            let before: Vec<SectionSnapshot> = snapshots.iter().map(|s| state.board.snapshot(&s.section)).collect();
            let mut changed = 0;
            for snapshot in snapshots {
                changed += state.board.restore_snapshot(snapshot);
            }
            if changed == 0 {
                return 0;
            }
            before
                .iter()
                .flat_map(|s| s.entries.iter())
                .filter(|(id, order)| state.board.get(id).is_some_and(|t| t.order != *order))
                .map(|(id, _)| id.clone())
                .collect()
        };
        tracing::debug!(tasks = ?changed, "restored pre-drag order");
        let count = changed.len();
        let _ = self.events.send(StoreEvent::Changed { task_ids: changed });
        count
    }

    // === SYNC ===

    pub fn sync_channel(&self) -> RemoteSyncChannel<R> {
        RemoteSyncChannel::new(self.state.clone(), self.remote.clone(), self.events.clone(), &self.options.user_id)
    }

    /// Starts merging remote change notifications in the background.
    pub fn start_sync(&self) -> SyncHandle {
        self.sync_channel().spawn()
    }
}

impl<R, A> SectionSource for TaskStore<R, A> {
    fn section_snapshot(&self, section: &SectionId) -> SectionSnapshot {
        self.state.lock().board.snapshot(section)
    }
}
