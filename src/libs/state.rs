//! Mutable state shared by the store, the mutator and the sync channel.
//!
//! Everything lives behind one `parking_lot::Mutex`; each public operation
//! takes the lock once, does its synchronous work, and releases it before any
//! `.await`. Readers therefore never observe a half-applied mutation.

use crate::libs::board::Board;
use crate::libs::error::ConflictError;
use crate::libs::task::{FieldSet, Task, TaskId, TaskPatch};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::time::{Duration, Instant};

/// Proof of a locally applied change, handed back on confirm or rollback.
#[derive(Debug, Clone)]
pub struct Stamp {
    pub task_id: TaskId,
    pub version: u64,
    /// Local version before this change.
    pub previous: u64,
    /// Task as it was before this change; `None` when the change created it.
    pub snapshot: Option<Task>,
}

#[derive(Debug, Default)]
struct VersionInfo {
    /// Latest locally applied version.
    local: u64,
    /// Unresolved versions and the fields each one touched.
    in_flight: BTreeMap<u64, FieldSet>,
    /// Last row the remote acknowledged, used to detect concurrent edits.
    base: Option<Task>,
    last_change: Option<Instant>,
}

/// Reorders waiting for the debounce window to close.
#[derive(Debug, Default)]
pub struct ReorderBatch {
    pub generation: u64,
    pub entries: Vec<BatchEntry>,
}

#[derive(Debug)]
pub struct BatchEntry {
    pub task_id: TaskId,
    pub patch: TaskPatch,
    pub stamps: Vec<Stamp>,
}

impl ReorderBatch {
    pub fn add(&mut self, stamp: Stamp, patch: TaskPatch) {
        match self.entries.iter_mut().find(|e| e.task_id == stamp.task_id) {
            Some(entry) => {
                entry.patch.merge(patch);
                entry.stamps.push(stamp);
            }
            None => self.entries.push(BatchEntry {
                task_id: stamp.task_id.clone(),
                patch,
                stamps: vec![stamp],
            }),
        }
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.entries.iter().any(|e| e.task_id == task_id)
    }
}

#[derive(Debug, Default)]
pub struct StoreState {
    pub board: Board,
    versions: HashMap<TaskId, VersionInfo>,
    /// Remote rows held back until the task's pending changes resolve.
    pub(crate) deferred: HashMap<TaskId, Task>,
    /// Deleted locally; remote rows with these ids are ignored.
    pub(crate) tombstones: HashSet<TaskId>,
    /// Tasks whose remote `important` was dropped to respect the Big Three
    /// limit; their rows are re-evaluated even when not newer.
    pub(crate) clamped: HashSet<TaskId>,
    next_version: u64,
    pub batch: ReorderBatch,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a local change to `task_id` that touches `fields`, before it
    /// is applied to the board.
    pub fn begin(&mut self, task_id: &str, fields: FieldSet) -> Stamp {
        self.next_version += 1;
        let version = self.next_version;
        let snapshot = self.board.get(task_id).cloned();
        let info = self.versions.entry(task_id.to_string()).or_default();
        let previous = info.local;
        info.local = version;
        info.in_flight.insert(version, fields);
        info.last_change = Some(Instant::now());
        Stamp {
            task_id: task_id.to_string(),
            version,
            previous,
            snapshot,
        }
    }

    /// Resolves a successful write. The server row is adopted when no newer
    /// local change exists for the task. Returns true if it was adopted.
    pub fn confirm(&mut self, stamp: &Stamp, row: Option<Task>) -> bool {
        let Some(info) = self.versions.get_mut(&stamp.task_id) else {
            return false;
        };
        info.in_flight.remove(&stamp.version);
        if let Some(row) = &row {
            if info.base.as_ref().map_or(true, |b| b.updated_at <= row.updated_at) {
                info.base = Some(row.clone());
            }
        }

        let settled = info.local == stamp.version && info.in_flight.is_empty();
        let adopt = settled && row.is_some() && !self.tombstones.contains(&stamp.task_id);
        if adopt {
            if let Some(row) = row {
                self.board.upsert(row);
            }
        }
        if settled {
            self.release_deferred(&stamp.task_id);
        }
        adopt
    }

    /// Resolves a failed write. Reverts to the stamp's snapshot unless a newer
    /// local change superseded it. Returns true if the board was reverted.
    pub fn rollback(&mut self, stamp: &Stamp) -> bool {
        let Some(info) = self.versions.get_mut(&stamp.task_id) else {
            return false;
        };
        info.in_flight.remove(&stamp.version);
        if self.tombstones.contains(&stamp.task_id) {
            tracing::debug!(task_id = %stamp.task_id, version = stamp.version, "failed change belongs to a deleted task");
            return false;
        }
        if info.local != stamp.version {
            tracing::debug!(task_id = %stamp.task_id, version = stamp.version, "failed change was superseded, keeping newer state");
            return false;
        }
        info.local = stamp.previous;
        let settled = info.in_flight.is_empty();

        match &stamp.snapshot {
            Some(task) => self.board.upsert(task.clone()),
            None => {
                self.board.remove(&stamp.task_id);
            }
        }
        if settled {
            self.release_deferred(&stamp.task_id);
        }
        true
    }

    /// Fields held by unresolved local changes. If any of them decides
    /// placement, every placement field is held so a remote echo cannot move
    /// the task while its local position is unconfirmed.
    pub fn touched_fields(&self, task_id: &str) -> FieldSet {
        let mut fields = self
            .versions
            .get(task_id)
            .map(|info| info.in_flight.values().fold(FieldSet::empty(), |acc, f| acc.union(*f)))
            .unwrap_or_default();
        if fields.intersects(FieldSet::PLACEMENT) {
            fields = fields.union(FieldSet::PLACEMENT);
        }
        fields
    }

    pub fn is_pending(&self, task_id: &str) -> bool {
        self.versions.get(task_id).is_some_and(|info| !info.in_flight.is_empty()) || self.tombstones.contains(task_id)
    }

    pub fn just_changed(&self, task_id: &str, window: Duration) -> bool {
        self.versions
            .get(task_id)
            .and_then(|info| info.last_change)
            .is_some_and(|at| at.elapsed() < window)
    }

    pub fn base(&self, task_id: &str) -> Option<&Task> {
        self.versions.get(task_id).and_then(|info| info.base.as_ref())
    }

    pub fn set_base(&mut self, row: Task) {
        let info = self.versions.entry(row.id.clone()).or_default();
        info.base = Some(row);
    }

    /// Removes a task locally and marks it deleted. Returns the removed task.
    pub fn tombstone(&mut self, task_id: &str) -> Option<Task> {
        let task = self.board.remove(task_id)?;
        self.tombstones.insert(task_id.to_string());
        self.deferred.remove(task_id);
        Some(task)
    }

    /// Undoes [`tombstone`](Self::tombstone) after a failed remote delete.
    pub fn restore(&mut self, task: Task) {
        self.tombstones.remove(&task.id);
        self.board.upsert(task);
    }

    /// Drops bookkeeping for a task whose remote delete succeeded. The
    /// tombstone stays until a full read no longer returns the row.
    pub fn forget(&mut self, task_id: &str) {
        self.versions.remove(task_id);
        self.deferred.remove(task_id);
        self.clamped.remove(task_id);
    }

    /// Full replace from a remote read. Pending bookkeeping is dropped; results
    /// of writes still in flight are ignored when they arrive.
    pub fn replace_all(&mut self, rows: Vec<Task>) -> Vec<ConflictError> {
        let present: HashSet<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        self.tombstones.retain(|id| present.contains(id.as_str()));
        let rows: Vec<Task> = rows.into_iter().filter(|r| !self.tombstones.contains(&r.id)).collect();

        self.versions.clear();
        self.deferred.clear();
        self.batch.entries.clear();
        self.batch.generation += 1;
        for row in &rows {
            self.set_base(row.clone());
        }
        let (board, conflicts) = Board::from_tasks(rows);
        self.board = board;
        self.clamped = conflicts
            .iter()
            .filter_map(|conflict| match conflict {
                ConflictError::Capacity { task_id } => Some(task_id.clone()),
                _ => None,
            })
            .collect();
        conflicts
    }

    /// Applies a deferred remote row once its task has no pending changes,
    /// using last-writer-wins against the current local copy.
    fn release_deferred(&mut self, task_id: &str) {
        let Some(row) = self.deferred.remove(task_id) else {
            return;
        };
        let newer = self.board.get(task_id).map_or(true, |local| row.updated_at > local.updated_at);
        if newer && !self.tombstones.contains(task_id) {
            tracing::debug!(task_id, "applying deferred remote row");
            self.board.upsert(row);
        }
    }
}
