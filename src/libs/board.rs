//! Canonical task collection with cached per-section views.
//!
//! The board owns every task and keeps, for each section, the ordered list of
//! member ids. Membership is always `classify(task)`; the cached lists are
//! refreshed for the affected sections on every mutation instead of being
//! filtered on every read.
//!
//! Lists are sorted by `(order, created_at, id)`. Local operations keep order
//! values distinct; if a remote merge brings duplicates into a section, that
//! section is renumbered sequentially so display order and order values agree.

use crate::libs::classifier::{active_important_count, classify};
use crate::libs::error::ConflictError;
use crate::libs::section::{SectionId, BIG_THREE_LIMIT};
use crate::libs::task::{Task, TaskId, TaskPatch};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// Order values of one section, captured for exact restoration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSnapshot {
    pub section: SectionId,
    pub entries: Vec<(TaskId, i64)>,
}

impl SectionSnapshot {
    pub fn position(&self, task_id: &str) -> Option<usize> {
        self.entries.iter().position(|(id, _)| id == task_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read access to section order, used by the drag coordinator.
pub trait SectionSource {
    fn section_snapshot(&self, section: &SectionId) -> SectionSnapshot;
}

#[derive(Debug, Clone, Default)]
pub struct Board {
    tasks: HashMap<TaskId, Task>,
    membership: HashMap<TaskId, SectionId>,
    sections: BTreeMap<SectionId, Vec<TaskId>>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a board from remote rows.
    ///
    /// Rows that would push the Big Three past its limit (possible only when
    /// the remote already holds such data) keep their other fields but lose
    /// `important`; each one is reported.
    pub fn from_tasks(rows: Vec<Task>) -> (Self, Vec<ConflictError>) {
        let mut rows = rows;
        rows.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)).then(a.id.cmp(&b.id)));

        let mut board = Board::new();
        let mut conflicts = Vec::new();
        let mut active = 0;
        for mut task in rows {
            if task.is_active_important() {
                if active >= BIG_THREE_LIMIT {
                    task.important = false;
                    conflicts.push(ConflictError::Capacity { task_id: task.id.clone() });
                } else {
                    active += 1;
                }
            }
            board.tasks.insert(task.id.clone(), task);
        }
        board.rebuild_all();
        (board, conflicts)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.keys()
    }

    /// Ordered member ids of a section; empty for sections with no tasks.
    pub fn section(&self, section: &SectionId) -> &[TaskId] {
        self.sections.get(section).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn section_tasks(&self, section: &SectionId) -> Vec<Task> {
        self.section(section).iter().filter_map(|id| self.tasks.get(id)).cloned().collect()
    }

    pub fn section_of(&self, id: &str) -> Option<&SectionId> {
        self.membership.get(id)
    }

    /// Non-empty sections in canonical order.
    pub fn sections(&self) -> impl Iterator<Item = (&SectionId, &Vec<TaskId>)> {
        self.sections.iter()
    }

    pub fn max_order(&self, section: &SectionId) -> i64 {
        self.section(section).iter().filter_map(|id| self.tasks.get(id)).map(|t| t.order).max().unwrap_or(0)
    }

    pub fn active_important_count(&self) -> usize {
        active_important_count(self.tasks.values())
    }

    /// Active-important count after overlaying `patches` on the current tasks.
    pub fn active_important_count_with(&self, patches: &[(TaskId, TaskPatch)]) -> usize {
        let patched: HashMap<&str, &TaskPatch> = patches.iter().map(|(id, p)| (id.as_str(), p)).collect();
        self.tasks
            .values()
            .filter(|task| match patched.get(task.id.as_str()) {
                Some(patch) => patch.applied(task).is_active_important(),
                None => task.is_active_important(),
            })
            .count()
    }

    /// Inserts or replaces a task and refreshes the affected sections.
    pub fn upsert(&mut self, task: Task) {
        let id = task.id.clone();
        self.tasks.insert(id.clone(), task);
        self.reposition(&id);
    }

    /// Applies a patch locally, stamping `updated_at`.
    pub fn apply_patch(&mut self, id: &str, patch: &TaskPatch, now: DateTime<Utc>) -> bool {
        let Some(task) = self.tasks.get_mut(id) else {
            return false;
        };
        patch.apply_to(task);
        task.updated_at = now;
        self.reposition(id);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let task = self.tasks.remove(id)?;
        if let Some(section) = self.membership.remove(id) {
            if let Some(list) = self.sections.get_mut(&section) {
                list.retain(|member| member != id);
                if list.is_empty() {
                    self.sections.remove(&section);
                }
            }
        }
        Some(task)
    }

    /// Sets order values from a snapshot, for tasks still in that section.
    /// Returns how many tasks changed.
    pub fn restore_snapshot(&mut self, snapshot: &SectionSnapshot) -> usize {
        let mut changed = 0;
        for (id, order) in &snapshot.entries {
            if self.membership.get(id) != Some(&snapshot.section) {
                continue;
            }
            if let Some(task) = self.tasks.get_mut(id) {
                if task.order != *order {
                    task.order = *order;
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            self.sort_section(&snapshot.section);
        }
        changed
    }

    pub fn snapshot(&self, section: &SectionId) -> SectionSnapshot {
        SectionSnapshot {
            section: section.clone(),
            entries: self.section(section).iter().filter_map(|id| self.tasks.get(id)).map(|t| (t.id.clone(), t.order)).collect(),
        }
    }

    fn reposition(&mut self, id: &str) {
        let Some(task) = self.tasks.get(id) else {
            return;
        };
        let next = classify(task);
        let previous = self.membership.insert(id.to_string(), next.clone());

        if let Some(previous) = previous.filter(|p| *p != next) {
            if let Some(list) = self.sections.get_mut(&previous) {
                list.retain(|member| member != id);
                if list.is_empty() {
                    self.sections.remove(&previous);
                }
            }
        }

        let list = self.sections.entry(next.clone()).or_default();
        if !list.iter().any(|member| member == id) {
            list.push(id.to_string());
        }
        self.sort_section(&next);
    }

    fn rebuild_all(&mut self) {
        self.membership.clear();
        self.sections.clear();
        for (id, task) in &self.tasks {
            let section = classify(task);
            self.membership.insert(id.clone(), section.clone());
            self.sections.entry(section).or_default().push(id.clone());
        }
        let keys: Vec<SectionId> = self.sections.keys().cloned().collect();
        for section in keys {
            self.sort_section(&section);
        }
    }

    fn sort_section(&mut self, section: &SectionId) {
        let Some(list) = self.sections.get_mut(section) else {
            return;
        };
        let tasks = &self.tasks;
        list.sort_by(|a, b| match (tasks.get(a), tasks.get(b)) {
            (Some(x), Some(y)) => x.order.cmp(&y.order).then(x.created_at.cmp(&y.created_at)).then(x.id.cmp(&y.id)),
            _ => a.cmp(b),
        });

        let has_duplicates = list.windows(2).any(|pair| match (tasks.get(&pair[0]), tasks.get(&pair[1])) {
            (Some(x), Some(y)) => x.order == y.order,
            _ => false,
        });
        if has_duplicates {
            tracing::debug!(%section, "renumbering section with duplicate order values");
            let ids = list.clone();
            for (index, id) in ids.iter().enumerate() {
                if let Some(task) = self.tasks.get_mut(id) {
                    task.order = index as i64 + 1;
                }
            }
        }
    }
}

impl SectionSource for Board {
    fn section_snapshot(&self, section: &SectionId) -> SectionSnapshot {
        self.snapshot(section)
    }
}
