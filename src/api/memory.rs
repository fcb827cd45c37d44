//! In-process remote store.
//!
//! Behaves like a hosted table: the server stamps `updated_at` on every write
//! and notifies every subscriber of the owning user. Failures and latency can
//! be injected, which is what the store tests lean on.

use super::{RemoteStore, Subscription};
use crate::libs::error::RemoteError;
use crate::libs::task::{Task, TaskId, TaskPatch};
use chrono::{DateTime, Duration as TimeDelta, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<TaskId, (String, Task)>,
    subscribers: Vec<(String, mpsc::UnboundedSender<()>)>,
    fail_next: u32,
    failing: HashSet<TaskId>,
    offline: bool,
    latency: Option<Duration>,
    update_calls: usize,
    last_stamp: Option<DateTime<Utc>>,
}

impl Inner {
    /// Strictly increasing server timestamp.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + TimeDelta::milliseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    fn check_available(&mut self) -> Result<(), RemoteError> {
        if self.offline {
            return Err(RemoteError::Unavailable("remote is offline".into()));
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(RemoteError::Unavailable("injected failure".into()));
        }
        Ok(())
    }

    fn notify(&mut self, user_id: &str) {
        self.subscribers.retain(|(user, sender)| user != user_id || sender.send(()).is_ok());
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores rows for `user_id` as-is, without stamping or notifying.
    pub fn seed(&self, user_id: &str, rows: Vec<Task>) {
        let mut inner = self.inner.lock();
        for row in rows {
            inner.rows.insert(row.id.clone(), (user_id.to_string(), row));
        }
    }

    /// Fails the next `count` calls with [`RemoteError::Unavailable`].
    pub fn fail_next(&self, count: u32) {
        self.inner.lock().fail_next = count;
    }

    /// Fails every update of `task_id` until [`heal_task`](Self::heal_task).
    pub fn fail_task(&self, task_id: &str) {
        self.inner.lock().failing.insert(task_id.to_string());
    }

    pub fn heal_task(&self, task_id: &str) {
        self.inner.lock().failing.remove(task_id);
    }

    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// Delays every write acknowledgement. The write itself lands at once.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.inner.lock().latency = latency;
    }

    pub fn update_calls(&self) -> usize {
        self.inner.lock().update_calls
    }

    pub fn row(&self, task_id: &str) -> Option<Task> {
        self.inner.lock().rows.get(task_id).map(|(_, task)| task.clone())
    }

    /// Changes a row the way another session would: stamped by the server and
    /// announced to subscribers.
    pub fn edit_remotely(&self, task_id: &str, edit: impl FnOnce(&mut Task)) -> Option<Task> {
        let mut inner = self.inner.lock();
        let stamp = inner.stamp();
        let (user_id, row) = inner.rows.get_mut(task_id)?;
        edit(row);
        row.updated_at = stamp;
        let (user_id, row) = (user_id.clone(), row.clone());
        inner.notify(&user_id);
        Some(row)
    }

    /// Inserts a row as another session would.
    pub fn insert_remotely(&self, user_id: &str, mut task: Task) -> Task {
        let mut inner = self.inner.lock();
        task.updated_at = inner.stamp();
        inner.rows.insert(task.id.clone(), (user_id.to_string(), task.clone()));
        inner.notify(user_id);
        task
    }

    async fn acknowledge(&self) {
        let latency = self.inner.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl RemoteStore for MemoryRemote {
    async fn read_tasks(&self, user_id: &str) -> Result<Vec<Task>, RemoteError> {
        let mut inner = self.inner.lock();
        inner.check_available()?;
        let mut rows: Vec<Task> = inner.rows.values().filter(|(user, _)| user == user_id).map(|(_, task)| task.clone()).collect();
        rows.sort_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn insert_task(&self, user_id: &str, task: &Task) -> Result<Task, RemoteError> {
        let row = {
            let mut inner = self.inner.lock();
            inner.check_available()?;
            if inner.rows.contains_key(&task.id) {
                return Err(RemoteError::Rejected {
                    status: 409,
                    message: format!("duplicate id {}", task.id),
                });
            }
            let mut row = task.clone();
            row.updated_at = inner.stamp();
            inner.rows.insert(row.id.clone(), (user_id.to_string(), row.clone()));
            inner.notify(user_id);
            row
        };
        self.acknowledge().await;
        Ok(row)
    }

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task, RemoteError> {
        let row = {
            let mut inner = self.inner.lock();
            inner.update_calls += 1;
            inner.check_available()?;
            if inner.failing.contains(task_id) {
                return Err(RemoteError::Unavailable(format!("updates of {task_id} are failing")));
            }
            let stamp = inner.stamp();
            let (user_id, row) = inner.rows.get_mut(task_id).ok_or_else(|| RemoteError::NotFound(task_id.to_string()))?;
            patch.apply_to(row);
            row.updated_at = stamp;
            let (user_id, row) = (user_id.clone(), row.clone());
            inner.notify(&user_id);
            row
        };
        self.acknowledge().await;
        Ok(row)
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), RemoteError> {
        {
            let mut inner = self.inner.lock();
            inner.check_available()?;
            let (user_id, _) = inner.rows.remove(task_id).ok_or_else(|| RemoteError::NotFound(task_id.to_string()))?;
            inner.notify(&user_id);
        }
        self.acknowledge().await;
        Ok(())
    }

    fn subscribe_to_changes(&self, user_id: &str) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner.lock().subscribers.push((user_id.to_string(), sender));
        Subscription::new(receiver)
    }
}
