//! SQLite-backed remote store.
//!
//! Used by the CLI when no HTTP endpoint is configured. The database file is
//! the authoritative copy: each CLI invocation loads from it and writes
//! through it exactly as it would to a server. Changes made by this process
//! are announced to subscribers directly; changes committed by other
//! processes (another `tasklane` invocation) are picked up by polling
//! `PRAGMA data_version`.

use super::db::Db;
use crate::api::{RemoteStore, Subscription};
use crate::libs::error::RemoteError;
use crate::libs::section::SectionId;
use crate::libs::task::{Task, TaskPatch, TaskStatus};
use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const TASK_COLUMNS: &str =
    "id, title, completed, important, urgent, status, section, sort_order, deadline, amount, link, attachments, created_at, updated_at";
const SELECT_USER_TASKS: &str = "SELECT id, title, completed, important, urgent, status, section, sort_order, deadline, amount, link, attachments, created_at, updated_at FROM tasks WHERE user_id = ?1 ORDER BY sort_order, id";
const SELECT_TASK: &str = "SELECT id, title, completed, important, urgent, status, section, sort_order, deadline, amount, link, attachments, created_at, updated_at FROM tasks WHERE id = ?1";
const SELECT_TASK_USER: &str = "SELECT user_id FROM tasks WHERE id = ?1";
const UPDATE_TASK: &str = "UPDATE tasks SET title = ?2, completed = ?3, important = ?4, urgent = ?5, status = ?6, section = ?7, sort_order = ?8, deadline = ?9, amount = ?10, link = ?11, attachments = ?12, updated_at = ?13 WHERE id = ?1";
const DELETE_TASK: &str = "DELETE FROM tasks WHERE id = ?1";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

type Subscribers = Vec<(String, mpsc::UnboundedSender<()>)>;

#[derive(Clone)]
pub struct SqliteRemote {
    conn: Arc<Mutex<Connection>>,
    subscribers: Arc<Mutex<Subscribers>>,
    poll_interval: Duration,
}

impl SqliteRemote {
    /// Opens the database in the data directory.
    pub fn new() -> Result<Self> {
        Ok(Self::from_db(Db::new()?))
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_db(Db::open(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_db(Db::in_memory()?))
    }

    fn from_db(db: Db) -> Self {
        Self {
            conn: Arc::new(Mutex::new(db.conn)),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// How often subscriptions check for commits by other processes.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn notify(&self, user_id: &str) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|(_, sender)| !sender.is_closed());
        for (user, sender) in subscribers.iter() {
            if user == user_id {
                let _ = sender.send(());
            }
        }
    }

    fn fetch(conn: &Connection, task_id: &str) -> Result<Option<Task>, RemoteError> {
        let raw = conn.query_row(SELECT_TASK, params![task_id], RawTask::from_row).optional().map_err(storage_error)?;
        raw.map(RawTask::into_task).transpose()
    }
}

impl RemoteStore for SqliteRemote {
    async fn read_tasks(&self, user_id: &str) -> Result<Vec<Task>, RemoteError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_USER_TASKS).map_err(storage_error)?;
        let raw_rows = stmt
            .query_map(params![user_id], RawTask::from_row)
            .map_err(storage_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage_error)?;

        raw_rows.into_iter().map(RawTask::into_task).collect()
    }

    async fn insert_task(&self, user_id: &str, task: &Task) -> Result<Task, RemoteError> {
        let mut row = task.clone();
        row.updated_at = Utc::now();
        {
            let conn = self.conn.lock();
            if Self::fetch(&conn, &row.id)?.is_some() {
                return Err(RemoteError::Rejected {
                    status: 409,
                    message: format!("duplicate id {}", row.id),
                });
            }
            conn.execute(
                &format!("INSERT INTO tasks (user_id, {}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)", TASK_COLUMNS),
                params![
                    user_id,
                    row.id,
                    row.title,
                    row.completed,
                    row.important,
                    row.urgent,
                    status_name(row.status),
                    row.section.as_ref().map(|s| s.to_string()),
                    row.order,
                    row.deadline,
                    row.amount,
                    row.link,
                    attachments_json(&row.attachments)?,
                    row.created_at,
                    row.updated_at,
                ],
            )
            .map_err(storage_error)?;
        }
        tracing::debug!(task_id = %row.id, "inserted task row");
        self.notify(user_id);
        Ok(row)
    }

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task, RemoteError> {
        let (user_id, row) = {
            let conn = self.conn.lock();
            let mut row = Self::fetch(&conn, task_id)?.ok_or_else(|| RemoteError::NotFound(task_id.to_string()))?;
            let user_id: String = conn.query_row(SELECT_TASK_USER, params![task_id], |r| r.get(0)).map_err(storage_error)?;

            patch.apply_to(&mut row);
            // Stamps must grow even when two writes land within the clock's resolution.
            row.updated_at = Utc::now().max(row.updated_at + TimeDelta::microseconds(1));
            conn.execute(
                UPDATE_TASK,
                params![
                    row.id,
                    row.title,
                    row.completed,
                    row.important,
                    row.urgent,
                    status_name(row.status),
                    row.section.as_ref().map(|s| s.to_string()),
                    row.order,
                    row.deadline,
                    row.amount,
                    row.link,
                    attachments_json(&row.attachments)?,
                    row.updated_at,
                ],
            )
            .map_err(storage_error)?;
            (user_id, row)
        };
        tracing::debug!(task_id, fields = %patch.fields(), "updated task row");
        self.notify(&user_id);
        Ok(row)
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), RemoteError> {
        let user_id = {
            let conn = self.conn.lock();
            let user_id: Option<String> = conn
                .query_row(SELECT_TASK_USER, params![task_id], |r| r.get(0))
                .optional()
                .map_err(storage_error)?;
            let user_id = user_id.ok_or_else(|| RemoteError::NotFound(task_id.to_string()))?;
            conn.execute(DELETE_TASK, params![task_id]).map_err(storage_error)?;
            user_id
        };
        tracing::debug!(task_id, "deleted task row");
        self.notify(&user_id);
        Ok(())
    }

    fn subscribe_to_changes(&self, user_id: &str) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().push((user_id.to_string(), sender.clone()));

        let conn = self.conn.clone();
        let poll_interval = self.poll_interval;
        let poller = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            let mut last_version: Option<i64> = None;
            loop {
                ticker.tick().await;
                let version = conn.lock().query_row("PRAGMA data_version", [], |row| row.get::<_, i64>(0));
                let version = match version {
                    Ok(version) => version,
                    Err(error) => {
                        tracing::warn!(%error, "polling database version failed");
                        continue;
                    }
                };
                if last_version.is_some_and(|last| last != version) && sender.send(()).is_err() {
                    break;
                }
                last_version = Some(version);
            }
        });

        Subscription::with_poller(receiver, poller)
    }
}

/// Column values as stored, before enum and JSON decoding.
struct RawTask {
    id: String,
    title: String,
    completed: bool,
    important: bool,
    urgent: bool,
    status: String,
    section: Option<String>,
    order: i64,
    deadline: Option<DateTime<Utc>>,
    amount: Option<f64>,
    link: Option<String>,
    attachments: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RawTask {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawTask {
            id: row.get(0)?,
            title: row.get(1)?,
            completed: row.get(2)?,
            important: row.get(3)?,
            urgent: row.get(4)?,
            status: row.get(5)?,
            section: row.get(6)?,
            order: row.get(7)?,
            deadline: row.get(8)?,
            amount: row.get(9)?,
            link: row.get(10)?,
            attachments: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn into_task(self) -> Result<Task, RemoteError> {
        let status = match self.status.as_str() {
            "inbox" => TaskStatus::Inbox,
            "pending" => TaskStatus::Pending,
            other => return Err(RemoteError::Malformed(format!("task {}: unknown status '{}'", self.id, other))),
        };
        let section = self
            .section
            .map(|s| s.parse::<SectionId>())
            .transpose()
            .map_err(|e| RemoteError::Malformed(format!("task {}: {}", self.id, e)))?;
        let attachments: Vec<String> =
            serde_json::from_str(&self.attachments).map_err(|e| RemoteError::Malformed(format!("task {}: attachments: {}", self.id, e)))?;

        Ok(Task {
            id: self.id,
            title: self.title,
            completed: self.completed,
            important: self.important,
            urgent: self.urgent,
            status,
            section,
            order: self.order,
            deadline: self.deadline,
            amount: self.amount,
            link: self.link,
            attachments,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn status_name(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Inbox => "inbox",
        TaskStatus::Pending => "pending",
    }
}

fn attachments_json(attachments: &[String]) -> Result<String, RemoteError> {
    serde_json::to_string(attachments).map_err(|e| RemoteError::Malformed(e.to_string()))
}

fn storage_error(error: rusqlite::Error) -> RemoteError {
    RemoteError::Unavailable(error.to_string())
}
