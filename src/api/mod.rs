//! Remote collaborators.
//!
//! The task store persists through a [`RemoteStore`]: a row-oriented backend
//! that also pushes coarse "something changed for this user" notifications.
//! Three backends ship with the crate:
//!
//! - [`memory::MemoryRemote`]: in-process, with failure and latency injection
//! - [`rest::RestRemote`]: PostgREST-style HTTP endpoint, polled for changes
//! - [`crate::db::tasks::SqliteRemote`]: local SQLite file used by the CLI
//!
//! Attachments and display preferences are separate, read-mostly
//! collaborators; see [`attachments`] and [`preferences`].

use crate::libs::error::RemoteError;
use crate::libs::task::{Task, TaskPatch};
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub mod attachments;
pub mod memory;
pub mod preferences;
pub mod rest;

pub use attachments::{AttachmentStore, MemoryAttachments, NoAttachments};
pub use memory::MemoryRemote;
pub use preferences::{DisplayPreferences, StaticPreferences};
pub use rest::RestRemote;

/// Authoritative task persistence.
///
/// Implementations may write `async fn` for each method; the returned futures
/// must be `Send` so writes can run on spawned tasks.
pub trait RemoteStore: Send + Sync + 'static {
    fn read_tasks(&self, user_id: &str) -> impl Future<Output = Result<Vec<Task>, RemoteError>> + Send;

    fn insert_task(&self, user_id: &str, task: &Task) -> impl Future<Output = Result<Task, RemoteError>> + Send;

    fn update_task(&self, task_id: &str, patch: &TaskPatch) -> impl Future<Output = Result<Task, RemoteError>> + Send;

    fn delete_task(&self, task_id: &str) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Starts delivering change notifications for `user_id`. Notifications
    /// carry no payload; the receiver is expected to re-read.
    fn subscribe_to_changes(&self, user_id: &str) -> Subscription;
}

/// Handle for a change-notification stream. Dropping it stops any
/// background poller that feeds it.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<()>,
    poller: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(receiver: mpsc::UnboundedReceiver<()>) -> Self {
        Self { receiver, poller: None }
    }

    pub fn with_poller(receiver: mpsc::UnboundedReceiver<()>, poller: JoinHandle<()>) -> Self {
        Self { receiver, poller: Some(poller) }
    }

    /// Waits for the next notification. Returns false once the source is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.recv().await.is_some()
    }

    /// Discards notifications that are already queued, returning how many.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while self.receiver.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}
