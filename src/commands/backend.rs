//! Backend selection for the CLI.

use crate::api::{RemoteStore, RestRemote, Subscription};
use crate::db::tasks::SqliteRemote;
use crate::libs::config::Config;
use crate::libs::error::RemoteError;
use crate::libs::store::{StoreOptions, TaskStore};
use crate::libs::task::{Task, TaskPatch};
use crate::libs::messages::Message;
use crate::msg_debug;
use anyhow::Result;

/// The remote store the config points at: a REST endpoint when one is
/// configured, the local database otherwise.
pub enum Backend {
    Sqlite(SqliteRemote),
    Rest(RestRemote),
}

impl Backend {
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = match &config.remote {
            Some(remote) => Backend::Rest(RestRemote::new(remote, config.sync.poll_interval())),
            None => Backend::Sqlite(SqliteRemote::new()?.with_poll_interval(config.sync.poll_interval())),
        };
        msg_debug!(Message::UsingBackend(backend.name().to_string()));
        Ok(backend)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Sqlite(_) => "sqlite",
            Backend::Rest(_) => "rest",
        }
    }
}

impl RemoteStore for Backend {
    async fn read_tasks(&self, user_id: &str) -> Result<Vec<Task>, RemoteError> {
        match self {
            Backend::Sqlite(remote) => remote.read_tasks(user_id).await,
            Backend::Rest(remote) => remote.read_tasks(user_id).await,
        }
    }

    async fn insert_task(&self, user_id: &str, task: &Task) -> Result<Task, RemoteError> {
        match self {
            Backend::Sqlite(remote) => remote.insert_task(user_id, task).await,
            Backend::Rest(remote) => remote.insert_task(user_id, task).await,
        }
    }

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task, RemoteError> {
        match self {
            Backend::Sqlite(remote) => remote.update_task(task_id, patch).await,
            Backend::Rest(remote) => remote.update_task(task_id, patch).await,
        }
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), RemoteError> {
        match self {
            Backend::Sqlite(remote) => remote.delete_task(task_id).await,
            Backend::Rest(remote) => remote.delete_task(task_id).await,
        }
    }

    fn subscribe_to_changes(&self, user_id: &str) -> Subscription {
        match self {
            Backend::Sqlite(remote) => remote.subscribe_to_changes(user_id),
            Backend::Rest(remote) => remote.subscribe_to_changes(user_id),
        }
    }
}

/// Reads the config, opens its backend and loads the user's tasks.
pub async fn open_store() -> Result<(Config, TaskStore<Backend>)> {
    let config = Config::read()?;
    let backend = Backend::from_config(&config)?;
    let store = TaskStore::new(backend, StoreOptions::from(&config));
    store.load().await?;
    Ok((config, store))
}
