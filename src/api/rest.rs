//! PostgREST-style HTTP backend.
//!
//! Rows live in `{api_url}/rest/v1/{table}` and are filtered by a `user_id`
//! column. The endpoint has no push channel, so change notifications come
//! from a poller that compares a cheap fingerprint of the user's rows.

use super::{RemoteStore, Subscription};
use crate::libs::config::RemoteConfig;
use crate::libs::error::RemoteError;
use crate::libs::task::{Task, TaskPatch};
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct RestRemote {
    client: Client,
    config: RemoteConfig,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct RowStamp {
    updated_at: DateTime<Utc>,
}

/// Row count and newest `updated_at`; changes whenever a row is written,
/// inserted or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    rows: usize,
    newest: Option<DateTime<Utc>>,
}

impl RestRemote {
    pub fn new(config: &RemoteConfig, poll_interval: Duration) -> Self {
        Self {
            client: Client::new(),
            config: config.clone(),
            poll_interval,
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.config.api_url.trim_end_matches('/'), self.config.table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .header("Prefer", "return=representation")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self.authorize(request).send().await.map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        if status.as_u16() == 404 {
            return Err(RemoteError::NotFound(message));
        }
        Err(RemoteError::Rejected { status: status.as_u16(), message })
    }

    async fn single_row(response: Response, task_id: &str) -> Result<Task, RemoteError> {
        let rows: Vec<Task> = response.json().await.map_err(|e| RemoteError::Malformed(e.to_string()))?;
        rows.into_iter().next().ok_or_else(|| RemoteError::NotFound(task_id.to_string()))
    }

    async fn fingerprint(&self, user_id: &str) -> Result<Fingerprint, RemoteError> {
        let request = self.client.get(self.table_url()).query(&[("select", "updated_at".to_string()), ("user_id", format!("eq.{}", user_id))]);
        let stamps: Vec<RowStamp> = self.send(request).await?.json().await.map_err(|e| RemoteError::Malformed(e.to_string()))?;
        Ok(Fingerprint {
            rows: stamps.len(),
            newest: stamps.iter().map(|s| s.updated_at).max(),
        })
    }
}

impl RemoteStore for RestRemote {
    async fn read_tasks(&self, user_id: &str) -> Result<Vec<Task>, RemoteError> {
        let request = self.client.get(self.table_url()).query(&[("user_id", format!("eq.{}", user_id)), ("order", "order.asc".to_string())]);
        self.send(request).await?.json().await.map_err(|e| RemoteError::Malformed(e.to_string()))
    }

    async fn insert_task(&self, user_id: &str, task: &Task) -> Result<Task, RemoteError> {
        let mut body = serde_json::to_value(task).map_err(|e| RemoteError::Malformed(e.to_string()))?;
        if let Some(object) = body.as_object_mut() {
            object.insert("user_id".into(), serde_json::Value::String(user_id.to_string()));
        }
        let response = self.send(self.client.post(self.table_url()).json(&body)).await?;
        Self::single_row(response, &task.id).await
    }

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task, RemoteError> {
        let request = self.client.patch(self.table_url()).query(&[("id", format!("eq.{}", task_id))]).json(patch);
        let response = self.send(request).await?;
        Self::single_row(response, task_id).await
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), RemoteError> {
        let request = self.client.delete(self.table_url()).query(&[("id", format!("eq.{}", task_id))]);
        self.send(request).await?;
        Ok(())
    }

    fn subscribe_to_changes(&self, user_id: &str) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let remote = self.clone();
        let user_id = user_id.to_string();

        let poller = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(remote.poll_interval);
            let mut last: Option<Fingerprint> = None;
            loop {
                ticker.tick().await;
                match remote.fingerprint(&user_id).await {
                    Ok(current) => {
                        let changed = last.is_some_and(|previous| previous != current);
                        last = Some(current);
                        if changed && sender.send(()).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "polling remote tasks failed"),
                }
                if sender.is_closed() {
                    break;
                }
            }
        });

        Subscription::with_poller(receiver, poller)
    }
}
