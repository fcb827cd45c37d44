//! Attachment collaborator. Attachment ids are opaque to the store; it only
//! forwards blobs and triggers deletion when a task is deleted.

use crate::libs::error::RemoteError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

pub trait AttachmentStore: Send + Sync + 'static {
    fn get_attachments(&self, task_id: &str) -> impl Future<Output = Result<Vec<String>, RemoteError>> + Send;

    /// Stores `blob` for `task_id` and returns the new attachment id.
    fn add_attachment(&self, task_id: &str, blob: Vec<u8>) -> impl Future<Output = Result<String, RemoteError>> + Send;

    fn delete_attachment(&self, attachment_id: &str) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// Backend without attachment support.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAttachments;

impl AttachmentStore for NoAttachments {
    async fn get_attachments(&self, _task_id: &str) -> Result<Vec<String>, RemoteError> {
        Ok(Vec::new())
    }

    async fn add_attachment(&self, _task_id: &str, _blob: Vec<u8>) -> Result<String, RemoteError> {
        Err(RemoteError::Rejected {
            status: 501,
            message: "attachments are not supported by this backend".into(),
        })
    }

    async fn delete_attachment(&self, _attachment_id: &str) -> Result<(), RemoteError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Blobs {
    by_id: HashMap<String, (String, Vec<u8>)>,
    deleted: Vec<String>,
    next_id: u64,
}

/// In-memory attachment store that remembers deletions.
#[derive(Debug, Clone, Default)]
pub struct MemoryAttachments {
    blobs: Arc<Mutex<Blobs>>,
}

impl MemoryAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.blobs.lock().deleted.clone()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AttachmentStore for MemoryAttachments {
    async fn get_attachments(&self, task_id: &str) -> Result<Vec<String>, RemoteError> {
        let blobs = self.blobs.lock();
        let mut ids: Vec<String> = blobs.by_id.iter().filter(|(_, (owner, _))| owner == task_id).map(|(id, _)| id.clone()).collect();
        ids.sort();
        Ok(ids)
    }

    async fn add_attachment(&self, task_id: &str, blob: Vec<u8>) -> Result<String, RemoteError> {
        let mut blobs = self.blobs.lock();
        blobs.next_id += 1;
        let id = format!("att-{}", blobs.next_id);
        blobs.by_id.insert(id.clone(), (task_id.to_string(), blob));
        Ok(id)
    }

    async fn delete_attachment(&self, attachment_id: &str) -> Result<(), RemoteError> {
        let mut blobs = self.blobs.lock();
        blobs.by_id.remove(attachment_id).ok_or_else(|| RemoteError::NotFound(attachment_id.to_string()))?;
        blobs.deleted.push(attachment_id.to_string());
        Ok(())
    }
}
