//! Typed errors for task organization and synchronization.
//!
//! The taxonomy has three user-relevant kinds:
//!
//! - [`ValidationError`]: a structural rule would be violated (Big Three at
//!   capacity, unknown task or section). Raised before anything is mutated.
//! - [`NetworkError`]: a persistence call failed or timed out. The optimistic
//!   state has been rolled back by the time the caller sees it.
//! - [`ConflictError`]: remote state disagrees with a pending local change.
//!   Resolved by field-level merge and reported, never returned as a failure
//!   of a local operation.
//!
//! [`RemoteError`] is what remote collaborators return; the mutator turns it
//! into a [`NetworkError`].

use crate::libs::section::{SectionId, BIG_THREE_LIMIT};
use crate::libs::task::TaskId;
use std::time::Duration;
use thiserror::Error;

/// Structural rule violations, detected before any mutation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Big Three already has {limit} active tasks")]
    BigThreeFull { limit: usize },

    #[error("task not found: {0}")]
    UnknownTask(TaskId),

    #[error("unknown section: {0}")]
    UnknownSection(String),

    #[error("task {task_id} is not in section {section}")]
    NotInSection { task_id: TaskId, section: SectionId },

    #[error("task id prefix '{0}' matches more than one task")]
    AmbiguousTask(String),

    #[error("task title cannot be empty")]
    EmptyTitle,

    #[error("tasks cannot be placed in section {0} by a move")]
    UnreachableSection(SectionId),
}

impl ValidationError {
    pub fn big_three_full() -> Self {
        ValidationError::BigThreeFull { limit: BIG_THREE_LIMIT }
    }
}

/// Errors reported by a remote collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("remote store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("row not found on remote: {0}")]
    NotFound(String),

    #[error("malformed remote payload: {0}")]
    Malformed(String),
}

/// Persistence failure as seen by callers of local operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("saving failed after {attempts} attempt(s): {source}")]
    Failed {
        attempts: u32,
        #[source]
        source: RemoteError,
    },

    #[error("saving timed out after {0:?}")]
    Timeout(Duration),

    #[error("loading tasks failed: {0}")]
    Read(#[source] RemoteError),
}

/// Disagreements between remote state and pending local intent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    #[error("task {task_id} changed remotely while a local change was pending ({fields})")]
    ConcurrentEdit { task_id: TaskId, fields: String },

    #[error("remote change to task {task_id} would exceed the Big Three limit; kept local priority")]
    Capacity { task_id: TaskId },
}

/// Umbrella error returned by every public store operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error("background persistence task stopped: {0}")]
    Interrupted(String),
}

impl TaskError {
    /// True when retrying the same operation later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Network(_) | TaskError::Interrupted(_))
    }
}
