//! Store change notifications, broadcast to anything that re-renders.

use crate::libs::error::{ConflictError, TaskError};
use crate::libs::sync::MergeReport;
use crate::libs::task::TaskId;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Full replace from the remote finished.
    Loaded { tasks: usize },
    /// Full replace after a failed batched write.
    Reloaded { tasks: usize },
    /// A local change was applied and is being persisted.
    Changed { task_ids: Vec<TaskId> },
    Confirmed { task_ids: Vec<TaskId> },
    /// Persistence failed; listed tasks were reverted.
    RolledBack { task_ids: Vec<TaskId>, error: TaskError },
    Merged(MergeReport),
    Conflict(ConflictError),
    SyncFailed(TaskError),
}

impl StoreEvent {
    /// True for events that change what `get_section` returns.
    pub fn alters_sections(&self) -> bool {
        match self {
            StoreEvent::Merged(report) => !report.is_empty(),
            StoreEvent::Conflict(_) | StoreEvent::SyncFailed(_) => false,
            StoreEvent::RolledBack { task_ids, .. } => !task_ids.is_empty(),
            _ => true,
        }
    }
}
