//! Moving a task to another section and reordering inside one.

use super::backend::open_store;
use crate::api::{AttachmentStore, RemoteStore};
use crate::libs::error::ValidationError;
use crate::libs::messages::Message;
use crate::libs::section::SectionId;
use crate::libs::store::TaskStore;
use crate::msg_success;
use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct MoveArgs {
    /// Task id or a unique prefix of it
    id: String,
    /// Target section
    #[arg(short, long)]
    to: SectionId,
    /// Insert before this task instead of at the end
    #[arg(short, long)]
    before: Option<String>,
}

#[derive(Debug, Args)]
pub struct ReorderArgs {
    /// Task id or a unique prefix of it
    id: String,
    /// New 1-based position inside the task's section
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    index: u64,
}

pub async fn move_cmd(args: MoveArgs) -> Result<()> {
    let (_, store) = open_store().await?;
    let task_id = store.resolve_id(&args.id)?;
    let before = args.before.as_deref().map(|prefix| store.resolve_id(prefix)).transpose()?;
    let title = store.get_task(&task_id).map(|t| t.title).unwrap_or_default();

    move_into(&store, &task_id, &args.to, before.as_deref()).await?;
    msg_success!(Message::TaskMoved(title, args.to.title()));
    Ok(())
}

/// Moves a task into `to` before `before`, or to the end of `to`. Inside the
/// task's own section that is a reorder.
async fn move_into<R: RemoteStore, A: AttachmentStore>(store: &TaskStore<R, A>, task_id: &str, to: &SectionId, before: Option<&str>) -> Result<()> {
    let from = store.section_of(task_id).ok_or_else(|| ValidationError::UnknownTask(task_id.to_string()))?;
    store.move_task(task_id, &from, to, before)?.wait().await?;
    Ok(())
}

pub async fn reorder(args: ReorderArgs) -> Result<()> {
    let (_, store) = open_store().await?;
    let task_id = store.resolve_id(&args.id)?;
    let section = store.section_of(&task_id).ok_or_else(|| ValidationError::UnknownTask(task_id.clone()))?;
    let index = args.index as usize - 1;

    store.reorder(&section, &task_id, index)?.wait().await?;

    let position = store.get_section(&section).iter().position(|t| t.id == task_id).map_or(args.index as usize, |p| p + 1);
    let title = store.get_task(&task_id).map(|t| t.title).unwrap_or_default();
    msg_success!(Message::TaskReordered(title, position));
    Ok(())
}
