//! Task creation, flag toggles, field edits and deletion.

use super::backend::open_store;
use crate::libs::messages::Message;
use crate::libs::task::{FieldEdit, TaskStatus};
use crate::{msg_bail_anyhow, msg_success, msg_warning};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::Args;

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Task title
    #[arg(required = true, num_args = 1..)]
    title: Vec<String>,
}

#[derive(Debug, Args)]
pub struct IdArgs {
    /// Task id or a unique prefix of it
    id: String,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Task id or a unique prefix of it
    id: String,
    #[arg(short, long)]
    title: Option<String>,
    /// YYYY-MM-DD or an RFC 3339 timestamp
    #[arg(short, long, conflicts_with = "clear_deadline")]
    deadline: Option<String>,
    #[arg(short, long, conflicts_with = "clear_amount")]
    amount: Option<f64>,
    #[arg(short, long, conflicts_with = "clear_link")]
    link: Option<String>,
    #[arg(long)]
    clear_deadline: bool,
    #[arg(long)]
    clear_amount: bool,
    #[arg(long)]
    clear_link: bool,
}

/// Which flag a toggle command flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Complete,
    Important,
    Urgent,
    Waiting,
}

pub async fn add(args: AddArgs) -> Result<()> {
    let (_, store) = open_store().await?;
    let (task, handle) = store.create_task(&args.title.join(" "))?;
    let row = handle.wait().await?;

    msg_success!(Message::TaskCreated(row.title, task.id));
    Ok(())
}

pub async fn toggle(args: IdArgs, toggle: Toggle) -> Result<()> {
    let (_, store) = open_store().await?;
    let task_id = store.resolve_id(&args.id)?;
    let handle = match toggle {
        Toggle::Complete => store.toggle_complete(&task_id)?,
        Toggle::Important => store.toggle_important(&task_id)?,
        Toggle::Urgent => store.toggle_urgent(&task_id)?,
        Toggle::Waiting => store.toggle_waiting(&task_id)?,
    };
    handle.wait().await?;

    let Some(task) = store.get_task(&task_id) else {
        return Ok(());
    };
    let title = task.title.clone();
    let message = match toggle {
        Toggle::Complete if task.completed => Message::TaskCompleted(title),
        Toggle::Complete => Message::TaskReopened(title),
        Toggle::Important if task.important => Message::TaskMarkedImportant(title),
        Toggle::Important => Message::TaskUnmarkedImportant(title),
        Toggle::Urgent if task.urgent => Message::TaskMarkedUrgent(title),
        Toggle::Urgent => Message::TaskUnmarkedUrgent(title),
        Toggle::Waiting if task.status == TaskStatus::Pending => Message::TaskWaiting(title),
        Toggle::Waiting => Message::TaskNotWaiting(title),
    };
    msg_success!(message);
    Ok(())
}

pub async fn edit(args: EditArgs) -> Result<()> {
    let edit = FieldEdit {
        title: args.title,
        deadline: match (args.deadline, args.clear_deadline) {
            (Some(value), _) => Some(Some(parse_deadline(&value)?)),
            (None, true) => Some(None),
            (None, false) => None,
        },
        amount: if args.clear_amount { Some(None) } else { args.amount.map(Some) },
        link: if args.clear_link { Some(None) } else { args.link.map(Some) },
    };
    if edit == FieldEdit::default() {
        msg_warning!(Message::NothingToEdit);
        return Ok(());
    }

    let (_, store) = open_store().await?;
    let task_id = store.resolve_id(&args.id)?;
    store.edit(&task_id, edit)?.wait().await?;

    if let Some(task) = store.get_task(&task_id) {
        msg_success!(Message::TaskUpdated(task.title));
    }
    Ok(())
}

pub async fn delete(args: IdArgs) -> Result<()> {
    let (_, store) = open_store().await?;
    let task_id = store.resolve_id(&args.id)?;
    let task = store.delete(&task_id)?.wait().await?;

    msg_success!(Message::TaskDeleted(task.title));
    Ok(())
}

/// Accepts a calendar date (midnight UTC) or a full RFC 3339 timestamp.
fn parse_deadline(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    match DateTime::parse_from_rfc3339(value) {
        Ok(timestamp) => Ok(timestamp.with_timezone(&Utc)),
        Err(_) => msg_bail_anyhow!(Message::InvalidDeadline(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlines_accept_dates_and_timestamps() {
        assert_eq!(parse_deadline("2026-03-01").unwrap().to_rfc3339(), "2026-03-01T00:00:00+00:00");
        assert_eq!(parse_deadline("2026-03-01T10:00:00+02:00").unwrap().to_rfc3339(), "2026-03-01T08:00:00+00:00");
        assert!(parse_deadline("next friday").is_err());
    }
}
