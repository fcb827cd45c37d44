use crate::libs::messages::Message;
use crate::libs::section::SectionId;
use crate::libs::store::TaskView;
use crate::libs::task::Task;
use crate::msg_print;
use anyhow::Result;
use prettytable::{format, row, Table};

const SHORT_ID_LEN: usize = 8;

pub struct View {}

impl View {
    /// Prints every section with a header and a task table.
    pub fn board(sections: &[(SectionId, Vec<Task>)]) -> Result<()> {
        let total: usize = sections.iter().map(|(_, tasks)| tasks.len()).sum();
        if total == 0 {
            msg_print!(Message::NoTasks);
            return Ok(());
        }

        for (section, tasks) in sections {
            msg_print!(Message::SectionHeader(section.title(), tasks.len()), true);
            if !tasks.is_empty() {
                Self::tasks(tasks)?;
            }
        }
        msg_print!(Message::BoardSummary(total, sections.len()), true);

        Ok(())
    }

    pub fn tasks(tasks: &[Task]) -> Result<()> {
        let mut table = Self::table();
        for (index, task) in tasks.iter().enumerate() {
            table.add_row(Self::row(index, task, ""));
        }
        table.printstd();

        Ok(())
    }

    /// Like [`View::tasks`], with a marker for unsaved and freshly changed tasks.
    pub fn section(section: &SectionId, views: &[TaskView]) -> Result<()> {
        msg_print!(Message::SectionHeader(section.title(), views.len()), true);
        if views.is_empty() {
            return Ok(());
        }

        let mut table = Self::table();
        for (index, view) in views.iter().enumerate() {
            let marker = match (view.pending, view.just_changed) {
                (true, _) => "…",
                (false, true) => "✓",
                _ => "",
            };
            table.add_row(Self::row(index, &view.task, marker));
        }
        table.printstd();

        Ok(())
    }

    fn table() -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row!["#", "ID", "TITLE", "DEADLINE", "AMOUNT", "LINK", ""]);
        table
    }

    fn row(index: usize, task: &Task, marker: &str) -> prettytable::Row {
        row![
            index + 1,
            short_id(&task.id),
            task.title,
            task.deadline.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            task.amount.map(|a| format!("{:.2}", a)).unwrap_or_default(),
            task.link.as_deref().unwrap_or(""),
            marker
        ]
    }
}

fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}
