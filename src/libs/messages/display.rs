//! Text for every [`Message`].
//!
//! All user-facing wording is kept here so commands only pick a variant and
//! pass its parameters.

use super::types::Message;
use std::fmt;

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            // === TASK MESSAGES ===
            Message::TaskCreated(title, id) => format!("Task '{}' created ({})", title, id),
            Message::TaskCompleted(title) => format!("Task '{}' completed", title),
            Message::TaskReopened(title) => format!("Task '{}' reopened", title),
            Message::TaskMarkedImportant(title) => format!("Task '{}' added to the Big Three", title),
            Message::TaskUnmarkedImportant(title) => format!("Task '{}' removed from the Big Three", title),
            Message::TaskMarkedUrgent(title) => format!("Task '{}' marked urgent", title),
            Message::TaskUnmarkedUrgent(title) => format!("Task '{}' is no longer urgent", title),
            Message::TaskWaiting(title) => format!("Task '{}' is waiting on someone else", title),
            Message::TaskNotWaiting(title) => format!("Task '{}' is no longer waiting", title),
            Message::TaskUpdated(title) => format!("Task '{}' updated", title),
            Message::TaskMoved(title, section) => format!("Task '{}' moved to {}", title, section),
            Message::TaskReordered(title, position) => format!("Task '{}' moved to position {}", title, position),
            Message::TaskDeleted(title) => format!("Task '{}' deleted", title),
            Message::NothingToEdit => "Nothing to edit. Pass at least one field option".to_string(),
            Message::InvalidDeadline(value) => format!("Invalid deadline '{}'. Use YYYY-MM-DD or RFC 3339", value),

            // === BOARD MESSAGES ===
            Message::NoTasks => "No tasks yet. Add one with `tasklane add <title>`".to_string(),
            Message::SectionHeader(title, count) => format!("{} ({})", title, count),
            Message::BoardSummary(tasks, sections) => format!("{} tasks in {} sections", tasks, sections),

            // === SYNC MESSAGES ===
            Message::UsingBackend(backend) => format!("Using {} backend", backend),
            Message::WatchStarted(backend) => format!("Watching {} for changes. Press Ctrl+C to stop", backend),
            Message::WatchMerged(changes) => format!("Merged {} remote change(s)", changes),
            Message::WatchConflict(details) => format!("Conflict: {}", details),
            Message::SyncFailed(error) => format!("Sync failed: {}", error),
            Message::ChangeRolledBack(error) => format!("Change was not saved and has been undone: {}", error),

            // === CONFIGURATION MESSAGES ===
            Message::ConfigSaved => "Configuration saved successfully".to_string(),
            Message::ConfigDeleted => "Configuration deleted".to_string(),
            Message::ConfigNotFound => "No configuration file to delete".to_string(),
            Message::ConfigModuleSync => "Sync settings".to_string(),
            Message::ConfigModuleDrag => "Drag settings".to_string(),
            Message::ConfigModuleRemote => "Remote store settings (leave the URL empty to use the local database)".to_string(),
            Message::ConfigModuleDisplay => "Display settings".to_string(),
            Message::PromptUserId => "User id".to_string(),
            Message::PromptSelectModules => "Select settings to configure".to_string(),
            Message::PromptPersistTimeout => "Save timeout (milliseconds)".to_string(),
            Message::PromptReorderDebounce => "Reorder debounce (milliseconds)".to_string(),
            Message::PromptJustChanged => "Highlight changed tasks for (milliseconds)".to_string(),
            Message::PromptRetryOnce => "Retry a failed save once?".to_string(),
            Message::PromptPollInterval => "Remote poll interval (milliseconds)".to_string(),
            Message::PromptActivationDelay => "Drag activation delay (milliseconds)".to_string(),
            Message::PromptDragTolerance => "Drag tolerance (pixels)".to_string(),
            Message::PromptApiUrl => "Remote API URL".to_string(),
            Message::PromptApiKey => "Remote API key".to_string(),
            Message::PromptTable => "Remote table".to_string(),
            Message::PromptVisibleSections => "Visible sections".to_string(),

            // === MIGRATION MESSAGES ===
            Message::MigrationsFound(count) => format!("Found {} pending database migrations", count),
            Message::RunningMigration(version, name) => format!("Running migration v{}: {}", version, name),
            Message::MigrationCompleted(version) => format!("Migration v{} completed", version),
            Message::MigrationFailed(version, error) => format!("Migration v{} failed: {}", version, error),
            Message::AllMigrationsCompleted => "All database migrations completed successfully".to_string(),
            Message::DatabaseUpToDate => "Database is up to date".to_string(),
        };

        write!(f, "{}", text)
    }
}
