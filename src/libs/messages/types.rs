/// User-facing messages. Text lives in the `Display` impl in `display.rs`.
#[derive(Debug, Clone)]
pub enum Message {
    // === TASK MESSAGES ===
    TaskCreated(String, String), // title, id
    TaskCompleted(String),
    TaskReopened(String),
    TaskMarkedImportant(String),
    TaskUnmarkedImportant(String),
    TaskMarkedUrgent(String),
    TaskUnmarkedUrgent(String),
    TaskWaiting(String),
    TaskNotWaiting(String),
    TaskUpdated(String),
    TaskMoved(String, String),     // title, section
    TaskReordered(String, usize),  // title, position
    TaskDeleted(String),
    NothingToEdit,
    InvalidDeadline(String),

    // === BOARD MESSAGES ===
    NoTasks,
    SectionHeader(String, usize), // title, count
    BoardSummary(usize, usize),   // tasks, sections

    // === SYNC MESSAGES ===
    UsingBackend(String),
    WatchStarted(String),
    WatchMerged(usize),
    WatchConflict(String),
    SyncFailed(String),
    ChangeRolledBack(String),

    // === CONFIGURATION MESSAGES ===
    ConfigSaved,
    ConfigDeleted,
    ConfigNotFound,
    ConfigModuleSync,
    ConfigModuleDrag,
    ConfigModuleRemote,
    ConfigModuleDisplay,
    PromptUserId,
    PromptSelectModules,
    PromptPersistTimeout,
    PromptReorderDebounce,
    PromptJustChanged,
    PromptRetryOnce,
    PromptPollInterval,
    PromptActivationDelay,
    PromptDragTolerance,
    PromptApiUrl,
    PromptApiKey,
    PromptTable,
    PromptVisibleSections,

    // === MIGRATION MESSAGES ===
    MigrationsFound(usize),
    RunningMigration(u32, String),
    MigrationCompleted(u32),
    MigrationFailed(u32, String),
    AllMigrationsCompleted,
    DatabaseUpToDate,
}
