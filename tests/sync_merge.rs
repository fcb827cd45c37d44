#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};
    use std::time::Duration;
    use tasklane::api::MemoryRemote;
    use tasklane::libs::error::ConflictError;
    use tasklane::libs::event::StoreEvent;
    use tasklane::libs::section::SectionId;
    use tasklane::libs::store::{StoreOptions, TaskStore};
    use tasklane::libs::sync::MergeScope;
    use tasklane::libs::task::Task;
    use test_context::{test_context, AsyncTestContext};

    struct SyncTestContext {
        remote: MemoryRemote,
        store: TaskStore<MemoryRemote>,
    }

    impl AsyncTestContext for SyncTestContext {
        async fn setup() -> Self {
            let remote = MemoryRemote::new();
            remote.seed(
                "local",
                vec![
                    Task::new("f", "Fix fence").with_order(1),
                    Task::new("g", "Groceries").with_order(2),
                    Task::new("t1", "Taxes").with_important(true).with_order(1),
                    Task::new("t2", "Tickets").with_important(true).with_order(2),
                ],
            );
            let store = TaskStore::new(remote.clone(), StoreOptions::default());
            store.load().await.unwrap();
            SyncTestContext { remote, store }
        }
    }

    #[test_context(SyncTestContext)]
    #[tokio::test]
    async fn test_remote_edit_during_pending_change(ctx: &mut SyncTestContext) {
        let handle = ctx.store.toggle_important("f").unwrap();
        assert_eq!(ctx.store.section_of("f"), Some(SectionId::BigThree));

        ctx.remote.edit_remotely("f", |row| row.title = "Fix fence today".into()).unwrap();
        let report = ctx.store.sync_channel().refresh().await.unwrap();

        let local = ctx.store.get_task("f").unwrap();
        assert_eq!(local.title, "Fix fence today");
        assert!(local.important);
        assert_eq!(ctx.store.section_of("f"), Some(SectionId::BigThree));
        assert!(report.deferred.contains(&"f".to_string()));
        assert!(report.conflicts.is_empty());

        handle.wait().await.unwrap();
        let local = ctx.store.get_task("f").unwrap();
        assert_eq!(local.title, "Fix fence today");
        assert_eq!(ctx.store.section_of("f"), Some(SectionId::BigThree));
        assert_eq!(local, ctx.remote.row("f").unwrap());
    }

    #[test_context(SyncTestContext)]
    #[tokio::test]
    async fn test_settled_task_takes_newer_remote_row(ctx: &mut SyncTestContext) {
        ctx.remote.edit_remotely("g", |row| row.urgent = true).unwrap();

        let report = ctx.store.sync_channel().refresh().await.unwrap();

        assert_eq!(report.updated, vec!["g".to_string()]);
        assert_eq!(ctx.store.section_of("g"), Some(SectionId::Urgent));
    }

    #[test_context(SyncTestContext)]
    #[tokio::test]
    async fn test_stale_row_is_ignored(ctx: &mut SyncTestContext) {
        let mut stale = ctx.store.get_task("g").unwrap();
        stale.title = "Old groceries".into();
        stale.updated_at -= TimeDelta::seconds(60);

        let report = ctx.store.apply_remote(vec![stale], MergeScope::Incremental);

        assert!(report.is_empty());
        assert_eq!(ctx.store.get_task("g").unwrap().title, "Groceries");
    }

    #[test_context(SyncTestContext)]
    #[tokio::test]
    async fn test_incremental_rows_insert_without_removing(ctx: &mut SyncTestContext) {
        let row = Task::new("n", "New from phone").with_order(3).with_updated_at(Utc::now());

        let report = ctx.store.apply_remote(vec![row], MergeScope::Incremental);

        assert_eq!(report.inserted, vec!["n".to_string()]);
        assert_eq!(ctx.store.len(), 5);
        let routine: Vec<String> = ctx.store.get_section(&SectionId::Routine).into_iter().map(|t| t.id).collect();
        assert_eq!(routine, ["f", "g", "n"]);
    }

    #[test_context(SyncTestContext)]
    #[tokio::test]
    async fn test_full_refresh_removes_deleted_rows(ctx: &mut SyncTestContext) {
        let mut rows = ctx.store.get_section(&SectionId::BigThree);
        rows.extend(ctx.store.get_section(&SectionId::Routine).into_iter().filter(|t| t.id != "g"));

        let report = ctx.store.apply_remote(rows, MergeScope::Full);

        assert_eq!(report.removed, vec!["g".to_string()]);
        assert!(ctx.store.get_task("g").is_none());
    }

    #[test_context(SyncTestContext)]
    #[tokio::test]
    async fn test_deleted_task_is_not_resurrected(ctx: &mut SyncTestContext) {
        let stale_rows = ctx.remote.row("g").into_iter().collect::<Vec<_>>();
        ctx.store.delete("g").unwrap().wait().await.unwrap();

        ctx.store.apply_remote(stale_rows, MergeScope::Incremental);

        assert!(ctx.store.get_task("g").is_none());
    }

    #[test_context(SyncTestContext)]
    #[tokio::test]
    async fn test_remote_rows_cannot_overfill_big_three(ctx: &mut SyncTestContext) {
        ctx.remote.insert_remotely("local", Task::new("t3", "Tires").with_important(true).with_order(3));
        ctx.store.sync_channel().refresh().await.unwrap();
        assert_eq!(ctx.store.get_section(&SectionId::BigThree).len(), 3);

        ctx.remote.edit_remotely("g", |row| row.important = true).unwrap();
        let report = ctx.store.sync_channel().refresh().await.unwrap();

        assert_eq!(report.conflicts, vec![ConflictError::Capacity { task_id: "g".into() }]);
        assert!(!ctx.store.get_task("g").unwrap().important);
        assert_eq!(ctx.store.get_section(&SectionId::BigThree).len(), 3);
    }

    #[test_context(SyncTestContext)]
    #[tokio::test]
    async fn test_priority_swap_in_one_read_fits_big_three(ctx: &mut SyncTestContext) {
        ctx.remote.insert_remotely("local", Task::new("t3", "Tires").with_important(true).with_order(3));
        ctx.store.sync_channel().refresh().await.unwrap();

        // "f" sorts ahead of "t1" in the read, so the gain arrives before the loss.
        ctx.remote.edit_remotely("t1", |row| row.important = false).unwrap();
        ctx.remote.edit_remotely("f", |row| row.important = true).unwrap();
        let report = ctx.store.sync_channel().refresh().await.unwrap();

        assert!(report.conflicts.is_empty());
        let big_three: Vec<String> = ctx.store.get_section(&SectionId::BigThree).into_iter().map(|t| t.id).collect();
        assert_eq!(big_three.len(), 3);
        assert!(big_three.contains(&"f".to_string()));
        assert!(!big_three.contains(&"t1".to_string()));
    }

    #[test_context(SyncTestContext)]
    #[tokio::test]
    async fn test_clamped_row_is_adopted_once_a_slot_frees(ctx: &mut SyncTestContext) {
        ctx.remote.insert_remotely("local", Task::new("t3", "Tires").with_important(true).with_order(3));
        ctx.store.sync_channel().refresh().await.unwrap();
        ctx.remote.edit_remotely("g", |row| row.important = true).unwrap();
        let report = ctx.store.sync_channel().refresh().await.unwrap();
        assert_eq!(report.conflicts, vec![ConflictError::Capacity { task_id: "g".into() }]);

        ctx.remote.edit_remotely("t2", |row| row.completed = true).unwrap();
        let report = ctx.store.sync_channel().refresh().await.unwrap();

        assert!(report.conflicts.is_empty());
        assert!(report.updated.contains(&"g".to_string()));
        assert_eq!(ctx.store.get_task("g").unwrap(), ctx.remote.row("g").unwrap());
        assert_eq!(ctx.store.section_of("g"), Some(SectionId::BigThree));

        let settled = ctx.store.sync_channel().refresh().await.unwrap();
        assert!(settled.is_empty());
    }

    #[test_context(SyncTestContext)]
    #[tokio::test]
    async fn test_background_sync_merges_remote_changes(ctx: &mut SyncTestContext) {
        let mut events = ctx.store.subscribe_to_store_changes();
        let sync = ctx.store.start_sync();
        assert!(sync.is_running());

        ctx.remote.edit_remotely("f", |row| row.title = "Fence, painted".into()).unwrap();

        let merged = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(StoreEvent::Merged(report)) = events.recv().await {
                    break report;
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(merged.updated, vec!["f".to_string()]);
        assert_eq!(ctx.store.get_task("f").unwrap().title, "Fence, painted");
        sync.stop();
    }

    #[test_context(SyncTestContext)]
    #[tokio::test]
    async fn test_own_writes_echo_without_changes(ctx: &mut SyncTestContext) {
        ctx.store.toggle_urgent("g").unwrap().wait().await.unwrap();

        let report = ctx.store.sync_channel().refresh().await.unwrap();

        assert!(report.updated.is_empty());
        assert_eq!(ctx.store.section_of("g"), Some(SectionId::Urgent));
    }
}
