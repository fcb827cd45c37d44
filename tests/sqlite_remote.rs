#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;
    use tasklane::api::RemoteStore;
    use tasklane::db::db::DB_FILE_NAME;
    use tasklane::db::tasks::SqliteRemote;
    use tasklane::libs::section::SectionId;
    use tasklane::libs::store::{StoreOptions, TaskStore};
    use tasklane::libs::task::{FieldEdit, Task};
    use tempfile::TempDir;
    use test_context::{test_context, AsyncTestContext};

    struct SqliteTestContext {
        temp_dir: TempDir,
    }

    impl AsyncTestContext for SqliteTestContext {
        async fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            std::env::set_var("HOME", temp_dir.path());
            std::env::set_var("LOCALAPPDATA", temp_dir.path());
            SqliteTestContext { temp_dir }
        }
    }

    impl SqliteTestContext {
        fn db_path(&self) -> PathBuf {
            self.temp_dir.path().join(DB_FILE_NAME)
        }

        fn remote(&self) -> SqliteRemote {
            SqliteRemote::open(&self.db_path()).unwrap()
        }
    }

    async fn open_store(remote: SqliteRemote) -> TaskStore<SqliteRemote> {
        let store = TaskStore::new(remote, StoreOptions::default());
        store.load().await.unwrap();
        store
    }

    #[test_context(SqliteTestContext)]
    #[tokio::test]
    async fn test_changes_survive_reopening(ctx: &mut SqliteTestContext) {
        let store = open_store(ctx.remote()).await;
        let (first, handle) = store.create_task("Renew passport").unwrap();
        handle.wait().await.unwrap();
        let (second, handle) = store.create_task("Book dentist").unwrap();
        handle.wait().await.unwrap();
        store.toggle_urgent(&first.id).unwrap().wait().await.unwrap();
        store
            .edit(
                &second.id,
                FieldEdit {
                    amount: Some(Some(42.5)),
                    link: Some(Some("https://dentist.example".into())),
                    ..FieldEdit::default()
                },
            )
            .unwrap()
            .wait()
            .await
            .unwrap();
        drop(store);

        let reopened = open_store(ctx.remote()).await;
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.section_of(&first.id), Some(SectionId::Urgent));
        let dentist = reopened.get_task(&second.id).unwrap();
        assert_eq!(dentist.amount, Some(42.5));
        assert_eq!(dentist.link.as_deref(), Some("https://dentist.example"));
    }

    #[test_context(SqliteTestContext)]
    #[tokio::test]
    async fn test_delete_is_persisted(ctx: &mut SqliteTestContext) {
        let remote = ctx.remote();
        remote.insert_task("local", &Task::new("gone", "Old chore").with_order(1)).await.unwrap();
        let store = open_store(remote.clone()).await;

        store.delete("gone").unwrap().wait().await.unwrap();

        assert!(remote.read_tasks("local").await.unwrap().is_empty());
        assert!(open_store(ctx.remote()).await.is_empty());
    }

    #[test_context(SqliteTestContext)]
    #[tokio::test]
    async fn test_own_writes_notify_subscribers(ctx: &mut SqliteTestContext) {
        let remote = ctx.remote();
        let mut subscription = remote.subscribe_to_changes("local");

        remote.insert_task("local", &Task::new("t1", "Water plants")).await.unwrap();
        remote.insert_task("someone-else", &Task::new("t2", "Not ours")).await.unwrap();

        let changed = tokio::time::timeout(Duration::from_secs(1), subscription.changed()).await.unwrap();
        assert!(changed);
        assert_eq!(subscription.drain(), 0);
    }

    #[test_context(SqliteTestContext)]
    #[tokio::test]
    async fn test_commits_from_another_connection_are_detected(ctx: &mut SqliteTestContext) {
        let watcher = ctx.remote().with_poll_interval(Duration::from_millis(20));
        let writer = ctx.remote();
        let mut subscription = watcher.subscribe_to_changes("local");

        // Let the poller record the starting version.
        tokio::time::sleep(Duration::from_millis(60)).await;
        writer.insert_task("local", &Task::new("t1", "From another process")).await.unwrap();

        let changed = tokio::time::timeout(Duration::from_secs(2), subscription.changed()).await.unwrap();
        assert!(changed);
        assert_eq!(watcher.read_tasks("local").await.unwrap()[0].title, "From another process");
    }

    #[test_context(SqliteTestContext)]
    #[tokio::test]
    async fn test_store_syncs_across_connections(ctx: &mut SqliteTestContext) {
        let watcher = open_store(ctx.remote().with_poll_interval(Duration::from_millis(20))).await;
        let writer = open_store(ctx.remote()).await;
        let sync = watcher.start_sync();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let (task, handle) = writer.create_task("Shared chore").unwrap();
        handle.wait().await.unwrap();

        let arrived = tokio::time::timeout(Duration::from_secs(2), async {
            while watcher.get_task(&task.id).is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(arrived.is_ok());
        sync.stop();
    }
}
