#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};
    use tasklane::api::MemoryRemote;
    use tasklane::libs::config::DragConfig;
    use tasklane::libs::drag::{DragCommand, DragCoordinator, DragState, DropTarget, Point};
    use tasklane::libs::section::SectionId;
    use tasklane::libs::store::{StoreOptions, TaskStore};
    use tasklane::libs::sync::MergeScope;
    use tasklane::libs::task::{Task, TaskStatus};
    use test_context::{test_context, AsyncTestContext};

    struct DragTestContext {
        remote: MemoryRemote,
        store: TaskStore<MemoryRemote>,
        coordinator: DragCoordinator,
    }

    impl AsyncTestContext for DragTestContext {
        async fn setup() -> Self {
            let remote = MemoryRemote::new();
            remote.seed(
                "local",
                vec![
                    Task::new("a", "A").with_order(1),
                    Task::new("b", "B").with_order(2),
                    Task::new("c", "C").with_order(3),
                    Task::new("e", "Email landlord").with_status(TaskStatus::Pending).with_order(1),
                ],
            );
            let store = TaskStore::new(remote.clone(), StoreOptions::default());
            store.load().await.unwrap();
            DragTestContext {
                remote,
                store,
                coordinator: DragCoordinator::new(&DragConfig::default()),
            }
        }
    }

    impl DragTestContext {
        /// Presses on a card and holds it past the activation delay.
        fn pick_up(&mut self, task_id: &str, section: SectionId) {
            let t0 = Instant::now();
            assert!(self.coordinator.press(task_id, &section, Point::new(10.0, 10.0), t0));
            assert!(self.coordinator.tick(t0 + Duration::from_millis(260), &self.store));
        }
    }

    fn over(target: Option<DropTarget>) -> impl Fn(Point) -> Option<DropTarget> {
        move |_| target.clone()
    }

    fn ids(store: &TaskStore<MemoryRemote>, section: &SectionId) -> Vec<String> {
        store.get_section(section).into_iter().map(|t| t.id).collect()
    }

    #[test_context(DragTestContext)]
    #[tokio::test]
    async fn test_drop_on_card_reorders_section(ctx: &mut DragTestContext) {
        ctx.pick_up("c", SectionId::Routine);
        let hit = over(Some(DropTarget::Card {
            section: SectionId::Routine,
            task_id: "a".into(),
        }));

        let command = ctx.coordinator.release(Point::new(10.0, -30.0), &hit, &ctx.store).unwrap();
        ctx.store.apply_drag(command).unwrap().wait().await.unwrap();

        assert_eq!(ids(&ctx.store, &SectionId::Routine), ["c", "a", "b"]);
        assert_eq!(ctx.remote.row("c").unwrap().order, 1);
    }

    #[test_context(DragTestContext)]
    #[tokio::test]
    async fn test_downward_drop_on_card_inserts_before_it(ctx: &mut DragTestContext) {
        ctx.pick_up("a", SectionId::Routine);
        let hit = over(Some(DropTarget::Card {
            section: SectionId::Routine,
            task_id: "c".into(),
        }));

        let command = ctx.coordinator.release(Point::new(10.0, 50.0), &hit, &ctx.store).unwrap();
        ctx.store.apply_drag(command).unwrap().wait().await.unwrap();

        assert_eq!(ids(&ctx.store, &SectionId::Routine), ["b", "a", "c"]);
        assert_eq!(ctx.remote.row("a").unwrap().order, 2);
        assert_eq!(ctx.remote.row("c").unwrap().order, 3);
    }

    #[test_context(DragTestContext)]
    #[tokio::test]
    async fn test_drop_on_empty_urgent_zone(ctx: &mut DragTestContext) {
        let mut commands = ctx.coordinator.subscribe();
        ctx.pick_up("e", SectionId::Waiting);
        let hit = over(Some(DropTarget::Zone { section: SectionId::Urgent }));
        ctx.coordinator.pointer_move(Point::new(200.0, 10.0), Instant::now(), &hit, &ctx.store);

        let command = ctx.coordinator.release(Point::new(200.0, 10.0), &hit, &ctx.store).unwrap();
        assert_eq!(
            command,
            DragCommand::MoveAcrossSections {
                task_id: "e".into(),
                from: SectionId::Waiting,
                to: SectionId::Urgent,
                before: None,
            }
        );
        assert_eq!(commands.try_recv().unwrap(), command);

        ctx.store.apply_drag(command).unwrap().wait().await.unwrap();

        assert_eq!(ids(&ctx.store, &SectionId::Urgent), ["e"]);
        assert!(ctx.store.get_section(&SectionId::Waiting).is_empty());
        let row = ctx.remote.row("e").unwrap();
        assert!(row.urgent);
        assert_eq!(row.order, 1);
    }

    #[test_context(DragTestContext)]
    #[tokio::test]
    async fn test_drop_before_card_in_other_section(ctx: &mut DragTestContext) {
        ctx.pick_up("e", SectionId::Waiting);
        let hit = over(Some(DropTarget::Card {
            section: SectionId::Routine,
            task_id: "b".into(),
        }));

        let command = ctx.coordinator.release(Point::new(0.0, 0.0), &hit, &ctx.store).unwrap();
        ctx.store.apply_drag(command).unwrap().wait().await.unwrap();

        assert_eq!(ids(&ctx.store, &SectionId::Routine), ["a", "e", "b", "c"]);
        assert_eq!(ctx.store.get_task("e").unwrap().status, TaskStatus::Inbox);
    }

    #[test_context(DragTestContext)]
    #[tokio::test]
    async fn test_cancel_restores_touched_sections(ctx: &mut DragTestContext) {
        ctx.pick_up("b", SectionId::Routine);
        let hover = over(Some(DropTarget::Zone { section: SectionId::Waiting }));
        ctx.coordinator.pointer_move(Point::new(50.0, 0.0), Instant::now(), &hover, &ctx.store);

        // A reorder saved mid-gesture is undone locally along with the drag.
        ctx.store.reorder(&SectionId::Routine, "c", 0).unwrap().wait().await.unwrap();
        let calls = ctx.remote.update_calls();

        let command = ctx.coordinator.cancel().unwrap();
        let DragCommand::Cancelled { snapshots } = &command else {
            panic!("expected a cancellation");
        };
        assert_eq!(snapshots.len(), 2);

        ctx.store.apply_drag(command).unwrap().wait().await.unwrap();
        assert_eq!(ids(&ctx.store, &SectionId::Routine), ["a", "b", "c"]);
        assert_eq!(ctx.remote.update_calls(), calls);
        assert_eq!(ctx.coordinator.state(), &DragState::Cancelled);
    }

    #[test_context(DragTestContext)]
    #[tokio::test]
    async fn test_drop_into_full_big_three_is_rejected(ctx: &mut DragTestContext) {
        for id in ["x1", "x2", "x3"] {
            ctx.store.apply_remote(vec![Task::new(id, id).with_important(true)], MergeScope::Incremental);
        }
        ctx.pick_up("a", SectionId::Routine);

        let hit = over(Some(DropTarget::Zone { section: SectionId::BigThree }));
        let command = ctx.coordinator.release(Point::new(0.0, 0.0), &hit, &ctx.store).unwrap();

        assert!(ctx.store.apply_drag(command).is_err());
        assert_eq!(ctx.store.section_of("a"), Some(SectionId::Routine));
        assert_eq!(ctx.remote.update_calls(), 0);
    }

    #[test_context(DragTestContext)]
    #[tokio::test]
    async fn test_second_press_during_drag_is_ignored(ctx: &mut DragTestContext) {
        ctx.pick_up("a", SectionId::Routine);

        assert!(!ctx.coordinator.press("b", &SectionId::Routine, Point::new(0.0, 0.0), Instant::now()));

        let DragState::Dragging(session) = ctx.coordinator.state() else {
            panic!("drag should still be active");
        };
        assert_eq!(session.task_id, "a");
    }
}
