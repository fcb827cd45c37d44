//! Drag gesture state machine.
//!
//! ```text
//! Idle --press held past delay, within tolerance--> Dragging
//! Dragging --pointer move--> Dragging            (hover hint only)
//! Dragging --release over target--> Dropped       (emits a move)
//! Dragging --release elsewhere / cancel--> Cancelled (emits snapshots)
//! Dropped | Cancelled --settle--> Idle
//! ```
//!
//! The coordinator knows nothing about the input device. Callers feed it
//! pointer positions, timestamps and a [`HitTest`] that maps a position to a
//! card or an empty drop zone. Section order is read through
//! [`SectionSource`] when the drag activates and when a new section is first
//! hovered, so a cancelled drag can restore every touched section exactly.

use crate::libs::board::{SectionSnapshot, SectionSource};
use crate::libs::config::DragConfig;
use crate::libs::section::SectionId;
use crate::libs::task::TaskId;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// What lies under the pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Card { section: SectionId, task_id: TaskId },
    /// Empty area of a section, including the drop zone of an empty section.
    Zone { section: SectionId },
}

impl DropTarget {
    pub fn section(&self) -> &SectionId {
        match self {
            DropTarget::Card { section, .. } | DropTarget::Zone { section } => section,
        }
    }
}

pub trait HitTest {
    fn hit_test(&self, point: Point) -> Option<DropTarget>;
}

impl<F: Fn(Point) -> Option<DropTarget>> HitTest for F {
    fn hit_test(&self, point: Point) -> Option<DropTarget> {
        self(point)
    }
}

/// Discrete outcome of a gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragCommand {
    MoveWithinSection { section: SectionId, task_id: TaskId, target_index: usize },
    MoveAcrossSections { task_id: TaskId, from: SectionId, to: SectionId, before: Option<TaskId> },
    /// Pre-drag order of every section the gesture touched.
    Cancelled { snapshots: Vec<SectionSnapshot> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub task_id: TaskId,
    pub source: SectionId,
    pub over: Option<SectionId>,
    pub snapshots: Vec<SectionSnapshot>,
}

impl DragSession {
    fn remember(&mut self, section: &SectionId, source: &impl SectionSource) {
        if !self.snapshots.iter().any(|s| &s.section == section) {
            self.snapshots.push(source.section_snapshot(section));
        }
    }

    fn snapshot(&self, section: &SectionId) -> Option<&SectionSnapshot> {
        self.snapshots.iter().find(|s| &s.section == section)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    Dragging(DragSession),
    Dropped(DragCommand),
    Cancelled,
}

#[derive(Debug, Clone)]
struct Press {
    task_id: TaskId,
    section: SectionId,
    origin: Point,
    at: Instant,
}

pub struct DragCoordinator {
    state: DragState,
    press: Option<Press>,
    activation_delay: Duration,
    tolerance: f64,
    commands: broadcast::Sender<DragCommand>,
}

impl DragCoordinator {
    pub fn new(config: &DragConfig) -> Self {
        let (commands, _) = broadcast::channel(32);
        Self {
            state: DragState::Idle,
            press: None,
            activation_delay: Duration::from_millis(config.activation_delay_ms),
            tolerance: config.tolerance_px,
            commands,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DragCommand> {
        self.commands.subscribe()
    }

    /// Starts a press on a card. Ignored while a drag is in progress.
    pub fn press(&mut self, task_id: &str, section: &SectionId, at: Point, now: Instant) -> bool {
        match self.state {
            DragState::Dragging(_) => return false,
            DragState::Dropped(_) | DragState::Cancelled => self.state = DragState::Idle,
            DragState::Idle => {}
        }
        self.press = Some(Press {
            task_id: task_id.to_string(),
            section: section.clone(),
            origin: at,
            at: now,
        });
        true
    }

    /// Activates a held press once the delay has passed.
    pub fn tick(&mut self, now: Instant, source: &impl SectionSource) -> bool {
        let ready = self.press.as_ref().is_some_and(|p| now.duration_since(p.at) >= self.activation_delay);
        if !ready {
            return false;
        }
        let Some(press) = self.press.take() else {
            return false;
        };
        let mut session = DragSession {
            task_id: press.task_id,
            source: press.section.clone(),
            over: Some(press.section.clone()),
            snapshots: Vec::new(),
        };
        session.remember(&press.section, source);
        tracing::debug!(task_id = %session.task_id, section = %session.source, "drag started");
        self.state = DragState::Dragging(session);
        true
    }

    /// Moving past the tolerance before activation abandons the press (the
    /// user is scrolling). During a drag, updates the hovered section.
    pub fn pointer_move(&mut self, at: Point, now: Instant, hit: &impl HitTest, source: &impl SectionSource) {
        if let Some(origin) = self.press.as_ref().map(|p| p.origin) {
            if origin.distance(&at) > self.tolerance {
                self.press = None;
                return;
            }
            self.tick(now, source);
        }
        if let DragState::Dragging(session) = &mut self.state {
            session.over = hit.hit_test(at).map(|target| target.section().clone());
            if let Some(section) = session.over.clone() {
                session.remember(&section, source);
            }
        }
    }

    /// Ends the gesture. Returns the command it produced, if any.
    pub fn release(&mut self, at: Point, hit: &impl HitTest, source: &impl SectionSource) -> Option<DragCommand> {
        self.press = None;
        if !self.is_dragging() {
            return None;
        }
        let DragState::Dragging(mut session) = std::mem::replace(&mut self.state, DragState::Idle) else {
            return None;
        };

        let command = match hit.hit_test(at) {
            Some(target) => {
                session.remember(target.section(), source);
                Self::drop_command(&session, target)
            }
            None => None,
        };
        match command {
            Some(command) => {
                tracing::debug!(?command, "drag dropped");
                self.state = DragState::Dropped(command.clone());
                let _ = self.commands.send(command.clone());
                Some(command)
            }
            None => Some(self.finish_cancelled(session)),
        }
    }

    /// Abandons the gesture, returning the snapshots to restore.
    pub fn cancel(&mut self) -> Option<DragCommand> {
        self.press = None;
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Dragging(session) => Some(self.finish_cancelled(session)),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Returns to idle after a drop or cancellation has been handled.
    pub fn settle(&mut self) {
        if matches!(self.state, DragState::Dropped(_) | DragState::Cancelled) {
            self.state = DragState::Idle;
        }
    }

    fn finish_cancelled(&mut self, session: DragSession) -> DragCommand {
        tracing::debug!(task_id = %session.task_id, "drag cancelled");
        let command = DragCommand::Cancelled { snapshots: session.snapshots };
        self.state = DragState::Cancelled;
        let _ = self.commands.send(command.clone());
        command
    }

    fn drop_command(session: &DragSession, target: DropTarget) -> Option<DragCommand> {
        let source = &session.source;
        match target {
            DropTarget::Card { section, task_id } if &section == source => {
                let snapshot = session.snapshot(source)?;
                let target = snapshot.position(&task_id)?;
                // Insert before the card; the dragged task's own slot closes first.
                let target_index = match snapshot.position(&session.task_id) {
                    Some(current) if current < target => target - 1,
                    _ => target,
                };
                Some(DragCommand::MoveWithinSection {
                    section,
                    task_id: session.task_id.clone(),
                    target_index,
                })
            }
            DropTarget::Card { section, task_id } => Some(DragCommand::MoveAcrossSections {
                task_id: session.task_id.clone(),
                from: source.clone(),
                to: section,
                before: Some(task_id),
            }),
            DropTarget::Zone { section } if &section == source => {
                let snapshot = session.snapshot(source)?;
                Some(DragCommand::MoveWithinSection {
                    section,
                    task_id: session.task_id.clone(),
                    target_index: snapshot.len().saturating_sub(1),
                })
            }
            DropTarget::Zone { section } => Some(DragCommand::MoveAcrossSections {
                task_id: session.task_id.clone(),
                from: source.clone(),
                to: section,
                before: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::board::Board;
    use crate::libs::task::{Task, TaskStatus};

    fn config() -> DragConfig {
        DragConfig {
            activation_delay_ms: 250,
            tolerance_px: 5.0,
        }
    }

    fn board() -> Board {
        Board::from_tasks(vec![
            Task::new("a", "a").with_order(1),
            Task::new("b", "b").with_order(2),
            Task::new("c", "c").with_order(3),
            Task::new("e", "e").with_status(TaskStatus::Pending).with_order(1),
        ])
        .0
    }

    fn start(coordinator: &mut DragCoordinator, board: &Board, task_id: &str, section: SectionId) {
        let t0 = Instant::now();
        coordinator.press(task_id, &section, Point::new(0.0, 0.0), t0);
        assert!(coordinator.tick(t0 + Duration::from_millis(300), board));
    }

    fn over(target: Option<DropTarget>) -> impl Fn(Point) -> Option<DropTarget> {
        move |_| target.clone()
    }

    #[test]
    fn short_press_does_not_activate() {
        let board = board();
        let mut coordinator = DragCoordinator::new(&config());
        let t0 = Instant::now();
        coordinator.press("a", &SectionId::Routine, Point::new(0.0, 0.0), t0);
        assert!(!coordinator.tick(t0 + Duration::from_millis(100), &board));
        assert!(!coordinator.is_dragging());
    }

    #[test]
    fn moving_before_activation_abandons_press() {
        let board = board();
        let mut coordinator = DragCoordinator::new(&config());
        let t0 = Instant::now();
        coordinator.press("a", &SectionId::Routine, Point::new(0.0, 0.0), t0);
        coordinator.pointer_move(Point::new(0.0, 20.0), t0 + Duration::from_millis(50), &over(None), &board);
        assert!(!coordinator.tick(t0 + Duration::from_millis(400), &board));
        assert_eq!(coordinator.state(), &DragState::Idle);
    }

    #[test]
    fn drop_on_card_in_same_section_reorders() {
        let board = board();
        let mut coordinator = DragCoordinator::new(&config());
        start(&mut coordinator, &board, "c", SectionId::Routine);

        let hit = over(Some(DropTarget::Card { section: SectionId::Routine, task_id: "a".into() }));
        let command = coordinator.release(Point::new(0.0, -40.0), &hit, &board);
        assert_eq!(
            command,
            Some(DragCommand::MoveWithinSection {
                section: SectionId::Routine,
                task_id: "c".into(),
                target_index: 0
            })
        );
    }

    #[test]
    fn downward_drop_on_card_lands_before_it() {
        let board = board();
        let mut coordinator = DragCoordinator::new(&config());
        start(&mut coordinator, &board, "a", SectionId::Routine);

        let hit = over(Some(DropTarget::Card { section: SectionId::Routine, task_id: "c".into() }));
        let command = coordinator.release(Point::new(0.0, 40.0), &hit, &board);
        assert_eq!(
            command,
            Some(DragCommand::MoveWithinSection {
                section: SectionId::Routine,
                task_id: "a".into(),
                target_index: 1
            })
        );
    }

    #[test]
    fn drop_on_empty_zone_moves_to_end() {
        let board = board();
        let mut coordinator = DragCoordinator::new(&config());
        let mut commands = coordinator.subscribe();
        start(&mut coordinator, &board, "e", SectionId::Waiting);

        let hit = over(Some(DropTarget::Zone { section: SectionId::Urgent }));
        coordinator.pointer_move(Point::new(100.0, 0.0), Instant::now(), &hit, &board);
        let command = coordinator.release(Point::new(100.0, 0.0), &hit, &board).unwrap();
        let expected = DragCommand::MoveAcrossSections {
            task_id: "e".into(),
            from: SectionId::Waiting,
            to: SectionId::Urgent,
            before: None,
        };
        assert_eq!(command, expected);
        assert_eq!(commands.try_recv().unwrap(), expected);
    }

    #[test]
    fn release_outside_targets_cancels_with_snapshots() {
        let board = board();
        let mut coordinator = DragCoordinator::new(&config());
        start(&mut coordinator, &board, "b", SectionId::Routine);
        coordinator.pointer_move(Point::new(50.0, 0.0), Instant::now(), &over(Some(DropTarget::Zone { section: SectionId::Waiting })), &board);

        let command = coordinator.release(Point::new(500.0, 0.0), &over(None), &board).unwrap();
        let DragCommand::Cancelled { snapshots } = command else {
            panic!("expected cancellation");
        };
        assert_eq!(snapshots, vec![board.snapshot(&SectionId::Routine), board.snapshot(&SectionId::Waiting)]);
        assert_eq!(coordinator.state(), &DragState::Cancelled);
    }

    #[test]
    fn press_while_dragging_is_ignored() {
        let board = board();
        let mut coordinator = DragCoordinator::new(&config());
        start(&mut coordinator, &board, "a", SectionId::Routine);
        assert!(!coordinator.press("b", &SectionId::Routine, Point::new(0.0, 0.0), Instant::now()));

        let DragState::Dragging(session) = coordinator.state() else {
            panic!("drag should continue");
        };
        assert_eq!(session.task_id, "a");
    }

    #[test]
    fn settle_returns_to_idle() {
        let board = board();
        let mut coordinator = DragCoordinator::new(&config());
        start(&mut coordinator, &board, "a", SectionId::Routine);
        coordinator.cancel();
        assert_eq!(coordinator.state(), &DragState::Cancelled);
        coordinator.settle();
        assert_eq!(coordinator.state(), &DragState::Idle);
    }
}
