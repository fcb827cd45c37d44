//! Per-section ordering.
//!
//! Operations here are planners: they read a [`Board`], validate, and return a
//! [`MovePlan`] listing the per-task patches that realize the move. Nothing is
//! mutated; the optimistic mutator applies a plan atomically.
//!
//! Ordering uses whole-section renumbering: after an insertion the target
//! section is renumbered `1..=N`. The section a task leaves is not renumbered;
//! gaps there are harmless because only relative order matters.

use crate::libs::board::Board;
use crate::libs::classifier::{classify, placement};
use crate::libs::error::ValidationError;
use crate::libs::section::{SectionId, BIG_THREE_LIMIT};
use crate::libs::task::{TaskId, TaskPatch};

/// Validated set of per-task changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovePlan {
    pub patches: Vec<(TaskId, TaskPatch)>,
}

impl MovePlan {
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        self.patches.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn patch_for(&self, task_id: &str) -> Option<&TaskPatch> {
        self.patches.iter().find(|(id, _)| id == task_id).map(|(_, p)| p)
    }

    fn push(&mut self, task_id: &str, patch: TaskPatch) {
        if patch.is_empty() {
            return;
        }
        match self.patches.iter_mut().find(|(id, _)| id == task_id) {
            Some((_, existing)) => existing.merge(patch),
            None => self.patches.push((task_id.to_string(), patch)),
        }
    }
}

/// Moves `task_id` to `target_index` inside `section` and renumbers the
/// section. Indexes past the end mean "last". A task already at the target
/// index yields an empty plan.
pub fn reorder_within_section(board: &Board, section: &SectionId, task_id: &str, target_index: usize) -> Result<MovePlan, ValidationError> {
    require_task(board, task_id)?;
    let mut ids = board.section(section).to_vec();
    let current = ids.iter().position(|id| id == task_id).ok_or_else(|| ValidationError::NotInSection {
        task_id: task_id.to_string(),
        section: section.clone(),
    })?;

    let target = target_index.min(ids.len() - 1);
    if current == target {
        return Ok(MovePlan::default());
    }

    let moved = ids.remove(current);
    ids.insert(target, moved);

    let mut plan = MovePlan::default();
    renumber(board, &ids, &mut plan);
    Ok(plan)
}

/// Moves `task_id` from `from` into `to`, changing whichever attributes the
/// classifier precedence requires, and inserts it before `before` (or at the
/// end). The target's capacity is checked first; an existing member is never
/// evicted to make room.
pub fn move_across_sections(board: &Board, task_id: &str, from: &SectionId, to: &SectionId, before: Option<&str>) -> Result<MovePlan, ValidationError> {
    let task = require_task(board, task_id)?;
    if board.section_of(task_id) != Some(from) {
        return Err(ValidationError::NotInSection {
            task_id: task_id.to_string(),
            section: from.clone(),
        });
    }
    if let Some(before) = before {
        require_task(board, before)?;
        if board.section_of(before) != Some(to) || before == task_id {
            return Err(ValidationError::NotInSection {
                task_id: before.to_string(),
                section: to.clone(),
            });
        }
    }

    if from == to {
        let members = board.section(to);
        let index = match before {
            Some(before) => {
                let target = members.iter().position(|id| id == before).unwrap_or(members.len());
                let current = members.iter().position(|id| id == task_id).unwrap_or(0);
                if current < target {
                    target - 1
                } else {
                    target
                }
            }
            None => members.len(),
        };
        return reorder_within_section(board, to, task_id, index);
    }

    let attributes = placement(task, to);
    if classify(&attributes.applied(task)) != *to {
        return Err(ValidationError::UnreachableSection(to.clone()));
    }

    let mut plan = MovePlan::default();
    plan.push(task_id, attributes);
    check_capacity(board, &plan)?;

    let mut ids: Vec<TaskId> = board.section(to).to_vec();
    let index = before.and_then(|b| ids.iter().position(|id| id == b)).unwrap_or(ids.len());
    ids.insert(index, task_id.to_string());
    renumber(board, &ids, &mut plan);
    Ok(plan)
}

/// Applies an attribute change to one task. If the task's section changes it
/// is appended to the end of its new section.
pub fn reclassify(board: &Board, task_id: &str, attributes: TaskPatch) -> Result<MovePlan, ValidationError> {
    let task = require_task(board, task_id)?;
    let next = attributes.applied(task);
    let from = classify(task);
    let to = classify(&next);

    let mut plan = MovePlan::default();
    plan.push(task_id, attributes);
    if from != to {
        plan.push(task_id, TaskPatch::order(board.max_order(&to) + 1));
    }
    check_capacity(board, &plan)?;
    Ok(plan)
}

/// Trailing order value for a new task in `section`.
pub fn next_order(board: &Board, section: &SectionId) -> i64 {
    board.max_order(section) + 1
}

/// Rejects plans that would raise the active-important count above the limit.
///
/// Plans that do not increase the count pass even if the board is already
/// over the limit, so unrelated work is never blocked by remote data.
pub fn check_capacity(board: &Board, plan: &MovePlan) -> Result<(), ValidationError> {
    let before = board.active_important_count();
    let after = board.active_important_count_with(&plan.patches);
    if after > BIG_THREE_LIMIT && after > before {
        return Err(ValidationError::big_three_full());
    }
    Ok(())
}

fn require_task<'a>(board: &'a Board, task_id: &str) -> Result<&'a crate::libs::task::Task, ValidationError> {
    board.get(task_id).ok_or_else(|| ValidationError::UnknownTask(task_id.to_string()))
}

fn renumber(board: &Board, ids: &[TaskId], plan: &mut MovePlan) {
    for (index, id) in ids.iter().enumerate() {
        let order = index as i64 + 1;
        let current = plan.patch_for(id).and_then(|p| p.order).or_else(|| board.get(id).map(|t| t.order));
        if current != Some(order) {
            plan.push(id, TaskPatch::order(order));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::task::{Task, TaskStatus};
    use chrono::Utc;

    fn board(tasks: Vec<Task>) -> Board {
        Board::from_tasks(tasks).0
    }

    fn apply(board: &mut Board, plan: &MovePlan) {
        for (id, patch) in &plan.patches {
            board.apply_patch(id, patch, Utc::now());
        }
    }

    fn orders(board: &Board, section: &SectionId) -> Vec<(String, i64)> {
        board.section_tasks(section).into_iter().map(|t| (t.id, t.order)).collect()
    }

    #[test]
    fn reorder_to_front_renumbers_section() {
        let mut b = board(vec![Task::new("A", "a").with_order(1), Task::new("B", "b").with_order(2), Task::new("C", "c").with_order(3)]);
        let plan = reorder_within_section(&b, &SectionId::Routine, "C", 0).unwrap();
        apply(&mut b, &plan);
        assert_eq!(orders(&b, &SectionId::Routine), vec![("C".into(), 1), ("A".into(), 2), ("B".into(), 3)]);
    }

    #[test]
    fn reorder_in_place_is_a_no_op() {
        let b = board(vec![Task::new("A", "a").with_order(1), Task::new("B", "b").with_order(5)]);
        let plan = reorder_within_section(&b, &SectionId::Routine, "B", 1).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn reorder_rejects_foreign_task() {
        let b = board(vec![Task::new("A", "a").with_urgent(true)]);
        let err = reorder_within_section(&b, &SectionId::Routine, "A", 0).unwrap_err();
        assert!(matches!(err, ValidationError::NotInSection { .. }));
        assert_eq!(reorder_within_section(&b, &SectionId::Routine, "Z", 0).unwrap_err(), ValidationError::UnknownTask("Z".into()));
    }

    #[test]
    fn move_into_full_big_three_is_rejected() {
        let b = board(vec![
            Task::new("T1", "1").with_important(true).with_order(1),
            Task::new("T2", "2").with_important(true).with_order(2),
            Task::new("T3", "3").with_important(true).with_order(3),
            Task::new("T4", "4").with_order(1),
        ]);
        let err = move_across_sections(&b, "T4", &SectionId::Routine, &SectionId::BigThree, None).unwrap_err();
        assert_eq!(err, ValidationError::big_three_full());
    }

    #[test]
    fn move_to_empty_section_appends() {
        let mut b = board(vec![Task::new("E", "e").with_status(TaskStatus::Pending).with_order(4)]);
        let plan = move_across_sections(&b, "E", &SectionId::Waiting, &SectionId::Urgent, None).unwrap();
        apply(&mut b, &plan);
        assert_eq!(orders(&b, &SectionId::Urgent), vec![("E".into(), 1)]);
        assert!(b.section(&SectionId::Waiting).is_empty());
    }

    #[test]
    fn move_before_reference_inserts_and_renumbers_target() {
        let mut b = board(vec![
            Task::new("U1", "u1").with_urgent(true).with_order(1),
            Task::new("U2", "u2").with_urgent(true).with_order(2),
            Task::new("R", "r").with_order(1),
        ]);
        let plan = move_across_sections(&b, "R", &SectionId::Routine, &SectionId::Urgent, Some("U2")).unwrap();
        apply(&mut b, &plan);
        assert_eq!(orders(&b, &SectionId::Urgent), vec![("U1".into(), 1), ("R".into(), 2), ("U2".into(), 3)]);
    }

    #[test]
    fn round_trip_restores_original_order() {
        let mut b = board(vec![
            Task::new("x", "x").with_order(1),
            Task::new("t", "t").with_order(2),
            Task::new("y", "y").with_order(3),
            Task::new("u", "u").with_urgent(true).with_order(1),
        ]);
        let there = move_across_sections(&b, "t", &SectionId::Routine, &SectionId::Urgent, None).unwrap();
        apply(&mut b, &there);
        let back = move_across_sections(&b, "t", &SectionId::Urgent, &SectionId::Routine, Some("y")).unwrap();
        apply(&mut b, &back);
        assert_eq!(b.get("t").unwrap().order, 2);
        assert_eq!(orders(&b, &SectionId::Routine), vec![("x".into(), 1), ("t".into(), 2), ("y".into(), 3)]);
    }

    #[test]
    fn reclassify_appends_to_new_section() {
        let b = board(vec![Task::new("a", "a").with_order(1), Task::new("c", "c").with_completed(true).with_order(7)]);
        let plan = reclassify(&b, "a", TaskPatch { completed: Some(true), ..Default::default() }).unwrap();
        let patch = plan.patch_for("a").unwrap();
        assert_eq!(patch.completed, Some(true));
        assert_eq!(patch.order, Some(8));
    }

    #[test]
    fn reclassify_rejects_uncompleting_into_full_big_three() {
        let b = board(vec![
            Task::new("T1", "1").with_important(true),
            Task::new("T2", "2").with_important(true),
            Task::new("T3", "3").with_important(true),
            Task::new("D", "d").with_important(true).with_completed(true),
        ]);
        let err = reclassify(&b, "D", TaskPatch { completed: Some(false), ..Default::default() }).unwrap_err();
        assert_eq!(err, ValidationError::big_three_full());
    }
}
