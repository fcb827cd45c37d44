//! Section classification.
//!
//! [`classify`] is the only place that decides which section a task lives in.
//! Precedence, first match wins:
//!
//! 1. `completed` → `completed`
//! 2. `urgent` → `urgent`
//! 3. `important` → `big_three`
//! 4. `status == pending` → `waiting`
//! 5. explicit placement override (`weekly`, `inbox`, `custom-*`)
//! 6. `routine`
//!
//! Completing a task keeps its `important`/`urgent` flags, so un-completing
//! restores the previous section. An override that names a flag-derived
//! section is ignored: those sections are reachable only through flags.
//!
//! [`placement`] is the inverse direction: the attribute changes that make
//! `classify` return a requested section.

use crate::libs::section::SectionId;
use crate::libs::task::{Task, TaskPatch, TaskStatus};

pub fn classify(task: &Task) -> SectionId {
    if task.completed {
        return SectionId::Completed;
    }
    if task.urgent {
        return SectionId::Urgent;
    }
    if task.important {
        return SectionId::BigThree;
    }
    if task.status == TaskStatus::Pending {
        return SectionId::Waiting;
    }
    match &task.section {
        Some(section) if section.is_placement() => section.clone(),
        _ => SectionId::Routine,
    }
}

/// Attribute changes that make `classify` yield `target` for `task`.
///
/// Only fields that actually change are included; the patch is empty when
/// the task already lives in `target`.
pub fn placement(task: &Task, target: &SectionId) -> TaskPatch {
    if classify(task) == *target {
        return TaskPatch::default();
    }

    let mut placed = task.clone();
    match target {
        SectionId::Completed => placed.completed = true,
        SectionId::Urgent => {
            placed.completed = false;
            placed.urgent = true;
        }
        SectionId::BigThree => {
            placed.completed = false;
            placed.urgent = false;
            placed.important = true;
        }
        SectionId::Waiting => {
            placed.completed = false;
            placed.urgent = false;
            placed.important = false;
            placed.status = TaskStatus::Pending;
        }
        SectionId::Routine => {
            clear_flags(&mut placed);
            placed.section = None;
        }
        bucket => {
            clear_flags(&mut placed);
            placed.section = Some(bucket.clone());
        }
    }

    TaskPatch::diff(task, &placed)
}

fn clear_flags(task: &mut Task) {
    task.completed = false;
    task.urgent = false;
    task.important = false;
    task.status = TaskStatus::Inbox;
}

/// Number of tasks counting toward the Big Three limit.
pub fn active_important_count<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> usize {
    tasks.into_iter().filter(|t| t.is_active_important()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new("t", "Task")
    }

    #[test]
    fn default_task_is_routine() {
        assert_eq!(classify(&task()), SectionId::Routine);
    }

    #[test]
    fn urgent_outranks_important() {
        let d = task().with_urgent(true).with_important(true);
        assert_eq!(classify(&d), SectionId::Urgent);
    }

    #[test]
    fn completed_outranks_everything_and_keeps_flags() {
        let t = task().with_urgent(true).with_important(true).with_completed(true);
        assert_eq!(classify(&t), SectionId::Completed);

        let restored = t.clone().with_completed(false);
        assert_eq!(classify(&restored), SectionId::Urgent);
        assert!(restored.important);
    }

    #[test]
    fn waiting_outranks_override() {
        let t = task().with_status(TaskStatus::Pending).with_section(SectionId::Weekly);
        assert_eq!(classify(&t), SectionId::Waiting);
    }

    #[test]
    fn override_applies_only_to_placement_buckets() {
        assert_eq!(classify(&task().with_section(SectionId::Custom("home".into()))), SectionId::Custom("home".into()));
        assert_eq!(classify(&task().with_section(SectionId::Urgent)), SectionId::Routine);
        assert_eq!(classify(&task().with_section(SectionId::BigThree)), SectionId::Routine);
    }

    #[test]
    fn classification_is_deterministic() {
        let t = task().with_important(true).with_status(TaskStatus::Pending);
        assert_eq!(classify(&t), classify(&t.clone()));
        assert_eq!(classify(&t), SectionId::BigThree);
    }

    #[test]
    fn placement_reaches_every_section() {
        let starts = [
            task(),
            task().with_completed(true).with_important(true),
            task().with_urgent(true),
            task().with_status(TaskStatus::Pending),
            task().with_section(SectionId::Inbox),
        ];
        let targets = [
            SectionId::BigThree,
            SectionId::Urgent,
            SectionId::Waiting,
            SectionId::Routine,
            SectionId::Completed,
            SectionId::Weekly,
            SectionId::Custom("garden".into()),
        ];
        for start in &starts {
            for target in &targets {
                let placed = placement(start, target).applied(start);
                assert_eq!(&classify(&placed), target, "from {:?}", start);
            }
        }
    }

    #[test]
    fn placement_into_current_section_is_empty() {
        let t = task().with_important(true);
        assert!(placement(&t, &SectionId::BigThree).is_empty());
    }

    #[test]
    fn completing_keeps_priority_flags() {
        let t = task().with_important(true);
        let patch = placement(&t, &SectionId::Completed);
        assert_eq!(patch.completed, Some(true));
        assert_eq!(patch.important, None);
    }
}
