//! Task entity, partial updates and field bookkeeping.
//!
//! A [`Task`] doubles as the remote row: it is what the remote store returns
//! from reads and writes. Local changes travel as [`TaskPatch`] values, which
//! carry only the fields they set. [`FieldSet`] records which fields a pending
//! change touches so remote merges can leave those alone.

use crate::libs::section::SectionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type TaskId = String;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Inbox,
    /// Waiting on someone else.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    /// Big Three candidate.
    #[serde(default)]
    pub important: bool,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub status: TaskStatus,
    /// Explicit placement for buckets that flags cannot express.
    #[serde(default)]
    pub section: Option<SectionId>,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub link: Option<String>,
    /// Attachment ids owned by this task. Opaque here.
    #[serde(default)]
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            completed: false,
            important: false,
            urgent: false,
            status: TaskStatus::Inbox,
            section: None,
            order: 0,
            deadline: None,
            amount: None,
            link: None,
            attachments: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn with_important(mut self, important: bool) -> Self {
        self.important = important;
        self
    }

    pub fn with_urgent(mut self, urgent: bool) -> Self {
        self.urgent = urgent;
        self
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_section(mut self, section: SectionId) -> Self {
        self.section = Some(section);
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    /// Counts toward the Big Three limit.
    pub fn is_active_important(&self) -> bool {
        self.important && !self.completed
    }

    /// Copies a single field from `other`.
    pub fn copy_field(&mut self, other: &Task, field: Field) {
        match field {
            Field::Title => self.title = other.title.clone(),
            Field::Completed => self.completed = other.completed,
            Field::Important => self.important = other.important,
            Field::Urgent => self.urgent = other.urgent,
            Field::Status => self.status = other.status,
            Field::Section => self.section = other.section.clone(),
            Field::Order => self.order = other.order,
            Field::Deadline => self.deadline = other.deadline,
            Field::Amount => self.amount = other.amount,
            Field::Link => self.link = other.link.clone(),
            Field::Attachments => self.attachments = other.attachments.clone(),
        }
    }

    /// Fields whose values differ between `self` and `other`.
    pub fn differing_fields(&self, other: &Task) -> FieldSet {
        let mut set = FieldSet::empty();
        for field in Field::ALL {
            let same = match field {
                Field::Title => self.title == other.title,
                Field::Completed => self.completed == other.completed,
                Field::Important => self.important == other.important,
                Field::Urgent => self.urgent == other.urgent,
                Field::Status => self.status == other.status,
                Field::Section => self.section == other.section,
                Field::Order => self.order == other.order,
                Field::Deadline => self.deadline == other.deadline,
                Field::Amount => self.amount == other.amount,
                Field::Link => self.link == other.link,
                Field::Attachments => self.attachments == other.attachments,
            };
            if !same {
                set.insert(field);
            }
        }
        set
    }
}

/// Mutable task fields, as far as patches and merges are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Completed,
    Important,
    Urgent,
    Status,
    Section,
    Order,
    Deadline,
    Amount,
    Link,
    Attachments,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::Title,
        Field::Completed,
        Field::Important,
        Field::Urgent,
        Field::Status,
        Field::Section,
        Field::Order,
        Field::Deadline,
        Field::Amount,
        Field::Link,
        Field::Attachments,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Completed => "completed",
            Field::Important => "important",
            Field::Urgent => "urgent",
            Field::Status => "status",
            Field::Section => "section",
            Field::Order => "order",
            Field::Deadline => "deadline",
            Field::Amount => "amount",
            Field::Link => "link",
            Field::Attachments => "attachments",
        }
    }
}

/// Small bit set of [`Field`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FieldSet(u16);

impl FieldSet {
    /// Fields that decide which section a task lives in and where.
    pub const PLACEMENT: FieldSet = FieldSet(
        (1 << Field::Completed as u16) | (1 << Field::Important as u16) | (1 << Field::Urgent as u16) | (1 << Field::Status as u16) | (1 << Field::Section as u16) | (1 << Field::Order as u16),
    );

    pub fn empty() -> Self {
        FieldSet(0)
    }

    pub fn insert(&mut self, field: Field) {
        self.0 |= field.bit();
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0 & field.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: FieldSet) -> FieldSet {
        FieldSet(self.0 | other.0)
    }

    pub fn intersects(&self, other: FieldSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Field> {
        Field::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Field::name).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Partial update of a task. `None` leaves a field untouched; for optional
/// fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub important: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<Option<SectionId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<String>>,
}

impl TaskPatch {
    /// Patch that turns `before` into `after` for every differing field.
    pub fn diff(before: &Task, after: &Task) -> Self {
        let mut patch = TaskPatch::default();
        for field in before.differing_fields(after).iter() {
            match field {
                Field::Title => patch.title = Some(after.title.clone()),
                Field::Completed => patch.completed = Some(after.completed),
                Field::Important => patch.important = Some(after.important),
                Field::Urgent => patch.urgent = Some(after.urgent),
                Field::Status => patch.status = Some(after.status),
                Field::Section => patch.section = Some(after.section.clone()),
                Field::Order => patch.order = Some(after.order),
                Field::Deadline => patch.deadline = Some(after.deadline),
                Field::Amount => patch.amount = Some(after.amount),
                Field::Link => patch.link = Some(after.link.clone()),
                Field::Attachments => patch.attachments = Some(after.attachments.clone()),
            }
        }
        patch
    }

    pub fn order(order: i64) -> Self {
        TaskPatch { order: Some(order), ..Default::default() }
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(important) = self.important {
            task.important = important;
        }
        if let Some(urgent) = self.urgent {
            task.urgent = urgent;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(section) = &self.section {
            task.section = section.clone();
        }
        if let Some(order) = self.order {
            task.order = order;
        }
        if let Some(deadline) = self.deadline {
            task.deadline = deadline;
        }
        if let Some(amount) = self.amount {
            task.amount = amount;
        }
        if let Some(link) = &self.link {
            task.link = link.clone();
        }
        if let Some(attachments) = &self.attachments {
            task.attachments = attachments.clone();
        }
    }

    /// Returns a copy of `task` with this patch applied.
    pub fn applied(&self, task: &Task) -> Task {
        let mut next = task.clone();
        self.apply_to(&mut next);
        next
    }

    pub fn fields(&self) -> FieldSet {
        let mut set = FieldSet::empty();
        let present = [
            (Field::Title, self.title.is_some()),
            (Field::Completed, self.completed.is_some()),
            (Field::Important, self.important.is_some()),
            (Field::Urgent, self.urgent.is_some()),
            (Field::Status, self.status.is_some()),
            (Field::Section, self.section.is_some()),
            (Field::Order, self.order.is_some()),
            (Field::Deadline, self.deadline.is_some()),
            (Field::Amount, self.amount.is_some()),
            (Field::Link, self.link.is_some()),
            (Field::Attachments, self.attachments.is_some()),
        ];
        for (field, is_set) in present {
            if is_set {
                set.insert(field);
            }
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Folds a later patch into this one; later values win.
    pub fn merge(&mut self, later: TaskPatch) {
        let TaskPatch {
            title,
            completed,
            important,
            urgent,
            status,
            section,
            order,
            deadline,
            amount,
            link,
            attachments,
        } = later;
        self.title = title.or(self.title.take());
        self.completed = completed.or(self.completed);
        self.important = important.or(self.important);
        self.urgent = urgent.or(self.urgent);
        self.status = status.or(self.status);
        self.section = section.or(self.section.take());
        self.order = order.or(self.order);
        self.deadline = deadline.or(self.deadline);
        self.amount = amount.or(self.amount);
        self.link = link.or(self.link.take());
        self.attachments = attachments.or(self.attachments.take());
    }
}

/// User-facing field edits. These never change classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldEdit {
    pub title: Option<String>,
    pub deadline: Option<Option<DateTime<Utc>>>,
    pub amount: Option<Option<f64>>,
    pub link: Option<Option<String>>,
}

impl FieldEdit {
    pub fn title(title: impl Into<String>) -> Self {
        FieldEdit { title: Some(title.into()), ..Default::default() }
    }

    pub fn into_patch(self) -> TaskPatch {
        TaskPatch {
            title: self.title.map(|t| t.trim().to_string()),
            deadline: self.deadline,
            amount: self.amount,
            link: self.link.map(|l| l.filter(|s| !s.trim().is_empty())),
            ..Default::default()
        }
    }
}
