//! Section identifiers and section-level constants.
//!
//! A section is a named partition of the task collection with its own internal
//! order. Five sections are derived from task flags (`big_three`, `urgent`,
//! `waiting`, `routine`, `completed`); the remaining ones (`weekly`, `inbox`,
//! `custom-*`) are placement buckets that a task only lands in through an
//! explicit override.
//!
//! ## Usage
//!
//! ```rust
//! use tasklane::libs::section::SectionId;
//!
//! let section: SectionId = "custom-errands".parse().unwrap();
//! assert!(section.is_placement());
//! assert_eq!(section.to_string(), "custom-errands");
//! ```

use crate::libs::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum number of active (important and not completed) tasks.
pub const BIG_THREE_LIMIT: usize = 3;

const CUSTOM_PREFIX: &str = "custom-";

/// Identifier of a section.
///
/// The derived `Ord` follows declaration order, which is also the canonical
/// display order used when no display preference says otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SectionId {
    BigThree,
    Urgent,
    Waiting,
    Routine,
    Weekly,
    Inbox,
    Custom(String),
    Completed,
}

impl SectionId {
    /// Sections every board shows, even when empty.
    pub const FIXED: [SectionId; 5] = [SectionId::BigThree, SectionId::Urgent, SectionId::Waiting, SectionId::Routine, SectionId::Completed];

    /// Returns true for buckets that can only be reached through an explicit override.
    pub fn is_placement(&self) -> bool {
        matches!(self, SectionId::Weekly | SectionId::Inbox | SectionId::Custom(_))
    }

    /// Hard cardinality limit of the section, if any.
    pub fn capacity(&self) -> Option<usize> {
        match self {
            SectionId::BigThree => Some(BIG_THREE_LIMIT),
            _ => None,
        }
    }

    pub fn title(&self) -> String {
        match self {
            SectionId::BigThree => "Big Three".to_string(),
            SectionId::Urgent => "Urgent".to_string(),
            SectionId::Waiting => "Waiting".to_string(),
            SectionId::Routine => "Routine".to_string(),
            SectionId::Weekly => "This Week".to_string(),
            SectionId::Inbox => "Inbox".to_string(),
            SectionId::Custom(name) => name.replace('-', " "),
            SectionId::Completed => "Completed".to_string(),
        }
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionId::BigThree => write!(f, "big_three"),
            SectionId::Urgent => write!(f, "urgent"),
            SectionId::Waiting => write!(f, "waiting"),
            SectionId::Routine => write!(f, "routine"),
            SectionId::Weekly => write!(f, "weekly"),
            SectionId::Inbox => write!(f, "inbox"),
            SectionId::Custom(name) => write!(f, "{}{}", CUSTOM_PREFIX, name),
            SectionId::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for SectionId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "big_three" | "big-three" | "bigthree" => Ok(SectionId::BigThree),
            "urgent" => Ok(SectionId::Urgent),
            "waiting" | "pending" => Ok(SectionId::Waiting),
            "routine" => Ok(SectionId::Routine),
            "weekly" => Ok(SectionId::Weekly),
            "inbox" => Ok(SectionId::Inbox),
            "completed" | "done" => Ok(SectionId::Completed),
            other => match other.strip_prefix(CUSTOM_PREFIX) {
                Some(name) if !name.is_empty() => Ok(SectionId::Custom(name.to_string())),
                _ => Err(ValidationError::UnknownSection(s.to_string())),
            },
        }
    }
}

impl From<SectionId> for String {
    fn from(section: SectionId) -> Self {
        section.to_string()
    }
}

impl TryFrom<String> for SectionId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_and_custom_sections() {
        assert_eq!("big_three".parse::<SectionId>().unwrap(), SectionId::BigThree);
        assert_eq!("Urgent".parse::<SectionId>().unwrap(), SectionId::Urgent);
        assert_eq!("custom-garden".parse::<SectionId>().unwrap(), SectionId::Custom("garden".into()));
        assert!("custom-".parse::<SectionId>().is_err());
        assert!("someday".parse::<SectionId>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for section in SectionId::FIXED.iter().cloned().chain([SectionId::Weekly, SectionId::Inbox, SectionId::Custom("errands".into())]) {
            assert_eq!(section.to_string().parse::<SectionId>().unwrap(), section);
        }
    }

    #[test]
    fn canonical_order_puts_completed_last() {
        let mut sections = vec![SectionId::Completed, SectionId::Custom("a".into()), SectionId::Routine, SectionId::BigThree];
        sections.sort();
        assert_eq!(sections, vec![SectionId::BigThree, SectionId::Routine, SectionId::Custom("a".into()), SectionId::Completed]);
    }

    #[test]
    fn only_big_three_has_capacity() {
        assert_eq!(SectionId::BigThree.capacity(), Some(BIG_THREE_LIMIT));
        assert_eq!(SectionId::Urgent.capacity(), None);
    }
}
