//! Display-preference collaborator: which sections are shown, and in what
//! order. Task order inside a section is owned by the store, not by this.

use crate::libs::config::DisplayConfig;
use crate::libs::section::SectionId;

pub trait DisplayPreferences {
    fn is_visible(&self, section: &SectionId) -> bool;

    /// Preferred section order. Sections not listed follow in canonical order.
    fn section_order(&self) -> Vec<SectionId>;
}

/// Fixed preferences, typically read from the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticPreferences {
    order: Vec<SectionId>,
    hidden: Vec<SectionId>,
}

impl StaticPreferences {
    pub fn new(order: Vec<SectionId>, hidden: Vec<SectionId>) -> Self {
        Self { order, hidden }
    }

    pub fn hide(mut self, section: SectionId) -> Self {
        self.hidden.push(section);
        self
    }
}

impl From<&DisplayConfig> for StaticPreferences {
    fn from(config: &DisplayConfig) -> Self {
        Self::new(config.order.clone(), config.hidden.clone())
    }
}

impl DisplayPreferences for StaticPreferences {
    fn is_visible(&self, section: &SectionId) -> bool {
        !self.hidden.contains(section)
    }

    fn section_order(&self) -> Vec<SectionId> {
        self.order.clone()
    }
}
