//! Production model.
//!
//! A production is a staged work (opera, ballet, play) that the venue shows
//! a limited number of times on one stage during the planning month.

use serde::{Deserialize, Serialize};

/// A production in the repertoire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    /// Unique production identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Home stage. `None` until a stage choice is committed.
    pub stage_id: Option<String>,
    /// Upper bound on committed placements (fixed + scheduled).
    pub max_shows: u32,
    /// Whether the solver should prefer weekend slots.
    pub weekend_priority: bool,
}

impl Production {
    /// Whether the production plays on the given stage.
    pub fn plays_on(&self, stage_id: &str) -> bool {
        self.stage_id.as_deref() == Some(stage_id)
    }
}

/// Creation payload for a [`Production`].
#[derive(Debug, Clone)]
pub struct ProductionDraft {
    pub id: Option<String>,
    pub title: String,
    pub stage_id: Option<String>,
    pub max_shows: u32,
    pub weekend_priority: bool,
}

impl ProductionDraft {
    /// Creates a draft with one show and no stage.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            stage_id: None,
            max_shows: 1,
            weekend_priority: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the home stage.
    pub fn on_stage(mut self, stage_id: impl Into<String>) -> Self {
        self.stage_id = Some(stage_id.into());
        self
    }

    pub fn with_max_shows(mut self, max_shows: u32) -> Self {
        self.max_shows = max_shows;
        self
    }

    pub fn with_weekend_priority(mut self, weekend_priority: bool) -> Self {
        self.weekend_priority = weekend_priority;
        self
    }
}

/// Partial update for a [`Production`].
#[derive(Debug, Clone, Default)]
pub struct ProductionPatch {
    pub title: Option<String>,
    pub stage_id: Option<String>,
    pub max_shows: Option<u32>,
    pub weekend_priority: Option<bool>,
}

impl ProductionPatch {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_stage(mut self, stage_id: impl Into<String>) -> Self {
        self.stage_id = Some(stage_id.into());
        self
    }

    pub fn with_max_shows(mut self, max_shows: u32) -> Self {
        self.max_shows = Some(max_shows);
        self
    }

    pub fn with_weekend_priority(mut self, weekend_priority: bool) -> Self {
        self.weekend_priority = Some(weekend_priority);
        self
    }
}
