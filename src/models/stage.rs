//! Stage model.

use serde::{Deserialize, Serialize};

/// A performance space of the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Unique stage identifier.
    pub id: String,
    /// Display name (also matched by per-stage slot rules).
    pub name: String,
}

/// Creation payload for a [`Stage`].
#[derive(Debug, Clone, Default)]
pub struct StageDraft {
    pub id: Option<String>,
    pub name: String,
}

impl StageDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    /// Requests an explicit identity instead of a derived one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Partial update for a [`Stage`].
#[derive(Debug, Clone, Default)]
pub struct StagePatch {
    pub name: Option<String>,
}

impl StagePatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}
