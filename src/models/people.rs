//! People, roles, and the capability edges between them.

use serde::{Deserialize, Serialize};

/// A member of the venue's staff or cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

/// A part in a production (a character, or the conductor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    /// Owning production. `None` until a production choice is committed.
    pub production_id: Option<String>,
    pub is_conductor: bool,
    /// Number of people needed on this role per performance.
    pub required_count: u32,
}

/// Capability edge: who may play which role in which production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonProductionRole {
    pub id: String,
    pub person_id: Option<String>,
    pub production_id: Option<String>,
    pub role_id: Option<String>,
    pub can_play: bool,
}

impl PersonProductionRole {
    /// Whether every reference has been committed.
    pub fn is_complete(&self) -> bool {
        self.person_id.is_some() && self.production_id.is_some() && self.role_id.is_some()
    }
}

/// Creation payload for a [`Person`].
#[derive(Debug, Clone, Default)]
pub struct PersonDraft {
    pub id: Option<String>,
    pub name: String,
    pub email: Option<String>,
}

impl PersonDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Creation payload for a [`Role`].
#[derive(Debug, Clone)]
pub struct RoleDraft {
    pub id: Option<String>,
    pub name: String,
    pub production_id: Option<String>,
    pub is_conductor: bool,
    pub required_count: u32,
}

impl RoleDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            production_id: None,
            is_conductor: false,
            required_count: 1,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn for_production(mut self, production_id: impl Into<String>) -> Self {
        self.production_id = Some(production_id.into());
        self
    }

    /// Marks the role as the conductor's podium.
    pub fn conductor(mut self) -> Self {
        self.is_conductor = true;
        self
    }

    pub fn with_required_count(mut self, required_count: u32) -> Self {
        self.required_count = required_count;
        self
    }
}

/// Creation payload for a [`PersonProductionRole`].
#[derive(Debug, Clone)]
pub struct CapabilityDraft {
    pub id: Option<String>,
    pub person_id: Option<String>,
    pub production_id: Option<String>,
    pub role_id: Option<String>,
    pub can_play: bool,
}

impl Default for CapabilityDraft {
    fn default() -> Self {
        Self {
            id: None,
            person_id: None,
            production_id: None,
            role_id: None,
            can_play: true,
        }
    }
}

impl CapabilityDraft {
    /// An empty edge whose references will be staged later.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fully specified edge.
    pub fn linking(
        person_id: impl Into<String>,
        production_id: impl Into<String>,
        role_id: impl Into<String>,
    ) -> Self {
        Self {
            person_id: Some(person_id.into()),
            production_id: Some(production_id.into()),
            role_id: Some(role_id.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_can_play(mut self, can_play: bool) -> Self {
        self.can_play = can_play;
        self
    }
}

/// Partial update for a [`Person`].
#[derive(Debug, Clone, Default)]
pub struct PersonPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the email.
    pub email: Option<Option<String>>,
}

/// Partial update for a [`Role`].
#[derive(Debug, Clone, Default)]
pub struct RolePatch {
    pub name: Option<String>,
    pub production_id: Option<String>,
    pub is_conductor: Option<bool>,
    pub required_count: Option<u32>,
}

/// Partial update for a [`PersonProductionRole`].
#[derive(Debug, Clone, Default)]
pub struct CapabilityPatch {
    pub person_id: Option<String>,
    pub production_id: Option<String>,
    pub role_id: Option<String>,
    pub can_play: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_draft_builder() {
        let d = RoleDraft::new("Conductor")
            .for_production("p1")
            .conductor()
            .with_required_count(2);
        assert!(d.is_conductor);
        assert_eq!(d.required_count, 2);
        assert_eq!(d.production_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_capability_completeness() {
        let edge = PersonProductionRole {
            id: "ppr_1".into(),
            person_id: Some("anna".into()),
            production_id: Some("p1".into()),
            role_id: None,
            can_play: true,
        };
        assert!(!edge.is_complete());
        assert!(CapabilityDraft::new().can_play);
    }
}
