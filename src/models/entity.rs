//! Entity addressing and the tagged create/update payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{
    CapabilityDraft, CapabilityPatch, Person, PersonDraft, PersonPatch, PersonProductionRole,
    Production, ProductionDraft, ProductionPatch, Role, RoleDraft, RolePatch, Stage, StageDraft,
    StagePatch, Timeslot, TimeslotDraft, TimeslotPatch,
};

/// Editable entity collections.
///
/// Placements are not listed: they are created and removed only through
/// placement operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Stage,
    Production,
    Timeslot,
    Role,
    Person,
    /// Person-production-role capability edge.
    Capability,
}

impl EntityKind {
    /// Prefix used for generated fallback identities.
    pub fn id_prefix(self) -> &'static str {
        match self {
            EntityKind::Stage => "stage",
            EntityKind::Production => "prod",
            EntityKind::Timeslot => "slot",
            EntityKind::Role => "role",
            EntityKind::Person => "person",
            EntityKind::Capability => "ppr",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Stage => "stage",
            EntityKind::Production => "production",
            EntityKind::Timeslot => "timeslot",
            EntityKind::Role => "role",
            EntityKind::Person => "person",
            EntityKind::Capability => "capability",
        };
        f.write_str(name)
    }
}

/// Address of one entity: its collection plus identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn stage(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Stage, id)
    }

    pub fn production(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Production, id)
    }

    pub fn timeslot(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Timeslot, id)
    }

    pub fn role(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Role, id)
    }

    pub fn person(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Person, id)
    }

    pub fn capability(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Capability, id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.id)
    }
}

/// An entity of any editable kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Stage(Stage),
    Production(Production),
    Timeslot(Timeslot),
    Role(Role),
    Person(Person),
    Capability(PersonProductionRole),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Stage(_) => EntityKind::Stage,
            Entity::Production(_) => EntityKind::Production,
            Entity::Timeslot(_) => EntityKind::Timeslot,
            Entity::Role(_) => EntityKind::Role,
            Entity::Person(_) => EntityKind::Person,
            Entity::Capability(_) => EntityKind::Capability,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Stage(e) => &e.id,
            Entity::Production(e) => &e.id,
            Entity::Timeslot(e) => &e.id,
            Entity::Role(e) => &e.id,
            Entity::Person(e) => &e.id,
            Entity::Capability(e) => &e.id,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind(), self.id())
    }
}

/// Creation payload, tagged by kind.
#[derive(Debug, Clone)]
pub enum EntityDraft {
    Stage(StageDraft),
    Production(ProductionDraft),
    Timeslot(TimeslotDraft),
    Role(RoleDraft),
    Person(PersonDraft),
    Capability(CapabilityDraft),
}

impl EntityDraft {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityDraft::Stage(_) => EntityKind::Stage,
            EntityDraft::Production(_) => EntityKind::Production,
            EntityDraft::Timeslot(_) => EntityKind::Timeslot,
            EntityDraft::Role(_) => EntityKind::Role,
            EntityDraft::Person(_) => EntityKind::Person,
            EntityDraft::Capability(_) => EntityKind::Capability,
        }
    }

    /// Explicitly requested identity, if any.
    pub fn explicit_id(&self) -> Option<&str> {
        match self {
            EntityDraft::Stage(d) => d.id.as_deref(),
            EntityDraft::Production(d) => d.id.as_deref(),
            EntityDraft::Timeslot(d) => d.id.as_deref(),
            EntityDraft::Role(d) => d.id.as_deref(),
            EntityDraft::Person(d) => d.id.as_deref(),
            EntityDraft::Capability(d) => d.id.as_deref(),
        }
    }

    /// Human-readable label the identity is derived from.
    ///
    /// Timeslots and capability edges carry no label and always get a
    /// fallback identity unless one is given explicitly.
    pub fn label(&self) -> &str {
        match self {
            EntityDraft::Stage(d) => &d.name,
            EntityDraft::Production(d) => &d.title,
            EntityDraft::Role(d) => &d.name,
            EntityDraft::Person(d) => &d.name,
            EntityDraft::Timeslot(_) | EntityDraft::Capability(_) => "",
        }
    }
}

macro_rules! impl_from_draft {
    ($($draft:ident => $variant:ident),* $(,)?) => {
        $(impl From<$draft> for EntityDraft {
            fn from(draft: $draft) -> Self {
                EntityDraft::$variant(draft)
            }
        })*
    };
}

impl_from_draft!(
    StageDraft => Stage,
    ProductionDraft => Production,
    TimeslotDraft => Timeslot,
    RoleDraft => Role,
    PersonDraft => Person,
    CapabilityDraft => Capability,
);

/// Partial update, tagged by kind.
#[derive(Debug, Clone)]
pub enum EntityPatch {
    Stage(StagePatch),
    Production(ProductionPatch),
    Timeslot(TimeslotPatch),
    Role(RolePatch),
    Person(PersonPatch),
    Capability(CapabilityPatch),
}

impl EntityPatch {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityPatch::Stage(_) => EntityKind::Stage,
            EntityPatch::Production(_) => EntityKind::Production,
            EntityPatch::Timeslot(_) => EntityKind::Timeslot,
            EntityPatch::Role(_) => EntityKind::Role,
            EntityPatch::Person(_) => EntityKind::Person,
            EntityPatch::Capability(_) => EntityKind::Capability,
        }
    }
}

macro_rules! impl_from_patch {
    ($($patch:ident => $variant:ident),* $(,)?) => {
        $(impl From<$patch> for EntityPatch {
            fn from(patch: $patch) -> Self {
                EntityPatch::$variant(patch)
            }
        })*
    };
}

impl_from_patch!(
    StagePatch => Stage,
    ProductionPatch => Production,
    TimeslotPatch => Timeslot,
    RolePatch => Role,
    PersonPatch => Person,
    CapabilityPatch => Capability,
);

/// Delete behaviour for entities that others still reference.
///
/// Only stages honour `Restrict`; every other kind always cascades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemovePolicy {
    /// Refuse to delete while dependents exist.
    #[default]
    Restrict,
    /// Delete dependents along with the entity.
    Cascade,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ref_display() {
        assert_eq!(EntityRef::production("p1").to_string(), "production 'p1'");
        assert_eq!(EntityRef::capability("x").to_string(), "capability 'x'");
    }

    #[test]
    fn test_draft_labels() {
        let draft: EntityDraft = StageDraft::new("Main Stage").into();
        assert_eq!(draft.kind(), EntityKind::Stage);
        assert_eq!(draft.label(), "Main Stage");
        assert_eq!(draft.explicit_id(), None);

        let draft: EntityDraft = StageDraft::new("Main Stage").with_id("s1").into();
        assert_eq!(draft.explicit_id(), Some("s1"));
    }
}
