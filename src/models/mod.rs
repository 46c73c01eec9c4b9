//! Repertoire domain models.
//!
//! Provides the entity types of a venue's scheduling ledger and the
//! drafts/patches used to create and edit them. Optional references are
//! normalized once, when an entity is created, instead of at every read.
//!
//! # Entity Map
//!
//! | Entity | References |
//! |--------|-----------|
//! | Stage | |
//! | Production | Stage (optional until committed) |
//! | Timeslot | Stage |
//! | Role | Production (optional until committed) |
//! | Person | |
//! | PersonProductionRole | Person, Production, Role (each optional until committed) |
//! | FixedAssignment | Production, Timeslot, Stage |
//! | ScheduledPlacement | Production, Timeslot, Stage |
//! | RoleAssignment | schedule item, Person, Role |

pub mod clock_time;
mod entity;
mod people;
mod placement;
mod production;
mod stage;
mod timeslot;

pub use entity::{Entity, EntityDraft, EntityKind, EntityPatch, EntityRef, RemovePolicy};
pub use people::{
    CapabilityDraft, CapabilityPatch, Person, PersonDraft, PersonPatch, PersonProductionRole,
    Role, RoleDraft, RolePatch,
};
pub use placement::{
    FixedAssignment, PlacementId, PlacementKind, RoleAssignment, ScheduleItemId,
    ScheduledPlacement,
};
pub use production::{Production, ProductionDraft, ProductionPatch};
pub use stage::{Stage, StageDraft, StagePatch};
pub use timeslot::{Timeslot, TimeslotDraft, TimeslotPatch};
