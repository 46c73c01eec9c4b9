//! Staged (two-phase) reference edits.
//!
//! An editor may try a candidate value for an optional reference without
//! committing it. Candidates live in the resolver, apart from the store, and
//! are invisible to every other component until [`StagedEditResolver::commit_all`]
//! copies them into the committed fields.
//!
//! # Staged Fields
//!
//! | Field | Owner | Target |
//! |-------|-------|--------|
//! | `ProductionStage` | Production | Stage |
//! | `RoleProduction` | Role | Production |
//! | `CapabilityPerson` | Capability | Person |
//! | `CapabilityProduction` | Capability | Production |
//! | `CapabilityRole` | Capability | Role |
//!
//! # Commit
//!
//! 1. Every selected value of a live entity is checked against the store,
//!    and a capability edge's role must belong to its production once the
//!    batch is applied. One failure aborts the whole batch and leaves store
//!    and resolver unchanged.
//! 2. Pending values of entities that no longer exist are dropped.
//! 3. The values are written and cleared from the resolver.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{EntityKind, EntityRef};
use crate::store::EntityStore;

/// An optional reference field that can be staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagedField {
    ProductionStage,
    RoleProduction,
    CapabilityPerson,
    CapabilityProduction,
    CapabilityRole,
}

impl StagedField {
    pub const ALL: [StagedField; 5] = [
        StagedField::ProductionStage,
        StagedField::RoleProduction,
        StagedField::CapabilityPerson,
        StagedField::CapabilityProduction,
        StagedField::CapabilityRole,
    ];

    /// Kind of entity that carries the field.
    pub fn owner(self) -> EntityKind {
        match self {
            StagedField::ProductionStage => EntityKind::Production,
            StagedField::RoleProduction => EntityKind::Role,
            StagedField::CapabilityPerson
            | StagedField::CapabilityProduction
            | StagedField::CapabilityRole => EntityKind::Capability,
        }
    }

    /// Kind of entity the field points at.
    pub fn target(self) -> EntityKind {
        match self {
            StagedField::ProductionStage => EntityKind::Stage,
            StagedField::RoleProduction | StagedField::CapabilityProduction => {
                EntityKind::Production
            }
            StagedField::CapabilityPerson => EntityKind::Person,
            StagedField::CapabilityRole => EntityKind::Role,
        }
    }

    /// Field name as it appears on the owning entity.
    pub fn name(self) -> &'static str {
        match self {
            StagedField::ProductionStage => "stage_id",
            StagedField::RoleProduction | StagedField::CapabilityProduction => "production_id",
            StagedField::CapabilityPerson => "person_id",
            StagedField::CapabilityRole => "role_id",
        }
    }

    /// Fields carried by `kind`.
    pub fn of(kind: EntityKind) -> impl Iterator<Item = StagedField> {
        Self::ALL.into_iter().filter(move |f| f.owner() == kind)
    }
}

/// Pending reference values, keyed by entity and field.
#[derive(Debug, Clone, Default)]
pub struct StagedEditResolver {
    pending: BTreeMap<(EntityRef, StagedField), String>,
}

impl StagedEditResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a candidate value. An empty value clears the candidate.
    pub fn stage(
        &mut self,
        entity: &EntityRef,
        field: StagedField,
        value: impl Into<String>,
    ) -> LedgerResult<()> {
        if field.owner() != entity.kind {
            return Err(LedgerError::validation(format!(
                "{} is not a field of {}",
                field.name(),
                entity.kind
            )));
        }
        let value = value.into();
        let key = (entity.clone(), field);
        if value.trim().is_empty() {
            self.pending.remove(&key);
        } else {
            self.pending.insert(key, value);
        }
        Ok(())
    }

    /// The candidate value for one field, if any.
    pub fn pending(&self, entity: &EntityRef, field: StagedField) -> Option<&str> {
        self.pending
            .get(&(entity.clone(), field))
            .map(String::as_str)
    }

    /// Drops the candidate for one field. Returns whether one existed.
    pub fn discard(&mut self, entity: &EntityRef, field: StagedField) -> bool {
        self.pending.remove(&(entity.clone(), field)).is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Entities with at least one candidate, in kind/id order.
    pub fn pending_entities(&self) -> Vec<EntityRef> {
        self.pending
            .keys()
            .map(|(entity, _)| entity.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Drops candidates of entities the store no longer holds.
    pub fn prune(&mut self, store: &EntityStore) -> usize {
        let before = self.pending.len();
        self.pending.retain(|(entity, _), _| store.contains(entity));
        before - self.pending.len()
    }

    /// Commits every candidate of the listed entities.
    ///
    /// Entities without a candidate are left alone. Returns the number of
    /// fields written; a second call without new candidates returns 0 and
    /// writes nothing.
    pub fn commit_all(&mut self, store: &mut EntityStore, entities: &[EntityRef]) -> LedgerResult<usize> {
        let selected: BTreeSet<&EntityRef> = entities.iter().collect();
        let batch: Vec<(EntityRef, StagedField, String)> = self
            .pending
            .iter()
            .filter(|((entity, _), _)| selected.contains(entity) && store.contains(entity))
            .map(|((entity, field), value)| (entity.clone(), *field, value.clone()))
            .collect();

        for (entity, field, value) in &batch {
            store.check_reference(entity, *field, value)?;
        }
        let edges: BTreeSet<&EntityRef> = batch
            .iter()
            .map(|(entity, _, _)| entity)
            .filter(|entity| entity.kind == EntityKind::Capability)
            .collect();
        for edge in edges {
            let effective = |field: StagedField| {
                batch
                    .iter()
                    .find(|(entity, f, _)| entity == edge && *f == field)
                    .map(|(_, _, value)| value.as_str())
                    .or_else(|| store.committed_reference(edge, field))
            };
            store.check_capability_pair(
                effective(StagedField::CapabilityProduction),
                effective(StagedField::CapabilityRole),
            )?;
        }

        let pruned = self.prune(store);
        if pruned > 0 {
            debug!(pruned, "dropped staged values of removed entities");
        }
        for (entity, field, value) in batch.iter().cloned() {
            self.pending.remove(&(entity.clone(), field));
            store.apply_reference(&entity, field, value);
        }

        if !batch.is_empty() {
            debug!(committed = batch.len(), "staged values committed");
        }
        Ok(batch.len())
    }
}
