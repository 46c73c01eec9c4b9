//! Entity store.
//!
//! [`EntityStore`] owns every collection of the venue ledger and is the only
//! place they are mutated. Callers hold it exclusively and pass it to the
//! other components.
//!
//! # Mutation Rules
//!
//! | Operation | Checks before mutating |
//! |-----------|------------------------|
//! | `create` | non-empty label, positive counts, explicit-id uniqueness, every set reference exists |
//! | `update` | same as create, plus placement agreement for stage changes and show limits |
//! | `remove` | stage restrict policy |
//! | `install_month` | calendar and store agree on the venue clock |
//!
//! Every operation validates first and mutates last: an `Err` leaves the
//! store exactly as it was.
//!
//! # Cascades
//!
//! - Stage (with [`RemovePolicy::Cascade`]): its productions and timeslots,
//!   then everything those cascade to.
//! - Production: its roles, capability edges, placements, role assignments.
//! - Role / Person: capability edges and role assignments naming them.
//! - Timeslot: the placement on it and its role assignments.

pub mod identity;

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::calendar::{CalendarSlotGenerator, VenueClock};
use crate::config::VenueConfig;
use crate::error::{LedgerError, LedgerResult, PlacementError};
use crate::models::{
    CapabilityPatch, Entity, EntityDraft, EntityKind, EntityPatch, EntityRef, FixedAssignment,
    Person, PersonPatch, PersonProductionRole, PlacementId, PlacementKind, Production,
    ProductionPatch, RemovePolicy, Role, RoleAssignment, RolePatch, ScheduleItemId,
    ScheduledPlacement, Stage, StagePatch, Timeslot, TimeslotPatch,
};
use crate::snapshot::ScenarioSnapshot;
use crate::staging::StagedField;

/// The month whose grid was last installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarMonth {
    pub year: i32,
    /// 1–12.
    pub month: u32,
}

/// What a `remove` call deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    /// Entities deleted, the requested one included, in kind/id order.
    pub removed: Vec<EntityRef>,
    pub fixed_assignments: usize,
    pub scheduled_placements: usize,
    pub role_assignments: usize,
}

impl RemovalReport {
    /// Total number of records deleted.
    pub fn total(&self) -> usize {
        self.removed.len() + self.fixed_assignments + self.scheduled_placements + self.role_assignments
    }
}

/// Placement counts dropped by [`EntityStore::clear_placements`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ClearedPlacements {
    pub fixed_assignments: usize,
    pub scheduled_placements: usize,
    pub role_assignments: usize,
}

/// Set of entities marked for deletion during a cascade.
#[derive(Default)]
struct Doomed(HashMap<EntityKind, HashSet<String>>);

impl Doomed {
    fn insert(&mut self, kind: EntityKind, id: &str) {
        self.0.entry(kind).or_default().insert(id.to_string());
    }

    fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.0.get(&kind).is_some_and(|ids| ids.contains(id))
    }

    fn contains_opt(&self, kind: EntityKind, id: Option<&str>) -> bool {
        id.is_some_and(|id| self.contains(kind, id))
    }

    fn refs(&self) -> Vec<EntityRef> {
        self.0
            .iter()
            .flat_map(|(kind, ids)| ids.iter().map(|id| EntityRef::new(*kind, id.as_str())))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn require_text(field: &str, value: &str) -> LedgerResult<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_positive(field: &str, value: u32) -> LedgerResult<()> {
    if value == 0 {
        return Err(LedgerError::validation(format!("{field} must be at least 1")));
    }
    Ok(())
}

/// In-memory venue ledger.
#[derive(Debug, Clone)]
pub struct EntityStore {
    clock: VenueClock,
    stages: Vec<Stage>,
    productions: Vec<Production>,
    timeslots: Vec<Timeslot>,
    roles: Vec<Role>,
    people: Vec<Person>,
    capabilities: Vec<PersonProductionRole>,
    fixed: Vec<FixedAssignment>,
    scheduled: Vec<ScheduledPlacement>,
    role_assignments: Vec<RoleAssignment>,
    calendar_month: Option<CalendarMonth>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::with_clock(VenueClock::default())
    }
}

impl EntityStore {
    /// Creates an empty store for the configured venue.
    pub fn new(config: &VenueConfig) -> LedgerResult<Self> {
        config.validate()?;
        Ok(Self::with_clock(VenueClock::from_config(config)?))
    }

    /// Creates an empty store using `clock` for weekday and placement times.
    pub fn with_clock(clock: VenueClock) -> Self {
        Self {
            clock,
            stages: Vec::new(),
            productions: Vec::new(),
            timeslots: Vec::new(),
            roles: Vec::new(),
            people: Vec::new(),
            capabilities: Vec::new(),
            fixed: Vec::new(),
            scheduled: Vec::new(),
            role_assignments: Vec::new(),
            calendar_month: None,
        }
    }

    // ======================== Queries ========================

    pub fn clock(&self) -> VenueClock {
        self.clock
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    pub fn timeslots(&self) -> &[Timeslot] {
        &self.timeslots
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn capabilities(&self) -> &[PersonProductionRole] {
        &self.capabilities
    }

    pub fn fixed_assignments(&self) -> &[FixedAssignment] {
        &self.fixed
    }

    pub fn scheduled_placements(&self) -> &[ScheduledPlacement] {
        &self.scheduled
    }

    pub fn role_assignments(&self) -> &[RoleAssignment] {
        &self.role_assignments
    }

    /// Month of the last installed calendar grid.
    pub fn calendar_month(&self) -> Option<CalendarMonth> {
        self.calendar_month
    }

    pub fn stage(&self, id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    pub fn production(&self, id: &str) -> Option<&Production> {
        self.productions.iter().find(|p| p.id == id)
    }

    pub fn timeslot(&self, id: &str) -> Option<&Timeslot> {
        self.timeslots.iter().find(|t| t.id == id)
    }

    pub fn role(&self, id: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == id)
    }

    pub fn person(&self, id: &str) -> Option<&Person> {
        self.people.iter().find(|p| p.id == id)
    }

    pub fn capability(&self, id: &str) -> Option<&PersonProductionRole> {
        self.capabilities.iter().find(|c| c.id == id)
    }

    /// Whether the addressed entity exists.
    pub fn contains(&self, entity: &EntityRef) -> bool {
        let id = entity.id.as_str();
        match entity.kind {
            EntityKind::Stage => self.stage(id).is_some(),
            EntityKind::Production => self.production(id).is_some(),
            EntityKind::Timeslot => self.timeslot(id).is_some(),
            EntityKind::Role => self.role(id).is_some(),
            EntityKind::Person => self.person(id).is_some(),
            EntityKind::Capability => self.capability(id).is_some(),
        }
    }

    /// A copy of the addressed entity.
    pub fn get(&self, entity: &EntityRef) -> Option<Entity> {
        let id = entity.id.as_str();
        match entity.kind {
            EntityKind::Stage => self.stage(id).cloned().map(Entity::Stage),
            EntityKind::Production => self.production(id).cloned().map(Entity::Production),
            EntityKind::Timeslot => self.timeslot(id).cloned().map(Entity::Timeslot),
            EntityKind::Role => self.role(id).cloned().map(Entity::Role),
            EntityKind::Person => self.person(id).cloned().map(Entity::Person),
            EntityKind::Capability => self.capability(id).cloned().map(Entity::Capability),
        }
    }

    /// Every committed placement, fixed first.
    pub fn placement_ids(&self) -> impl Iterator<Item = PlacementId> + '_ {
        self.fixed
            .iter()
            .map(FixedAssignment::placement_id)
            .chain(self.scheduled.iter().map(ScheduledPlacement::placement_id))
    }

    /// The committed placement holding `timeslot_id`, if any.
    pub fn placement_at(&self, timeslot_id: &str) -> Option<PlacementId> {
        self.placement_ids().find(|p| p.timeslot_id == timeslot_id)
    }

    /// Committed placements of one production.
    pub fn placements_of<'a>(
        &'a self,
        production_id: &'a str,
    ) -> impl Iterator<Item = PlacementId> + 'a {
        self.placement_ids()
            .filter(move |p| p.production_id == production_id)
    }

    /// Committed (fixed + scheduled) show count of a production.
    pub fn show_count(&self, production_id: &str) -> u32 {
        self.placements_of(production_id).count() as u32
    }

    /// Read-only copy of every collection.
    pub fn snapshot(&self) -> ScenarioSnapshot {
        ScenarioSnapshot {
            utc_offset_seconds: self.clock.offset().local_minus_utc(),
            performance_minutes: self.clock.performance().num_minutes(),
            calendar_month: self.calendar_month,
            stages: self.stages.clone(),
            productions: self.productions.clone(),
            timeslots: self.timeslots.clone(),
            roles: self.roles.clone(),
            people: self.people.clone(),
            person_production_roles: self.capabilities.clone(),
            fixed_assignments: self.fixed.clone(),
            scheduled_placements: self.scheduled.clone(),
            role_assignments: self.role_assignments.clone(),
        }
    }

    // ======================== Create ========================

    /// Creates an entity and returns it with its assigned identity.
    pub fn create(&mut self, draft: impl Into<EntityDraft>) -> LedgerResult<Entity> {
        let draft = draft.into();
        let kind = draft.kind();
        self.check_draft(&draft)?;

        let id = match draft.explicit_id() {
            Some(explicit) => {
                let explicit = explicit.trim();
                require_text(&format!("{kind} id"), explicit)?;
                if explicit.contains(ScheduleItemId::SEPARATOR) {
                    return Err(LedgerError::validation(format!(
                        "{kind} id '{explicit}' must not contain '{}'",
                        ScheduleItemId::SEPARATOR
                    )));
                }
                let entity = EntityRef::new(kind, explicit);
                if self.contains(&entity) {
                    return Err(LedgerError::DuplicateId(entity));
                }
                explicit.to_string()
            }
            None => identity::derive_id(kind, draft.label(), |candidate| {
                self.contains(&EntityRef::new(kind, candidate))
            }),
        };

        let entity = match draft {
            EntityDraft::Stage(d) => {
                let stage = Stage { id, name: d.name };
                self.stages.push(stage.clone());
                Entity::Stage(stage)
            }
            EntityDraft::Production(d) => {
                let production = Production {
                    id,
                    title: d.title,
                    stage_id: d.stage_id,
                    max_shows: d.max_shows,
                    weekend_priority: d.weekend_priority,
                };
                self.productions.push(production.clone());
                Entity::Production(production)
            }
            EntityDraft::Timeslot(d) => {
                let dow = self.clock.weekday(d.date);
                let slot = Timeslot::new(id, d.stage_id, d.date, dow, d.start_time);
                self.timeslots.push(slot.clone());
                Entity::Timeslot(slot)
            }
            EntityDraft::Role(d) => {
                let role = Role {
                    id,
                    name: d.name,
                    production_id: d.production_id,
                    is_conductor: d.is_conductor,
                    required_count: d.required_count,
                };
                self.roles.push(role.clone());
                Entity::Role(role)
            }
            EntityDraft::Person(d) => {
                let person = Person {
                    id,
                    name: d.name,
                    email: d.email,
                };
                self.people.push(person.clone());
                Entity::Person(person)
            }
            EntityDraft::Capability(d) => {
                let edge = PersonProductionRole {
                    id,
                    person_id: d.person_id,
                    production_id: d.production_id,
                    role_id: d.role_id,
                    can_play: d.can_play,
                };
                self.capabilities.push(edge.clone());
                Entity::Capability(edge)
            }
        };

        debug!(kind = %kind, id = entity.id(), "entity created");
        Ok(entity)
    }

    /// Field and reference checks `create` runs before assigning an identity.
    pub(crate) fn check_draft(&self, draft: &EntityDraft) -> LedgerResult<()> {
        match draft {
            EntityDraft::Stage(d) => require_text("stage name", &d.name),
            EntityDraft::Production(d) => {
                require_text("production title", &d.title)?;
                require_positive("max_shows", d.max_shows)?;
                self.check_target("stage_id", EntityKind::Stage, d.stage_id.as_deref())
            }
            EntityDraft::Timeslot(d) => {
                require_text("timeslot stage_id", &d.stage_id)?;
                self.check_target("stage_id", EntityKind::Stage, Some(d.stage_id.as_str()))
            }
            EntityDraft::Role(d) => {
                require_text("role name", &d.name)?;
                require_positive("required_count", d.required_count)?;
                self.check_target(
                    "production_id",
                    EntityKind::Production,
                    d.production_id.as_deref(),
                )
            }
            EntityDraft::Person(d) => require_text("person name", &d.name),
            EntityDraft::Capability(d) => {
                self.check_target("person_id", EntityKind::Person, d.person_id.as_deref())?;
                self.check_target(
                    "production_id",
                    EntityKind::Production,
                    d.production_id.as_deref(),
                )?;
                self.check_target("role_id", EntityKind::Role, d.role_id.as_deref())?;
                self.check_capability_pair(d.production_id.as_deref(), d.role_id.as_deref())
            }
        }
    }

    /// Checks that an optional reference, when set, names an existing entity.
    fn check_target(&self, field: &'static str, kind: EntityKind, id: Option<&str>) -> LedgerResult<()> {
        match id {
            Some(id) if !self.contains(&EntityRef::new(kind, id)) => {
                Err(LedgerError::DanglingReference {
                    field,
                    target: EntityRef::new(kind, id),
                })
            }
            _ => Ok(()),
        }
    }

    // ======================== Update ========================

    /// Applies a partial update and returns the updated entity.
    ///
    /// Derived fields are recomputed: a timeslot's weekday follows its date,
    /// and its placements follow its date and start time.
    pub fn update(&mut self, target: &EntityRef, patch: impl Into<EntityPatch>) -> LedgerResult<Entity> {
        let patch = patch.into();
        if patch.kind() != target.kind {
            return Err(LedgerError::validation(format!(
                "a {} patch cannot update {target}",
                patch.kind()
            )));
        }
        if !self.contains(target) {
            return Err(LedgerError::UnknownEntity(target.clone()));
        }

        let id = target.id.as_str();
        match patch {
            EntityPatch::Stage(p) => self.update_stage(id, p)?,
            EntityPatch::Production(p) => self.update_production(id, p)?,
            EntityPatch::Timeslot(p) => self.update_timeslot(id, p)?,
            EntityPatch::Role(p) => self.update_role(id, p)?,
            EntityPatch::Person(p) => self.update_person(id, p)?,
            EntityPatch::Capability(p) => self.update_capability(id, p)?,
        }

        debug!(entity = %target, "entity updated");
        self.get(target)
            .ok_or_else(|| LedgerError::UnknownEntity(target.clone()))
    }

    fn update_stage(&mut self, id: &str, patch: StagePatch) -> LedgerResult<()> {
        if let Some(name) = &patch.name {
            require_text("stage name", name)?;
        }
        if let Some(stage) = self.stages.iter_mut().find(|s| s.id == id) {
            if let Some(name) = patch.name {
                stage.name = name;
            }
        }
        Ok(())
    }

    fn update_production(&mut self, id: &str, patch: ProductionPatch) -> LedgerResult<()> {
        if let Some(title) = &patch.title {
            require_text("production title", title)?;
        }
        if let Some(limit) = patch.max_shows {
            require_positive("max_shows", limit)?;
            let current = self.show_count(id);
            if limit < current {
                return Err(PlacementError::CapacityExceeded {
                    production_id: id.to_string(),
                    current,
                    limit,
                }
                .into());
            }
        }
        if let Some(stage_id) = &patch.stage_id {
            self.check_reference(&EntityRef::production(id), StagedField::ProductionStage, stage_id)?;
        }

        if let Some(production) = self.productions.iter_mut().find(|p| p.id == id) {
            if let Some(title) = patch.title {
                production.title = title;
            }
            if let Some(stage_id) = patch.stage_id {
                production.stage_id = Some(stage_id);
            }
            if let Some(limit) = patch.max_shows {
                production.max_shows = limit;
            }
            if let Some(flag) = patch.weekend_priority {
                production.weekend_priority = flag;
            }
        }
        Ok(())
    }

    fn update_timeslot(&mut self, id: &str, patch: TimeslotPatch) -> LedgerResult<()> {
        if let Some(stage_id) = &patch.stage_id {
            require_text("timeslot stage_id", stage_id)?;
            self.check_target("stage_id", EntityKind::Stage, Some(stage_id.as_str()))?;
            let moved = self.timeslot(id).is_some_and(|t| t.stage_id != *stage_id);
            if let Some(occupant) = self.placement_at(id).filter(|_| moved) {
                let production_stage = self
                    .production(&occupant.production_id)
                    .and_then(|p| p.stage_id.clone());
                return Err(PlacementError::StageMismatch {
                    production_id: occupant.production_id,
                    production_stage,
                    timeslot_id: id.to_string(),
                    timeslot_stage: stage_id.clone(),
                }
                .into());
            }
        }

        let clock = self.clock;
        let Some(slot) = self.timeslots.iter_mut().find(|t| t.id == id) else {
            return Err(LedgerError::UnknownEntity(EntityRef::timeslot(id)));
        };
        if let Some(stage_id) = patch.stage_id {
            slot.stage_id = stage_id;
        }
        if let Some(date) = patch.date {
            slot.date = date;
            slot.set_day_of_week(clock.weekday(date));
        }
        if let Some(start_time) = patch.start_time {
            slot.start_time = start_time;
        }
        let (date, start_time) = (slot.date, slot.start_time);
        self.refresh_placement_times(id, date, start_time);
        Ok(())
    }

    fn refresh_placement_times(&mut self, timeslot_id: &str, date: NaiveDate, start_time: NaiveTime) {
        for fixed in self.fixed.iter_mut().filter(|f| f.timeslot_id == timeslot_id) {
            fixed.date = date;
            fixed.start_time = start_time;
        }
        let (start, end) = self.clock.performance_window(date, start_time);
        for placement in self
            .scheduled
            .iter_mut()
            .filter(|s| s.timeslot_id == timeslot_id)
        {
            placement.start = start;
            placement.end = end;
        }
    }

    fn update_role(&mut self, id: &str, patch: RolePatch) -> LedgerResult<()> {
        if let Some(name) = &patch.name {
            require_text("role name", name)?;
        }
        if let Some(count) = patch.required_count {
            require_positive("required_count", count)?;
            let mut per_item: HashMap<&ScheduleItemId, u32> = HashMap::new();
            for ra in self.role_assignments.iter().filter(|ra| ra.role_id == id) {
                *per_item.entry(&ra.schedule_item_id).or_default() += 1;
            }
            if let Some((item, cast)) = per_item.into_iter().find(|(_, cast)| *cast > count) {
                return Err(LedgerError::validation(format!(
                    "role '{id}' already has {cast} people cast in '{item}'"
                )));
            }
        }
        if let Some(production_id) = &patch.production_id {
            self.check_reference(&EntityRef::role(id), StagedField::RoleProduction, production_id)?;
        }

        if let Some(role) = self.roles.iter_mut().find(|r| r.id == id) {
            if let Some(name) = patch.name {
                role.name = name;
            }
            if let Some(production_id) = patch.production_id {
                role.production_id = Some(production_id);
            }
            if let Some(count) = patch.required_count {
                role.required_count = count;
            }
            if let Some(flag) = patch.is_conductor {
                role.is_conductor = flag;
                for ra in self.role_assignments.iter_mut().filter(|ra| ra.role_id == id) {
                    ra.is_conductor = flag;
                }
            }
        }
        Ok(())
    }

    fn update_person(&mut self, id: &str, patch: PersonPatch) -> LedgerResult<()> {
        if let Some(name) = &patch.name {
            require_text("person name", name)?;
        }
        if let Some(person) = self.people.iter_mut().find(|p| p.id == id) {
            if let Some(name) = patch.name {
                person.name = name;
            }
            if let Some(email) = patch.email {
                person.email = email;
            }
        }
        Ok(())
    }

    fn update_capability(&mut self, id: &str, patch: CapabilityPatch) -> LedgerResult<()> {
        let entity = EntityRef::capability(id);
        let references = [
            (StagedField::CapabilityPerson, &patch.person_id),
            (StagedField::CapabilityProduction, &patch.production_id),
            (StagedField::CapabilityRole, &patch.role_id),
        ];
        for (field, value) in &references {
            if let Some(value) = value {
                self.check_reference(&entity, *field, value)?;
            }
        }
        let committed = self.capability(id);
        let production = patch
            .production_id
            .as_deref()
            .or_else(|| committed.and_then(|c| c.production_id.as_deref()));
        let role = patch
            .role_id
            .as_deref()
            .or_else(|| committed.and_then(|c| c.role_id.as_deref()));
        self.check_capability_pair(production, role)?;

        for (field, value) in [
            (StagedField::CapabilityPerson, patch.person_id),
            (StagedField::CapabilityProduction, patch.production_id),
            (StagedField::CapabilityRole, patch.role_id),
        ] {
            if let Some(value) = value {
                self.apply_reference(&entity, field, value);
            }
        }
        if let Some(flag) = patch.can_play {
            if let Some(edge) = self.capabilities.iter_mut().find(|c| c.id == id) {
                edge.can_play = flag;
            }
        }
        Ok(())
    }

    // ======================== Staged references ========================

    /// Current committed value of a staged reference field.
    pub(crate) fn committed_reference(&self, entity: &EntityRef, field: StagedField) -> Option<&str> {
        let id = entity.id.as_str();
        match field {
            StagedField::ProductionStage => self.production(id)?.stage_id.as_deref(),
            StagedField::RoleProduction => self.role(id)?.production_id.as_deref(),
            StagedField::CapabilityPerson => self.capability(id)?.person_id.as_deref(),
            StagedField::CapabilityProduction => self.capability(id)?.production_id.as_deref(),
            StagedField::CapabilityRole => self.capability(id)?.role_id.as_deref(),
        }
    }

    /// Checks that `value` may be committed into `field` of `entity`.
    pub(crate) fn check_reference(
        &self,
        entity: &EntityRef,
        field: StagedField,
        value: &str,
    ) -> LedgerResult<()> {
        if entity.kind != field.owner() {
            return Err(LedgerError::validation(format!(
                "{} is not a field of {}",
                field.name(),
                entity.kind
            )));
        }
        if !self.contains(entity) {
            return Err(LedgerError::UnknownEntity(entity.clone()));
        }
        let target = EntityRef::new(field.target(), value);
        if !self.contains(&target) {
            return Err(LedgerError::DanglingReference {
                field: field.name(),
                target,
            });
        }
        if self.committed_reference(entity, field) == Some(value) {
            return Ok(());
        }

        match field {
            StagedField::ProductionStage => {
                if let Some(placement) = self.placements_of(&entity.id).next() {
                    let timeslot_stage = self
                        .timeslot(&placement.timeslot_id)
                        .map(|t| t.stage_id.clone())
                        .unwrap_or_default();
                    return Err(PlacementError::StageMismatch {
                        production_id: entity.id.clone(),
                        production_stage: Some(value.to_string()),
                        timeslot_id: placement.timeslot_id,
                        timeslot_stage,
                    }
                    .into());
                }
            }
            StagedField::RoleProduction => {
                if self.role_assignments.iter().any(|ra| ra.role_id == entity.id) {
                    return Err(LedgerError::validation(format!(
                        "{entity} is cast in performances; clear its assignments first"
                    )));
                }
                let mismatched = self.capabilities.iter().find(|c| {
                    c.role_id.as_deref() == Some(entity.id.as_str())
                        && c.production_id.as_deref().is_some_and(|p| p != value)
                });
                if let Some(edge) = mismatched {
                    return Err(LedgerError::validation(format!(
                        "{entity} is linked to another production by capability '{}'",
                        edge.id
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Checks that a capability edge's role belongs to the edge's production.
    ///
    /// Passes while either side is unset or the role has no production yet.
    pub(crate) fn check_capability_pair(
        &self,
        production_id: Option<&str>,
        role_id: Option<&str>,
    ) -> LedgerResult<()> {
        let (Some(production_id), Some(role_id)) = (production_id, role_id) else {
            return Ok(());
        };
        match self.role(role_id).and_then(|r| r.production_id.as_deref()) {
            Some(owner) if owner != production_id => Err(LedgerError::validation(format!(
                "role '{role_id}' belongs to production '{owner}', not '{production_id}'"
            ))),
            _ => Ok(()),
        }
    }

    /// Writes a reference checked by [`Self::check_reference`].
    pub(crate) fn apply_reference(&mut self, entity: &EntityRef, field: StagedField, value: String) {
        let id = entity.id.as_str();
        match field {
            StagedField::ProductionStage => {
                if let Some(p) = self.productions.iter_mut().find(|p| p.id == id) {
                    p.stage_id = Some(value);
                }
            }
            StagedField::RoleProduction => {
                if let Some(r) = self.roles.iter_mut().find(|r| r.id == id) {
                    r.production_id = Some(value);
                }
            }
            StagedField::CapabilityPerson
            | StagedField::CapabilityProduction
            | StagedField::CapabilityRole => {
                if let Some(c) = self.capabilities.iter_mut().find(|c| c.id == id) {
                    let slot = match field {
                        StagedField::CapabilityPerson => &mut c.person_id,
                        StagedField::CapabilityProduction => &mut c.production_id,
                        _ => &mut c.role_id,
                    };
                    *slot = Some(value);
                }
            }
        }
    }

    // ======================== Remove ========================

    /// Removes an entity and everything that depends on it.
    ///
    /// Only stages honour [`RemovePolicy::Restrict`]: a stage that still has
    /// productions or timeslots is kept and `RemovalBlocked` is returned.
    pub fn remove(&mut self, target: &EntityRef, policy: RemovePolicy) -> LedgerResult<RemovalReport> {
        if !self.contains(target) {
            return Err(LedgerError::UnknownEntity(target.clone()));
        }

        let mut doomed = Doomed::default();
        doomed.insert(target.kind, &target.id);

        if target.kind == EntityKind::Stage {
            let productions: Vec<&str> = self
                .productions
                .iter()
                .filter(|p| p.plays_on(&target.id))
                .map(|p| p.id.as_str())
                .collect();
            let timeslots: Vec<&str> = self
                .timeslots
                .iter()
                .filter(|t| t.stage_id == target.id)
                .map(|t| t.id.as_str())
                .collect();
            let dependents = productions.len() + timeslots.len();
            if dependents > 0 && policy == RemovePolicy::Restrict {
                return Err(LedgerError::RemovalBlocked {
                    entity: target.clone(),
                    dependents,
                });
            }
            for id in productions {
                doomed.insert(EntityKind::Production, id);
            }
            for id in timeslots {
                doomed.insert(EntityKind::Timeslot, id);
            }
        }

        for role in &self.roles {
            if doomed.contains_opt(EntityKind::Production, role.production_id.as_deref()) {
                doomed.insert(EntityKind::Role, &role.id);
            }
        }
        for edge in &self.capabilities {
            if doomed.contains_opt(EntityKind::Person, edge.person_id.as_deref())
                || doomed.contains_opt(EntityKind::Production, edge.production_id.as_deref())
                || doomed.contains_opt(EntityKind::Role, edge.role_id.as_deref())
            {
                doomed.insert(EntityKind::Capability, &edge.id);
            }
        }

        let placement_doomed = |production_id: &str, timeslot_id: &str| {
            doomed.contains(EntityKind::Production, production_id)
                || doomed.contains(EntityKind::Timeslot, timeslot_id)
        };

        let before = (self.fixed.len(), self.scheduled.len(), self.role_assignments.len());
        self.fixed
            .retain(|f| !placement_doomed(&f.production_id, &f.timeslot_id));
        self.scheduled
            .retain(|s| !placement_doomed(&s.production_id, &s.timeslot_id));
        self.role_assignments.retain(|ra| {
            !(placement_doomed(&ra.production_id, &ra.timeslot_id)
                || doomed.contains(EntityKind::Role, &ra.role_id)
                || doomed.contains(EntityKind::Person, &ra.person_id))
        });

        self.stages
            .retain(|s| !doomed.contains(EntityKind::Stage, &s.id));
        self.productions
            .retain(|p| !doomed.contains(EntityKind::Production, &p.id));
        self.timeslots
            .retain(|t| !doomed.contains(EntityKind::Timeslot, &t.id));
        self.roles.retain(|r| !doomed.contains(EntityKind::Role, &r.id));
        self.people
            .retain(|p| !doomed.contains(EntityKind::Person, &p.id));
        self.capabilities
            .retain(|c| !doomed.contains(EntityKind::Capability, &c.id));

        let report = RemovalReport {
            removed: doomed.refs(),
            fixed_assignments: before.0 - self.fixed.len(),
            scheduled_placements: before.1 - self.scheduled.len(),
            role_assignments: before.2 - self.role_assignments.len(),
        };
        info!(
            entity = %target,
            records = report.total(),
            "entity removed"
        );
        Ok(report)
    }

    // ======================== Calendar ========================

    /// Replaces every timeslot with the generated grid of one month.
    ///
    /// Placements survive only on slots whose identity, stage, date and start
    /// time are unchanged by the regeneration. Returns the slot count.
    pub fn install_month(
        &mut self,
        generator: &CalendarSlotGenerator,
        year: i32,
        month: u32,
    ) -> LedgerResult<usize> {
        if generator.clock() != self.clock {
            return Err(LedgerError::Config(
                "calendar generator and store use different venue clocks".into(),
            ));
        }
        let slots = generator.generate(year, month, &self.stages)?;

        let previous: HashMap<&str, &Timeslot> =
            self.timeslots.iter().map(|t| (t.id.as_str(), t)).collect();
        let surviving: HashSet<String> = slots
            .iter()
            .filter(|slot| previous.get(slot.id.as_str()).is_some_and(|old| *old == *slot))
            .map(|slot| slot.id.clone())
            .collect();

        self.fixed.retain(|f| surviving.contains(&f.timeslot_id));
        self.scheduled.retain(|s| surviving.contains(&s.timeslot_id));
        self.role_assignments
            .retain(|ra| surviving.contains(&ra.timeslot_id));
        self.timeslots = slots;
        self.calendar_month = Some(CalendarMonth { year, month });

        info!(
            year,
            month,
            timeslots = self.timeslots.len(),
            "calendar month installed"
        );
        Ok(self.timeslots.len())
    }

    // ======================== Placement primitives ========================

    /// A fixed placement of `production_id` on `slot`.
    pub(crate) fn fixed_on(&self, production_id: &str, slot: &Timeslot) -> FixedAssignment {
        FixedAssignment {
            production_id: production_id.to_string(),
            timeslot_id: slot.id.clone(),
            stage_id: slot.stage_id.clone(),
            date: slot.date,
            start_time: slot.start_time,
        }
    }

    /// A scheduled placement of `production_id` on `slot`.
    pub(crate) fn scheduled_on(&self, production_id: &str, slot: &Timeslot) -> ScheduledPlacement {
        let (start, end) = self.clock.performance_window(slot.date, slot.start_time);
        ScheduledPlacement {
            production_id: production_id.to_string(),
            stage_id: slot.stage_id.clone(),
            timeslot_id: slot.id.clone(),
            start,
            end,
        }
    }

    pub(crate) fn push_fixed(&mut self, fixed: FixedAssignment) {
        self.fixed.push(fixed);
    }

    pub(crate) fn push_scheduled(&mut self, placement: ScheduledPlacement) {
        self.scheduled.push(placement);
    }

    /// Removes one placement; `None` when it does not exist.
    pub(crate) fn take_placement(&mut self, id: &PlacementId) -> Option<ScheduleItemId> {
        match id.kind {
            PlacementKind::Fixed => {
                let pos = self.fixed.iter().position(|f| {
                    f.production_id == id.production_id && f.timeslot_id == id.timeslot_id
                })?;
                Some(self.fixed.remove(pos).schedule_item_id())
            }
            PlacementKind::Scheduled => {
                let pos = self.scheduled.iter().position(|s| {
                    s.production_id == id.production_id && s.timeslot_id == id.timeslot_id
                })?;
                Some(self.scheduled.remove(pos).schedule_item_id())
            }
        }
    }

    /// Moves role assignments of one performance to another timeslot.
    pub(crate) fn rekey_role_assignments(&mut self, from: &ScheduleItemId, to: &Timeslot) {
        for ra in self
            .role_assignments
            .iter_mut()
            .filter(|ra| ra.schedule_item_id == *from)
        {
            ra.schedule_item_id = ScheduleItemId::new(&ra.production_id, &to.stage_id, &to.id);
            ra.timeslot_id = to.id.clone();
            ra.stage_id = to.stage_id.clone();
        }
    }

    /// Drops the role assignments of one performance.
    pub(crate) fn drop_role_assignments(&mut self, item: &ScheduleItemId) -> usize {
        let before = self.role_assignments.len();
        self.role_assignments
            .retain(|ra| ra.schedule_item_id != *item);
        before - self.role_assignments.len()
    }

    /// Inserts or replaces one cast entry.
    ///
    /// Keyed by schedule item and role. A role with room for more people
    /// gains an entry; a full single-person role has its person replaced.
    pub(crate) fn upsert_role_assignment(
        &mut self,
        assignment: RoleAssignment,
        required_count: u32,
    ) -> LedgerResult<()> {
        let same_role = |ra: &RoleAssignment| {
            ra.schedule_item_id == assignment.schedule_item_id && ra.role_id == assignment.role_id
        };
        if self
            .role_assignments
            .iter()
            .any(|ra| same_role(ra) && ra.person_id == assignment.person_id)
        {
            return Ok(());
        }
        let cast = self.role_assignments.iter().filter(|ra| same_role(ra)).count() as u32;
        if cast < required_count {
            self.role_assignments.push(assignment);
            return Ok(());
        }
        if required_count > 1 {
            return Err(LedgerError::validation(format!(
                "role '{}' is fully cast in '{}'",
                assignment.role_id, assignment.schedule_item_id
            )));
        }
        if let Some(existing) = self.role_assignments.iter_mut().find(|ra| same_role(ra)) {
            *existing = assignment;
        }
        Ok(())
    }

    /// Replaces the solver-owned collections wholesale.
    pub(crate) fn replace_solution(
        &mut self,
        scheduled: Vec<ScheduledPlacement>,
        role_assignments: Vec<RoleAssignment>,
    ) {
        self.scheduled = scheduled;
        self.role_assignments = role_assignments;
    }

    /// Drops every placement and role assignment.
    pub(crate) fn clear_placements(&mut self) -> ClearedPlacements {
        let cleared = ClearedPlacements {
            fixed_assignments: self.fixed.len(),
            scheduled_placements: self.scheduled.len(),
            role_assignments: self.role_assignments.len(),
        };
        self.fixed.clear();
        self.scheduled.clear();
        self.role_assignments.clear();
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CapabilityDraft, PersonDraft, ProductionDraft, RoleDraft, StageDraft, TimeslotDraft,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    /// Stage s1 with production p1 (2 shows), slots t1/t2, a cast role and a person.
    fn seeded() -> EntityStore {
        let mut store = EntityStore::default();
        store.create(StageDraft::new("Main").with_id("s1")).unwrap();
        store.create(StageDraft::new("Studio").with_id("s2")).unwrap();
        store
            .create(ProductionDraft::new("Aida").with_id("p1").on_stage("s1").with_max_shows(2))
            .unwrap();
        store
            .create(TimeslotDraft::new("s1", date(2025, 11, 1), hm(14, 0)).with_id("t1"))
            .unwrap();
        store
            .create(TimeslotDraft::new("s1", date(2025, 11, 4), hm(19, 0)).with_id("t2"))
            .unwrap();
        store
            .create(RoleDraft::new("Radames").with_id("r1").for_production("p1"))
            .unwrap();
        store.create(PersonDraft::new("Anna").with_id("anna")).unwrap();
        store
            .create(CapabilityDraft::linking("anna", "p1", "r1").with_id("c1"))
            .unwrap();
        store
    }

    fn place_fixed(store: &mut EntityStore, production: &str, slot: &str) {
        let slot = store.timeslot(slot).unwrap().clone();
        let fixed = store.fixed_on(production, &slot);
        store.push_fixed(fixed);
    }

    #[test]
    fn test_create_derives_identity_from_label() {
        let mut store = EntityStore::default();
        let a = store.create(ProductionDraft::new("Swan Lake")).unwrap();
        let b = store.create(ProductionDraft::new("Swan  Lake!")).unwrap();
        let c = store.create(PersonDraft::new("***")).unwrap();

        assert_eq!(a.id(), "swan_lake");
        assert_eq!(b.id(), "swan_lake_2");
        assert!(c.id().starts_with("person_"));
    }

    #[test]
    fn test_create_rejects_duplicate_explicit_id() {
        let mut store = seeded();
        let err = store.create(StageDraft::new("Other").with_id("s1")).unwrap_err();
        assert_eq!(err, LedgerError::DuplicateId(EntityRef::stage("s1")));
        assert_eq!(store.stages().len(), 2);
    }

    #[test]
    fn test_create_rejects_separator_in_explicit_id() {
        let mut store = seeded();
        let err = store
            .create(ProductionDraft::new("Tosca").with_id("a|b").on_stage("s1"))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(store.production("a|b").is_none());

        let err = store
            .create(TimeslotDraft::new("s1", date(2025, 11, 5), hm(19, 0)).with_id("t|3"))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.timeslots().len(), 2);
    }

    #[test]
    fn test_create_validates_fields_and_references() {
        let mut store = seeded();

        let err = store.create(ProductionDraft::new("  ")).unwrap_err();
        assert!(err.is_validation());

        let err = store
            .create(ProductionDraft::new("Tosca").with_max_shows(0))
            .unwrap_err();
        assert!(err.is_validation());

        let err = store
            .create(ProductionDraft::new("Tosca").on_stage("nowhere"))
            .unwrap_err();
        assert!(err.is_referential());
        assert!(store.production("tosca").is_none());
    }

    #[test]
    fn test_timeslot_weekday_is_derived() {
        let mut store = seeded();
        let slot = store.timeslot("t1").unwrap();
        assert_eq!(slot.day_of_week(), 5);

        store
            .update(
                &EntityRef::timeslot("t1"),
                TimeslotPatch::default().with_date(date(2025, 11, 3)),
            )
            .unwrap();
        assert_eq!(store.timeslot("t1").unwrap().day_of_week(), 0);
    }

    #[test]
    fn test_timeslot_move_refreshes_placements() {
        let mut store = seeded();
        place_fixed(&mut store, "p1", "t1");

        store
            .update(
                &EntityRef::timeslot("t1"),
                TimeslotPatch::default()
                    .with_date(date(2025, 11, 2))
                    .with_start_time(hm(12, 0)),
            )
            .unwrap();
        let fixed = &store.fixed_assignments()[0];
        assert_eq!(fixed.date, date(2025, 11, 2));
        assert_eq!(fixed.start_time, hm(12, 0));
    }

    #[test]
    fn test_stage_change_with_placements_rejected() {
        let mut store = seeded();
        place_fixed(&mut store, "p1", "t1");

        let err = store
            .update(&EntityRef::production("p1"), ProductionPatch::default().with_stage("s2"))
            .unwrap_err();
        assert!(matches!(
            err.as_placement(),
            Some(PlacementError::StageMismatch { .. })
        ));

        let err = store
            .update(&EntityRef::timeslot("t1"), TimeslotPatch::default().with_stage("s2"))
            .unwrap_err();
        assert!(err.as_placement().is_some());
        assert_eq!(store.timeslot("t1").unwrap().stage_id, "s1");

        // A slot without a placement may change stage.
        store
            .update(&EntityRef::timeslot("t2"), TimeslotPatch::default().with_stage("s2"))
            .unwrap();
    }

    #[test]
    fn test_lowering_max_shows_below_committed_rejected() {
        let mut store = seeded();
        place_fixed(&mut store, "p1", "t1");
        place_fixed(&mut store, "p1", "t2");

        let err = store
            .update(&EntityRef::production("p1"), ProductionPatch::default().with_max_shows(1))
            .unwrap_err();
        assert_eq!(
            err.as_placement(),
            Some(&PlacementError::CapacityExceeded {
                production_id: "p1".into(),
                current: 2,
                limit: 1,
            })
        );
    }

    #[test]
    fn test_patch_kind_must_match_target() {
        let mut store = seeded();
        let err = store
            .update(&EntityRef::stage("s1"), ProductionPatch::default().with_title("x"))
            .unwrap_err();
        assert!(err.is_validation());

        let err = store
            .update(&EntityRef::stage("nope"), StagePatch::name("x"))
            .unwrap_err();
        assert_eq!(err, LedgerError::UnknownEntity(EntityRef::stage("nope")));
    }

    #[test]
    fn test_capability_role_must_belong_to_production() {
        let mut store = seeded();
        store
            .create(ProductionDraft::new("Tosca").with_id("p2").on_stage("s1"))
            .unwrap();

        let err = store
            .create(CapabilityDraft::linking("anna", "p2", "r1").with_id("c2"))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(store.capability("c2").is_none());

        let patch = CapabilityPatch {
            production_id: Some("p2".into()),
            ..CapabilityPatch::default()
        };
        let err = store.update(&EntityRef::capability("c1"), patch).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.capability("c1").unwrap().production_id.as_deref(), Some("p1"));

        let err = store
            .update(
                &EntityRef::role("r1"),
                RolePatch {
                    production_id: Some("p2".into()),
                    ..RolePatch::default()
                },
            )
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_conductor_flag_propagates_to_assignments() {
        let mut store = seeded();
        place_fixed(&mut store, "p1", "t1");
        let item = store.fixed_assignments()[0].schedule_item_id();
        store
            .upsert_role_assignment(
                RoleAssignment {
                    schedule_item_id: item,
                    production_id: "p1".into(),
                    timeslot_id: "t1".into(),
                    stage_id: "s1".into(),
                    person_id: "anna".into(),
                    role_id: "r1".into(),
                    is_conductor: false,
                },
                1,
            )
            .unwrap();

        store
            .update(
                &EntityRef::role("r1"),
                RolePatch {
                    is_conductor: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(store.role_assignments()[0].is_conductor);
    }

    #[test]
    fn test_remove_stage_restricted() {
        let mut store = seeded();
        let err = store
            .remove(&EntityRef::stage("s1"), RemovePolicy::Restrict)
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::RemovalBlocked {
                entity: EntityRef::stage("s1"),
                dependents: 3,
            }
        );
        assert!(store.stage("s1").is_some());

        // An unreferenced stage goes under either policy.
        store
            .remove(&EntityRef::stage("s2"), RemovePolicy::Restrict)
            .unwrap();
        assert!(store.stage("s2").is_none());
    }

    #[test]
    fn test_remove_stage_cascade() {
        let mut store = seeded();
        place_fixed(&mut store, "p1", "t1");

        let report = store
            .remove(&EntityRef::stage("s1"), RemovePolicy::Cascade)
            .unwrap();
        assert!(report.removed.contains(&EntityRef::production("p1")));
        assert!(report.removed.contains(&EntityRef::role("r1")));
        assert!(report.removed.contains(&EntityRef::capability("c1")));
        assert_eq!(report.fixed_assignments, 1);
        assert!(store.productions().is_empty());
        assert!(store.timeslots().is_empty());
        assert!(store.capabilities().is_empty());
        assert_eq!(store.people().len(), 1);
    }

    #[test]
    fn test_remove_production_cascades() {
        let mut store = seeded();
        place_fixed(&mut store, "p1", "t1");

        let report = store
            .remove(&EntityRef::production("p1"), RemovePolicy::Restrict)
            .unwrap();
        assert_eq!(report.removed.len(), 3);
        assert!(store.roles().is_empty());
        assert!(store.capabilities().is_empty());
        assert!(store.fixed_assignments().is_empty());
        assert_eq!(store.timeslots().len(), 2);
    }

    #[test]
    fn test_remove_timeslot_drops_its_placement() {
        let mut store = seeded();
        place_fixed(&mut store, "p1", "t1");
        let report = store
            .remove(&EntityRef::timeslot("t1"), RemovePolicy::default())
            .unwrap();
        assert_eq!(report.fixed_assignments, 1);
        assert_eq!(store.show_count("p1"), 0);
    }

    #[test]
    fn test_install_month_keeps_placements_on_unchanged_slots() {
        let config = VenueConfig::default();
        let generator = CalendarSlotGenerator::new(&config).unwrap();
        let mut store = EntityStore::new(&config).unwrap();
        store.create(StageDraft::new("Историческая").with_id("s1")).unwrap();
        store
            .create(ProductionDraft::new("Aida").with_id("p1").on_stage("s1"))
            .unwrap();

        let count = store.install_month(&generator, 2025, 11).unwrap();
        assert_eq!(count, 40);
        assert_eq!(store.calendar_month(), Some(CalendarMonth { year: 2025, month: 11 }));

        place_fixed(&mut store, "p1", "slot_2025-11-01_s1_1400");
        store.install_month(&generator, 2025, 11).unwrap();
        assert_eq!(store.fixed_assignments().len(), 1);

        store.install_month(&generator, 2025, 12).unwrap();
        assert!(store.fixed_assignments().is_empty());
    }

    #[test]
    fn test_install_month_rejects_foreign_clock() {
        let other = VenueConfig {
            utc_offset_hours: 0,
            ..VenueConfig::default()
        };
        let generator = CalendarSlotGenerator::new(&other).unwrap();
        let mut store = seeded();
        let err = store.install_month(&generator, 2025, 11).unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
        assert_eq!(store.timeslots().len(), 2);
    }

    #[test]
    fn test_upsert_role_assignment_respects_required_count() {
        let mut store = seeded();
        place_fixed(&mut store, "p1", "t1");
        store.create(PersonDraft::new("Boris").with_id("boris")).unwrap();
        let item = ScheduleItemId::new("p1", "s1", "t1");
        let cast = |person: &str| RoleAssignment {
            schedule_item_id: item.clone(),
            production_id: "p1".into(),
            timeslot_id: "t1".into(),
            stage_id: "s1".into(),
            person_id: person.into(),
            role_id: "r1".into(),
            is_conductor: false,
        };

        store.upsert_role_assignment(cast("anna"), 1).unwrap();
        store.upsert_role_assignment(cast("boris"), 1).unwrap();
        assert_eq!(store.role_assignments().len(), 1);
        assert_eq!(store.role_assignments()[0].person_id, "boris");

        store.upsert_role_assignment(cast("anna"), 2).unwrap();
        assert_eq!(store.role_assignments().len(), 2);
        assert!(store.upsert_role_assignment(cast("carl"), 2).is_err());
    }
}
