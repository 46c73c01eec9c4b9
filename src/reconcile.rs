//! Placement reconciliation.
//!
//! [`PlacementReconciler`] keeps one coherent view over the two placement
//! sources: editor-chosen fixed placements and solver-produced scheduled
//! placements. Every placement mutation passes through [`CapacityGuard`]
//! first.
//!
//! # Solve Lifecycle
//!
//! 1. [`PlacementReconciler::begin_solve`] validates the scenario and issues
//!    a request with the next sequence number.
//! 2. The caller ships the request to the Scheduler Service.
//! 3. [`PlacementReconciler::accept`] takes the response. A response no newer
//!    than the last one applied (or issued before a reset) is discarded as
//!    stale; otherwise the scheduled placements and role assignments are
//!    rebuilt wholesale from it.
//!
//! Requests are never cancelled. A newer request simply races an older one
//! and the sequence check decides which result stands.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::calendar::CalendarSlotGenerator;
use crate::config::SolverSettings;
use crate::error::{LedgerError, LedgerResult, PlacementError};
use crate::guard::CapacityGuard;
use crate::models::{
    EntityRef, FixedAssignment, PlacementId, PlacementKind, Production, RoleAssignment,
    ScheduleItemId, ScheduledPlacement, Timeslot,
};
use crate::solver::{ConstraintConfig, ScheduleEntry, SolveRequest, SolveResponse, SolverStatus};
use crate::store::EntityStore;
use crate::validation;

/// Caller's answer to an irreversible operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

/// What an accepted solver response changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyReport {
    pub sequence: u64,
    pub status: SolverStatus,
    pub objective_value: f64,
    /// Scheduled placements now in the store.
    pub scheduled: usize,
    /// Entries that repeated a fixed placement.
    pub absorbed: usize,
    /// Entries refused by the placement checks.
    pub dropped: usize,
    /// Role assignments now in the store.
    pub role_assignments: usize,
    pub dropped_assignments: usize,
}

/// Result of [`PlacementReconciler::accept`].
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The response replaced the solver-owned collections.
    Applied(ApplyReport),
    /// The response was superseded and the store was left untouched.
    Stale {
        sequence: u64,
        /// Newest sequence already applied or superseded.
        latest: u64,
    },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied(_))
    }
}

/// What a reset cleared and rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetReport {
    pub fixed_assignments: usize,
    pub scheduled_placements: usize,
    pub role_assignments: usize,
    /// Timeslots in the regenerated month.
    pub timeslots: usize,
}

/// Placement mutations and solver bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct PlacementReconciler {
    /// Sequence of the last issued request, 0 before the first.
    issued: u64,
    last_applied: u64,
    /// Requests up to this sequence were superseded by a reset.
    superseded_through: u64,
}

fn resolve<'s>(
    store: &'s EntityStore,
    production_id: &str,
    timeslot_id: &str,
) -> LedgerResult<(&'s Production, &'s Timeslot)> {
    let production = store
        .production(production_id)
        .ok_or_else(|| LedgerError::UnknownEntity(EntityRef::production(production_id)))?;
    let timeslot = store
        .timeslot(timeslot_id)
        .ok_or_else(|| LedgerError::UnknownEntity(EntityRef::timeslot(timeslot_id)))?;
    Ok((production, timeslot))
}

fn not_found(production_id: &str, timeslot_id: &str) -> LedgerError {
    PlacementError::NotFound {
        production_id: production_id.to_string(),
        timeslot_id: timeslot_id.to_string(),
    }
    .into()
}

impl PlacementReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence of the most recently issued request.
    pub fn last_issued(&self) -> Option<u64> {
        (self.issued > 0).then_some(self.issued)
    }

    /// Sequence of the most recently applied response.
    pub fn last_applied(&self) -> Option<u64> {
        (self.last_applied > 0).then_some(self.last_applied)
    }

    // ======================== Editor placements ========================

    /// Fixes `production_id` at `timeslot_id`.
    ///
    /// A scheduled placement of the same production already on the slot is
    /// promoted to fixed.
    pub fn fix(
        &self,
        store: &mut EntityStore,
        production_id: &str,
        timeslot_id: &str,
    ) -> LedgerResult<FixedAssignment> {
        let (production, slot) = resolve(store, production_id, timeslot_id)?;
        let promoted = store
            .placement_at(timeslot_id)
            .filter(|p| p.kind == PlacementKind::Scheduled && p.production_id == production_id);
        CapacityGuard::new(store).can_place(production, slot, promoted.as_ref())?;

        let fixed = store.fixed_on(production_id, slot);
        if let Some(placement) = &promoted {
            store.take_placement(placement);
        }
        store.push_fixed(fixed.clone());

        info!(
            production = production_id,
            timeslot = timeslot_id,
            promoted = promoted.is_some(),
            "placement fixed"
        );
        Ok(fixed)
    }

    /// Removes the fixed placement of `production_id` at `timeslot_id`,
    /// together with its role assignments.
    pub fn unfix(
        &self,
        store: &mut EntityStore,
        production_id: &str,
        timeslot_id: &str,
    ) -> LedgerResult<FixedAssignment> {
        let id = PlacementId::fixed(production_id, timeslot_id);
        let fixed = store
            .fixed_assignments()
            .iter()
            .find(|f| f.placement_id() == id)
            .cloned()
            .ok_or_else(|| not_found(production_id, timeslot_id))?;

        store.take_placement(&id);
        let cast = store.drop_role_assignments(&fixed.schedule_item_id());
        info!(
            production = production_id,
            timeslot = timeslot_id,
            role_assignments = cast,
            "placement unfixed"
        );
        Ok(fixed)
    }

    /// Moves a placement between timeslots, keeping its kind.
    ///
    /// Role assignments follow the performance. Moving onto the source slot
    /// is a no-op. Returns the placement at its new position.
    pub fn move_placement(
        &self,
        store: &mut EntityStore,
        production_id: &str,
        from_timeslot_id: &str,
        to_timeslot_id: &str,
    ) -> LedgerResult<PlacementId> {
        let source = store
            .placement_at(from_timeslot_id)
            .filter(|p| p.production_id == production_id)
            .ok_or_else(|| not_found(production_id, from_timeslot_id))?;
        if from_timeslot_id == to_timeslot_id {
            return Ok(source);
        }

        let (production, destination) = resolve(store, production_id, to_timeslot_id)?;
        CapacityGuard::new(store).can_place(production, destination, Some(&source))?;
        let destination = destination.clone();

        let previous_item = store.take_placement(&source);
        match source.kind {
            PlacementKind::Fixed => {
                let fixed = store.fixed_on(production_id, &destination);
                store.push_fixed(fixed);
            }
            PlacementKind::Scheduled => {
                let soft = store.scheduled_on(production_id, &destination);
                store.push_scheduled(soft);
            }
        }
        if let Some(item) = previous_item {
            store.rekey_role_assignments(&item, &destination);
        }

        info!(
            production = production_id,
            from = from_timeslot_id,
            to = to_timeslot_id,
            kind = ?source.kind,
            "placement moved"
        );
        Ok(PlacementId {
            kind: source.kind,
            production_id: production_id.to_string(),
            timeslot_id: to_timeslot_id.to_string(),
        })
    }

    /// Clears every placement and role assignment and regenerates the last
    /// installed month.
    ///
    /// Irreversible: requires [`Confirmation::Confirmed`]. Solve requests
    /// issued before the reset can no longer be applied.
    pub fn reset(
        &mut self,
        store: &mut EntityStore,
        generator: &CalendarSlotGenerator,
        confirmation: Confirmation,
    ) -> LedgerResult<ResetReport> {
        if confirmation != Confirmation::Confirmed {
            return Err(LedgerError::validation("reset was not confirmed"));
        }
        let month = store
            .calendar_month()
            .ok_or_else(|| LedgerError::validation("no calendar month has been installed"))?;

        let before = (
            store.fixed_assignments().len(),
            store.scheduled_placements().len(),
            store.role_assignments().len(),
        );
        let timeslots = store.install_month(generator, month.year, month.month)?;
        store.clear_placements();
        self.superseded_through = self.issued;

        let report = ResetReport {
            fixed_assignments: before.0,
            scheduled_placements: before.1,
            role_assignments: before.2,
            timeslots,
        };
        info!(
            year = month.year,
            month = month.month,
            fixed = report.fixed_assignments,
            scheduled = report.scheduled_placements,
            "schedule reset"
        );
        Ok(report)
    }

    // ======================== Cast ========================

    /// Casts `person_id` in `role_id` for one committed performance.
    ///
    /// Replaces the current person of a full single-person role.
    pub fn assign_role(
        &self,
        store: &mut EntityStore,
        schedule_item_id: &ScheduleItemId,
        role_id: &str,
        person_id: &str,
    ) -> LedgerResult<RoleAssignment> {
        let (production_id, stage_id, timeslot_id) = schedule_item_id.parts().ok_or_else(|| {
            LedgerError::validation(format!("malformed schedule item id '{schedule_item_id}'"))
        })?;
        let placed = store
            .placement_at(timeslot_id)
            .is_some_and(|p| p.production_id == production_id)
            && store
                .timeslot(timeslot_id)
                .is_some_and(|t| t.stage_id == stage_id);
        if !placed {
            return Err(not_found(production_id, timeslot_id));
        }

        let role = store
            .role(role_id)
            .ok_or_else(|| LedgerError::UnknownEntity(EntityRef::role(role_id)))?;
        if role.production_id.as_deref() != Some(production_id) {
            return Err(LedgerError::validation(format!(
                "role '{role_id}' does not belong to production '{production_id}'"
            )));
        }
        if store.person(person_id).is_none() {
            return Err(LedgerError::UnknownEntity(EntityRef::person(person_id)));
        }
        let barred = store.capabilities().iter().any(|c| {
            !c.can_play
                && c.person_id.as_deref() == Some(person_id)
                && c.production_id.as_deref() == Some(production_id)
                && c.role_id.as_deref() == Some(role_id)
        });
        if barred {
            return Err(LedgerError::validation(format!(
                "person '{person_id}' is marked as unable to play role '{role_id}'"
            )));
        }

        let assignment = RoleAssignment {
            schedule_item_id: schedule_item_id.clone(),
            production_id: production_id.to_string(),
            timeslot_id: timeslot_id.to_string(),
            stage_id: stage_id.to_string(),
            person_id: person_id.to_string(),
            role_id: role_id.to_string(),
            is_conductor: role.is_conductor,
        };
        let required = role.required_count;
        store.upsert_role_assignment(assignment.clone(), required)?;
        debug!(item = %schedule_item_id, role = role_id, person = person_id, "role assigned");
        Ok(assignment)
    }

    // ======================== Solver ========================

    /// Validates the scenario and issues the next solve request.
    pub fn begin_solve(
        &mut self,
        store: &EntityStore,
        settings: &SolverSettings,
    ) -> LedgerResult<SolveRequest> {
        let snapshot = store.snapshot();
        validation::validate_scenario(&snapshot).map_err(LedgerError::InvalidScenario)?;

        self.issued += 1;
        let constraints = ConstraintConfig::default().merged(&settings.constraints);
        info!(
            sequence = self.issued,
            productions = snapshot.productions.len(),
            timeslots = snapshot.timeslots.len(),
            "solve request issued"
        );
        Ok(SolveRequest::from_snapshot(
            self.issued,
            snapshot,
            constraints,
            settings.time_limit_seconds,
        ))
    }

    /// Applies a solver response unless it is stale.
    ///
    /// Entries that would break a placement invariant are dropped with a
    /// warning; the rest replace the scheduled placements and role
    /// assignments wholesale. An infeasible response clears them.
    pub fn accept(
        &mut self,
        store: &mut EntityStore,
        response: SolveResponse,
    ) -> LedgerResult<ApplyOutcome> {
        let sequence = response.sequence;
        if sequence == 0 || sequence > self.issued {
            return Err(LedgerError::validation(format!(
                "solver response #{sequence} answers no issued request (last issued #{})",
                self.issued
            )));
        }
        let latest = self.last_applied.max(self.superseded_through);
        if sequence <= latest {
            warn!(sequence, latest, "discarding stale solver response");
            return Ok(ApplyOutcome::Stale { sequence, latest });
        }

        let schedule: &[ScheduleEntry] = if response.status.has_solution() {
            response.schedule.as_slice()
        } else {
            &[]
        };
        let (scheduled, absorbed, mut dropped) = admit_schedule(store, schedule);
        dropped += response.schedule.len() - schedule.len();
        let (assignments, dropped_assignments) = admit_assignments(store, &scheduled, &response);

        let report = ApplyReport {
            sequence,
            status: response.status,
            objective_value: response.objective_value,
            scheduled: scheduled.len(),
            absorbed,
            dropped,
            role_assignments: assignments.len(),
            dropped_assignments,
        };
        store.replace_solution(scheduled, assignments);
        self.last_applied = sequence;

        info!(
            sequence,
            status = ?report.status,
            scheduled = report.scheduled,
            dropped = report.dropped,
            "solver response applied"
        );
        Ok(ApplyOutcome::Applied(report))
    }
}

/// Turns solver entries into placements that respect every placement rule.
///
/// Returns the placements with the counts of absorbed and dropped entries.
fn admit_schedule(
    store: &EntityStore,
    entries: &[ScheduleEntry],
) -> (Vec<ScheduledPlacement>, usize, usize) {
    let mut fixed_slots: HashMap<&str, &str> = HashMap::new();
    let mut shows: HashMap<&str, u32> = HashMap::new();
    for f in store.fixed_assignments() {
        fixed_slots.insert(&f.timeslot_id, &f.production_id);
        *shows.entry(&f.production_id).or_default() += 1;
    }
    let mut occupied = fixed_slots.clone();

    let mut kept = Vec::new();
    let (mut absorbed, mut dropped) = (0, 0);
    for entry in entries {
        let item = entry.schedule_item_id();
        if fixed_slots.get(entry.timeslot_id.as_str()) == Some(&entry.production_id.as_str()) {
            absorbed += 1;
            continue;
        }
        let (Some(production), Some(slot)) = (
            store.production(&entry.production_id),
            store.timeslot(&entry.timeslot_id),
        ) else {
            warn!(item = %item, "dropping solver entry for unknown production or timeslot");
            dropped += 1;
            continue;
        };
        if slot.stage_id != entry.stage_id || !production.plays_on(&slot.stage_id) {
            warn!(item = %item, timeslot_stage = %slot.stage_id, "dropping solver entry with stage mismatch");
            dropped += 1;
            continue;
        }
        if let Some(holder) = occupied.get(slot.id.as_str()) {
            warn!(item = %item, occupied_by = *holder, "dropping solver entry for occupied timeslot");
            dropped += 1;
            continue;
        }
        let count = shows.entry(production.id.as_str()).or_default();
        if *count >= production.max_shows {
            warn!(item = %item, limit = production.max_shows, "dropping solver entry over show limit");
            dropped += 1;
            continue;
        }
        *count += 1;
        occupied.insert(slot.id.as_str(), production.id.as_str());
        kept.push(store.scheduled_on(&production.id, slot));
    }
    (kept, absorbed, dropped)
}

/// Keeps the solver's role assignments that name a committed performance,
/// a role of that production and an existing person, within the role's
/// required count.
fn admit_assignments(
    store: &EntityStore,
    scheduled: &[ScheduledPlacement],
    response: &SolveResponse,
) -> (Vec<RoleAssignment>, usize) {
    let live: HashSet<ScheduleItemId> = store
        .fixed_assignments()
        .iter()
        .map(FixedAssignment::schedule_item_id)
        .chain(scheduled.iter().map(ScheduledPlacement::schedule_item_id))
        .collect();

    let mut seen: HashSet<(&ScheduleItemId, &str, &str)> = HashSet::new();
    let mut cast: HashMap<(&ScheduleItemId, &str), u32> = HashMap::new();
    let mut kept = Vec::new();
    let mut dropped = 0;

    for entry in &response.assignments {
        let item = &entry.schedule_item_id;
        let consistent = item.parts()
            == Some((
                entry.production_id.as_str(),
                entry.stage_id.as_str(),
                entry.timeslot_id.as_str(),
            ));
        let role = store
            .role(&entry.role_id)
            .filter(|r| r.production_id.as_deref() == Some(entry.production_id.as_str()));
        let admitted = match role {
            Some(role)
                if consistent
                    && live.contains(item)
                    && store.person(&entry.person_id).is_some()
                    && seen.insert((item, entry.role_id.as_str(), entry.person_id.as_str())) =>
            {
                let count = cast.entry((item, entry.role_id.as_str())).or_default();
                (*count < role.required_count).then(|| {
                    *count += 1;
                    role
                })
            }
            _ => None,
        };

        match admitted {
            Some(role) => kept.push(RoleAssignment {
                schedule_item_id: item.clone(),
                production_id: entry.production_id.clone(),
                timeslot_id: entry.timeslot_id.clone(),
                stage_id: entry.stage_id.clone(),
                person_id: entry.person_id.clone(),
                role_id: entry.role_id.clone(),
                is_conductor: role.is_conductor,
            }),
            None => {
                warn!(
                    item = %item,
                    role = %entry.role_id,
                    person = %entry.person_id,
                    "dropping solver role assignment"
                );
                dropped += 1;
            }
        }
    }
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VenueConfig;
    use crate::models::{PersonDraft, ProductionDraft, RoleDraft, StageDraft, TimeslotDraft};
    use crate::solver::RoleAssignmentEntry;
    use chrono::{NaiveDate, NaiveTime};
    use proptest::prelude::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
    }

    fn hm(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    /// Stage s1 with p1 (1 show) and p2 (2 shows), stage s2 with p3,
    /// slots t1..t4 on s1 and u1 on s2.
    fn store() -> EntityStore {
        let mut store = EntityStore::default();
        store.create(StageDraft::new("Main").with_id("s1")).unwrap();
        store.create(StageDraft::new("Studio").with_id("s2")).unwrap();
        store
            .create(ProductionDraft::new("Aida").with_id("p1").on_stage("s1"))
            .unwrap();
        store
            .create(ProductionDraft::new("Tosca").with_id("p2").on_stage("s1").with_max_shows(2))
            .unwrap();
        store
            .create(ProductionDraft::new("Norma").with_id("p3").on_stage("s2"))
            .unwrap();
        for day in 1..=4 {
            store
                .create(TimeslotDraft::new("s1", date(day), hm(19)).with_id(format!("t{day}")))
                .unwrap();
        }
        store
            .create(TimeslotDraft::new("s2", date(1), hm(18)).with_id("u1"))
            .unwrap();
        store
            .create(RoleDraft::new("Conductor").with_id("p2_conductor").for_production("p2").conductor())
            .unwrap();
        store.create(PersonDraft::new("Anna").with_id("anna")).unwrap();
        store.create(PersonDraft::new("Boris").with_id("boris")).unwrap();
        store
    }

    fn entry(production: &str, stage: &str, slot: &str) -> ScheduleEntry {
        ScheduleEntry::new(production, stage, slot)
    }

    fn cast(item: &str, role: &str, person: &str) -> RoleAssignmentEntry {
        let id = ScheduleItemId::from(item);
        let (production, stage, slot) = id.parts().unwrap();
        RoleAssignmentEntry {
            production_id: production.into(),
            stage_id: stage.into(),
            timeslot_id: slot.into(),
            schedule_item_id: id.clone(),
            person_id: person.into(),
            role_id: role.into(),
            is_conductor: false,
        }
    }

    fn applied(outcome: ApplyOutcome) -> ApplyReport {
        match outcome {
            ApplyOutcome::Applied(report) => report,
            other => panic!("expected applied, got {other:?}"),
        }
    }

    #[test]
    fn test_fix_respects_show_limit() {
        let mut store = store();
        let reconciler = PlacementReconciler::new();

        reconciler.fix(&mut store, "p1", "t1").unwrap();
        let err = reconciler.fix(&mut store, "p1", "t2").unwrap_err();
        assert_eq!(
            err.as_placement(),
            Some(&PlacementError::CapacityExceeded {
                production_id: "p1".into(),
                current: 1,
                limit: 1,
            })
        );

        reconciler.unfix(&mut store, "p1", "t1").unwrap();
        reconciler.fix(&mut store, "p1", "t2").unwrap();
        assert_eq!(store.fixed_assignments().len(), 1);
        assert_eq!(store.fixed_assignments()[0].timeslot_id, "t2");
    }

    #[test]
    fn test_fix_copies_slot_data() {
        let mut store = store();
        let fixed = PlacementReconciler::new().fix(&mut store, "p3", "u1").unwrap();
        assert_eq!(fixed.stage_id, "s2");
        assert_eq!(fixed.date, date(1));
        assert_eq!(fixed.start_time, hm(18));
    }

    #[test]
    fn test_fix_rejects_other_stage_and_taken_slot() {
        let mut store = store();
        let reconciler = PlacementReconciler::new();

        let err = reconciler.fix(&mut store, "p3", "t1").unwrap_err();
        assert!(matches!(
            err.as_placement(),
            Some(PlacementError::StageMismatch { .. })
        ));

        reconciler.fix(&mut store, "p2", "t1").unwrap();
        let err = reconciler.fix(&mut store, "p1", "t1").unwrap_err();
        assert!(matches!(
            err.as_placement(),
            Some(PlacementError::SlotOccupied { occupied_by, .. }) if occupied_by == "p2"
        ));
    }

    #[test]
    fn test_fix_promotes_own_scheduled_placement() {
        let mut store = store();
        let mut reconciler = PlacementReconciler::new();
        reconciler.begin_solve(&store, &SolverSettings::default()).unwrap();
        reconciler
            .accept(
                &mut store,
                SolveResponse::new(1, SolverStatus::Optimal).with_entry(entry("p1", "s1", "t3")),
            )
            .unwrap();
        assert_eq!(store.scheduled_placements().len(), 1);

        reconciler.fix(&mut store, "p1", "t3").unwrap();
        assert!(store.scheduled_placements().is_empty());
        assert_eq!(store.show_count("p1"), 1);
    }

    #[test]
    fn test_unfix_missing_placement() {
        let mut store = store();
        let err = PlacementReconciler::new()
            .unfix(&mut store, "p1", "t1")
            .unwrap_err();
        assert!(matches!(err.as_placement(), Some(PlacementError::NotFound { .. })));
    }

    #[test]
    fn test_move_preserves_kind() {
        let mut store = store();
        let mut reconciler = PlacementReconciler::new();
        reconciler.fix(&mut store, "p2", "t1").unwrap();
        reconciler.begin_solve(&store, &SolverSettings::default()).unwrap();
        reconciler
            .accept(
                &mut store,
                SolveResponse::new(1, SolverStatus::Feasible).with_entry(entry("p1", "s1", "t2")),
            )
            .unwrap();

        let moved = reconciler.move_placement(&mut store, "p2", "t1", "t3").unwrap();
        assert_eq!(moved, PlacementId::fixed("p2", "t3"));
        let moved = reconciler.move_placement(&mut store, "p1", "t2", "t4").unwrap();
        assert_eq!(moved, PlacementId::scheduled("p1", "t4"));

        assert_eq!(store.fixed_assignments()[0].timeslot_id, "t3");
        assert_eq!(store.fixed_assignments()[0].date, date(3));
        assert_eq!(store.scheduled_placements()[0].timeslot_id, "t4");
        assert!(store.placement_at("t1").is_none());
        assert!(store.placement_at("t2").is_none());
    }

    #[test]
    fn test_move_at_full_capacity_excludes_itself() {
        let mut store = store();
        let reconciler = PlacementReconciler::new();
        reconciler.fix(&mut store, "p1", "t1").unwrap();
        reconciler.move_placement(&mut store, "p1", "t1", "t2").unwrap();
        assert_eq!(store.show_count("p1"), 1);
    }

    #[test]
    fn test_move_failures_leave_store_unchanged() {
        let mut store = store();
        let reconciler = PlacementReconciler::new();
        reconciler.fix(&mut store, "p2", "t1").unwrap();
        reconciler.fix(&mut store, "p1", "t2").unwrap();
        let before = store.snapshot();

        let err = reconciler.move_placement(&mut store, "p1", "t3", "t4").unwrap_err();
        assert!(matches!(err.as_placement(), Some(PlacementError::NotFound { .. })));
        let err = reconciler.move_placement(&mut store, "p1", "t2", "t1").unwrap_err();
        assert!(matches!(err.as_placement(), Some(PlacementError::SlotOccupied { .. })));
        let err = reconciler.move_placement(&mut store, "p1", "t2", "u1").unwrap_err();
        assert!(matches!(err.as_placement(), Some(PlacementError::StageMismatch { .. })));

        assert_eq!(store.snapshot(), before);
        assert_eq!(
            reconciler.move_placement(&mut store, "p1", "t2", "t2").unwrap(),
            PlacementId::fixed("p1", "t2")
        );
    }

    #[test]
    fn test_cast_follows_moved_performance() {
        let mut store = store();
        let reconciler = PlacementReconciler::new();
        reconciler.fix(&mut store, "p2", "t1").unwrap();
        let item = ScheduleItemId::new("p2", "s1", "t1");
        let ra = reconciler
            .assign_role(&mut store, &item, "p2_conductor", "anna")
            .unwrap();
        assert!(ra.is_conductor);

        reconciler.move_placement(&mut store, "p2", "t1", "t2").unwrap();
        let ra = &store.role_assignments()[0];
        assert_eq!(ra.schedule_item_id.as_str(), "p2|s1|t2");
        assert_eq!(ra.timeslot_id, "t2");

        reconciler.unfix(&mut store, "p2", "t2").unwrap();
        assert!(store.role_assignments().is_empty());
    }

    #[test]
    fn test_assign_role_checks() {
        let mut store = store();
        let reconciler = PlacementReconciler::new();
        let item = ScheduleItemId::new("p2", "s1", "t1");

        let err = reconciler
            .assign_role(&mut store, &item, "p2_conductor", "anna")
            .unwrap_err();
        assert!(err.as_placement().is_some());

        reconciler.fix(&mut store, "p2", "t1").unwrap();
        let err = reconciler
            .assign_role(&mut store, &item, "p2_conductor", "ghost")
            .unwrap_err();
        assert_eq!(err, LedgerError::UnknownEntity(EntityRef::person("ghost")));

        let bad = ScheduleItemId::from("p2|s1");
        assert!(reconciler
            .assign_role(&mut store, &bad, "p2_conductor", "anna")
            .unwrap_err()
            .is_validation());

        reconciler
            .assign_role(&mut store, &item, "p2_conductor", "anna")
            .unwrap();
        reconciler
            .assign_role(&mut store, &item, "p2_conductor", "boris")
            .unwrap();
        assert_eq!(store.role_assignments().len(), 1);
        assert_eq!(store.role_assignments()[0].person_id, "boris");
    }

    #[test]
    fn test_begin_solve_validates_and_numbers_requests() {
        let mut store = store();
        let mut reconciler = PlacementReconciler::new();
        let settings = SolverSettings::default();

        let first = reconciler.begin_solve(&store, &settings).unwrap();
        let second = reconciler.begin_solve(&store, &settings).unwrap();
        assert_eq!((first.sequence, second.sequence), (1, 2));
        assert_eq!(second.timeslots.len(), 5);
        assert!(!second.constraints.is_enabled("same_show_weekend"));

        store.create(ProductionDraft::new("Unstaged")).unwrap();
        let err = reconciler.begin_solve(&store, &settings).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidScenario(ref issues) if issues.len() == 1));
        assert_eq!(reconciler.last_issued(), Some(2));
    }

    #[test]
    fn test_stale_response_discarded() {
        let mut store = store();
        let mut reconciler = PlacementReconciler::new();
        let settings = SolverSettings::default();
        reconciler.begin_solve(&store, &settings).unwrap();
        reconciler.begin_solve(&store, &settings).unwrap();

        let first = SolveResponse::new(1, SolverStatus::Optimal).with_entry(entry("p1", "s1", "t1"));
        let second = SolveResponse::new(2, SolverStatus::Optimal).with_entry(entry("p2", "s1", "t3"));

        let mut only_second = store.clone();
        PlacementReconciler {
            issued: 2,
            ..Default::default()
        }
        .accept(&mut only_second, second.clone())
        .unwrap();

        assert!(reconciler.accept(&mut store, second).unwrap().is_applied());
        let outcome = reconciler.accept(&mut store, first).unwrap();
        assert_eq!(outcome, ApplyOutcome::Stale { sequence: 1, latest: 2 });
        assert_eq!(store.snapshot(), only_second.snapshot());
        assert_eq!(reconciler.last_applied(), Some(2));
    }

    #[test]
    fn test_unissued_response_rejected() {
        let mut store = store();
        let mut reconciler = PlacementReconciler::new();
        let err = reconciler
            .accept(&mut store, SolveResponse::new(1, SolverStatus::Optimal))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_accept_filters_solver_entries() {
        let mut store = store();
        let mut reconciler = PlacementReconciler::new();
        reconciler.fix(&mut store, "p1", "t1").unwrap();
        reconciler.begin_solve(&store, &SolverSettings::default()).unwrap();

        let response = SolveResponse::new(1, SolverStatus::Optimal)
            .with_entry(entry("p1", "s1", "t1")) // repeats the fixed placement
            .with_entry(entry("p2", "s1", "t2"))
            .with_entry(entry("p2", "s1", "t3"))
            .with_entry(entry("p2", "s1", "t4")) // third show of a two-show production
            .with_entry(entry("p3", "s1", "t4")) // wrong stage
            .with_entry(entry("ghost", "s1", "t4"))
            .with_assignment(cast("p2|s1|t2", "p2_conductor", "anna"))
            .with_assignment(cast("p2|s1|t2", "p2_conductor", "anna"))
            .with_assignment(cast("p2|s1|t4", "p2_conductor", "anna"))
            .with_assignment(cast("p2|s1|t3", "p2_conductor", "nobody"));

        let report = applied(reconciler.accept(&mut store, response).unwrap());
        assert_eq!(report.scheduled, 2);
        assert_eq!(report.absorbed, 1);
        assert_eq!(report.dropped, 3);
        assert_eq!(report.role_assignments, 1);
        assert_eq!(report.dropped_assignments, 3);
        assert!(store.role_assignments()[0].is_conductor);
        assert!(validation::check_invariants(&store.snapshot()).is_ok());
    }

    #[test]
    fn test_infeasible_response_clears_soft_schedule() {
        let mut store = store();
        let mut reconciler = PlacementReconciler::new();
        reconciler.fix(&mut store, "p1", "t1").unwrap();
        reconciler.begin_solve(&store, &SolverSettings::default()).unwrap();
        reconciler
            .accept(
                &mut store,
                SolveResponse::new(1, SolverStatus::Optimal).with_entry(entry("p2", "s1", "t2")),
            )
            .unwrap();

        reconciler.begin_solve(&store, &SolverSettings::default()).unwrap();
        let report = applied(
            reconciler
                .accept(
                    &mut store,
                    SolveResponse::new(2, SolverStatus::Infeasible)
                        .with_entry(entry("p2", "s1", "t3")),
                )
                .unwrap(),
        );
        assert_eq!(report.scheduled, 0);
        assert_eq!(report.dropped, 1);
        assert!(store.scheduled_placements().is_empty());
        assert_eq!(store.fixed_assignments().len(), 1);
    }

    #[test]
    fn test_reset() {
        let config = VenueConfig::default();
        let generator = CalendarSlotGenerator::new(&config).unwrap();
        let mut store = EntityStore::new(&config).unwrap();
        let mut reconciler = PlacementReconciler::new();
        store.create(StageDraft::new("Историческая").with_id("s1")).unwrap();
        store
            .create(ProductionDraft::new("Aida").with_id("p1").on_stage("s1"))
            .unwrap();

        let err = reconciler
            .reset(&mut store, &generator, Confirmation::Confirmed)
            .unwrap_err();
        assert!(err.is_validation());

        store.install_month(&generator, 2025, 11).unwrap();
        reconciler.fix(&mut store, "p1", "slot_2025-11-04_s1_1900").unwrap();
        reconciler.begin_solve(&store, &config.solver).unwrap();

        assert!(reconciler
            .reset(&mut store, &generator, Confirmation::Declined)
            .is_err());
        assert_eq!(store.fixed_assignments().len(), 1);

        let report = reconciler
            .reset(&mut store, &generator, Confirmation::Confirmed)
            .unwrap();
        assert_eq!(report.fixed_assignments, 1);
        assert_eq!(report.timeslots, 40);
        assert!(store.fixed_assignments().is_empty());
        assert_eq!(store.timeslots().len(), 40);

        // The request issued before the reset is superseded.
        let outcome = reconciler
            .accept(
                &mut store,
                SolveResponse::new(1, SolverStatus::Optimal)
                    .with_entry(entry("p1", "s1", "slot_2025-11-05_s1_1900")),
            )
            .unwrap();
        assert!(!outcome.is_applied());
        assert!(store.scheduled_placements().is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Fix(usize, usize),
        Unfix(usize, usize),
        Move(usize, usize, usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, 0usize..5).prop_map(|(p, t)| Op::Fix(p, t)),
            (0usize..3, 0usize..5).prop_map(|(p, t)| Op::Unfix(p, t)),
            (0usize..3, 0usize..5, 0usize..5).prop_map(|(p, a, b)| Op::Move(p, a, b)),
        ]
    }

    proptest! {
        #[test]
        fn placement_invariants_hold_under_any_edit_sequence(
            ops in prop::collection::vec(op(), 0..50),
        ) {
            let mut store = store();
            let reconciler = PlacementReconciler::new();
            let productions = ["p1", "p2", "p3"];
            let slots = ["t1", "t2", "t3", "t4", "u1"];

            for op in ops {
                let before = store.snapshot();
                let result = match op {
                    Op::Fix(p, t) => reconciler.fix(&mut store, productions[p], slots[t]).map(|_| ()),
                    Op::Unfix(p, t) => reconciler.unfix(&mut store, productions[p], slots[t]).map(|_| ()),
                    Op::Move(p, a, b) => reconciler
                        .move_placement(&mut store, productions[p], slots[a], slots[b])
                        .map(|_| ()),
                };
                if result.is_err() {
                    prop_assert_eq!(&store.snapshot(), &before);
                }
                prop_assert!(validation::check_invariants(&store.snapshot()).is_ok());
            }
        }
    }
}
