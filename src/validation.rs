//! Scenario validation.
//!
//! Checks a [`ScenarioSnapshot`] as a whole and reports every issue found,
//! not just the first. Two levels:
//!
//! - [`check_invariants`]: the ledger's structural invariants. A snapshot
//!   taken from an [`EntityStore`](crate::store::EntityStore) always passes.
//! - [`validate_scenario`]: the invariants plus readiness for a solve
//!   (non-empty collections, every production staged, every capability edge
//!   complete).
//!
//! # Invariants
//! 1. Identity is unique within each collection
//! 2. Every set reference names an existing entity
//! 3. `day_of_week` agrees with `date` in the venue offset
//! 4. At most one committed placement per timeslot
//! 5. Committed placements per production stay within `max_shows`
//! 6. A placement's stage equals its production's and its timeslot's stage

use std::collections::{HashMap, HashSet};

use crate::calendar::VenueClock;
use crate::snapshot::ScenarioSnapshot;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationIssue>>;

/// One problem found in a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    /// Issue category.
    pub kind: IssueKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// A collection the solver needs is empty.
    EmptyCollection,
    /// Two entities of one collection share an id.
    DuplicateId,
    /// A required text field is blank.
    MissingField,
    /// An optional reference the solver needs is not committed yet.
    UnsetReference,
    /// A reference names an entity that does not exist.
    DanglingReference,
    /// The snapshot's venue offset is out of range.
    InvalidClock,
    /// A timeslot's weekday disagrees with its date.
    WeekdayDrift,
    /// A timeslot carries more than one placement.
    SlotConflict,
    /// A production has more placements than `max_shows`.
    CapacityExceeded,
    /// A placement's stage disagrees with its production or timeslot.
    StageDisagreement,
}

impl ValidationIssue {
    fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

fn finish(issues: Vec<ValidationIssue>) -> ValidationResult {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Checks the structural invariants.
pub fn check_invariants(snapshot: &ScenarioSnapshot) -> ValidationResult {
    let mut issues = Vec::new();
    collect_invariant_issues(snapshot, &mut issues);
    finish(issues)
}

/// Checks that a snapshot can be sent to the Scheduler Service.
///
/// Reports the invariant issues of [`check_invariants`] followed by the
/// readiness issues.
pub fn validate_scenario(snapshot: &ScenarioSnapshot) -> ValidationResult {
    let mut issues = Vec::new();
    collect_invariant_issues(snapshot, &mut issues);
    collect_readiness_issues(snapshot, &mut issues);
    finish(issues)
}

fn unique_ids<'a>(
    collection: &str,
    ids: impl Iterator<Item = &'a str>,
    issues: &mut Vec<ValidationIssue>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            issues.push(ValidationIssue::new(
                IssueKind::DuplicateId,
                format!("Duplicate {collection} ID: {id}"),
            ));
        }
    }
    seen
}

fn collect_invariant_issues(s: &ScenarioSnapshot, issues: &mut Vec<ValidationIssue>) {
    // 1. Identity
    let stage_ids = unique_ids("stage", s.stages.iter().map(|x| x.id.as_str()), issues);
    let production_ids =
        unique_ids("production", s.productions.iter().map(|x| x.id.as_str()), issues);
    let timeslot_ids = unique_ids("timeslot", s.timeslots.iter().map(|x| x.id.as_str()), issues);
    let role_ids = unique_ids("role", s.roles.iter().map(|x| x.id.as_str()), issues);
    let person_ids = unique_ids("person", s.people.iter().map(|x| x.id.as_str()), issues);
    unique_ids(
        "capability",
        s.person_production_roles.iter().map(|x| x.id.as_str()),
        issues,
    );

    // 2. References
    let mut dangling = |owner: String, field: &str, target: &str, known: &HashSet<&str>| {
        if !known.contains(target) {
            issues.push(ValidationIssue::new(
                IssueKind::DanglingReference,
                format!("{owner} references unknown {field} '{target}'"),
            ));
        }
    };
    for p in &s.productions {
        if let Some(stage) = &p.stage_id {
            dangling(format!("Production '{}'", p.id), "stage", stage, &stage_ids);
        }
    }
    for t in &s.timeslots {
        dangling(format!("Timeslot '{}'", t.id), "stage", &t.stage_id, &stage_ids);
    }
    for r in &s.roles {
        if let Some(production) = &r.production_id {
            dangling(format!("Role '{}'", r.id), "production", production, &production_ids);
        }
    }
    for c in &s.person_production_roles {
        let owner = || format!("Capability '{}'", c.id);
        if let Some(person) = &c.person_id {
            dangling(owner(), "person", person, &person_ids);
        }
        if let Some(production) = &c.production_id {
            dangling(owner(), "production", production, &production_ids);
        }
        if let Some(role) = &c.role_id {
            dangling(owner(), "role", role, &role_ids);
        }
    }
    let placement_refs = s
        .fixed_assignments
        .iter()
        .map(|f| ("Fixed", &f.production_id, &f.timeslot_id, &f.stage_id))
        .chain(
            s.scheduled_placements
                .iter()
                .map(|p| ("Scheduled", &p.production_id, &p.timeslot_id, &p.stage_id)),
        );
    for (source, production, timeslot, stage) in placement_refs {
        let owner = || format!("{source} placement '{production}@{timeslot}'");
        dangling(owner(), "production", production, &production_ids);
        dangling(owner(), "timeslot", timeslot, &timeslot_ids);
        dangling(owner(), "stage", stage, &stage_ids);
    }
    for ra in &s.role_assignments {
        let owner = || format!("Role assignment '{}'", ra.schedule_item_id);
        dangling(owner(), "production", &ra.production_id, &production_ids);
        dangling(owner(), "timeslot", &ra.timeslot_id, &timeslot_ids);
        dangling(owner(), "role", &ra.role_id, &role_ids);
        dangling(owner(), "person", &ra.person_id, &person_ids);
    }

    // 3. Weekdays
    match s.clock() {
        Some(clock) => check_weekdays(s, &clock, issues),
        None => issues.push(ValidationIssue::new(
            IssueKind::InvalidClock,
            format!("UTC offset of {} seconds is out of range", s.utc_offset_seconds),
        )),
    }

    // 4–6. Placements
    check_placements(s, issues);
}

fn check_weekdays(s: &ScenarioSnapshot, clock: &VenueClock, issues: &mut Vec<ValidationIssue>) {
    for t in &s.timeslots {
        let expected = clock.weekday(t.date);
        if t.day_of_week() != expected {
            issues.push(ValidationIssue::new(
                IssueKind::WeekdayDrift,
                format!(
                    "Timeslot '{}' on {} has day_of_week {}, expected {expected}",
                    t.id,
                    t.date,
                    t.day_of_week()
                ),
            ));
        }
    }
}

fn check_placements(s: &ScenarioSnapshot, issues: &mut Vec<ValidationIssue>) {
    let placements: Vec<(&str, &str, &str)> = s
        .fixed_assignments
        .iter()
        .map(|f| (f.production_id.as_str(), f.timeslot_id.as_str(), f.stage_id.as_str()))
        .chain(s.scheduled_placements.iter().map(|p| {
            (p.production_id.as_str(), p.timeslot_id.as_str(), p.stage_id.as_str())
        }))
        .collect();

    let mut per_slot: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut per_production: HashMap<&str, u32> = HashMap::new();
    for &(production, timeslot, _) in &placements {
        per_slot.entry(timeslot).or_default().push(production);
        *per_production.entry(production).or_default() += 1;
    }

    let mut conflicts: Vec<_> = per_slot.iter().filter(|(_, ps)| ps.len() > 1).collect();
    conflicts.sort();
    for (timeslot, productions) in conflicts {
        issues.push(ValidationIssue::new(
            IssueKind::SlotConflict,
            format!(
                "Timeslot '{timeslot}' holds {} placements: {}",
                productions.len(),
                productions.join(", ")
            ),
        ));
    }

    for p in &s.productions {
        let count = per_production.get(p.id.as_str()).copied().unwrap_or(0);
        if count > p.max_shows {
            issues.push(ValidationIssue::new(
                IssueKind::CapacityExceeded,
                format!(
                    "Production '{}' has {count} placements, max_shows is {}",
                    p.id, p.max_shows
                ),
            ));
        }
    }

    for &(production, timeslot, stage) in &placements {
        let production_stage = s
            .productions
            .iter()
            .find(|p| p.id == production)
            .map(|p| p.stage_id.as_deref());
        let timeslot_stage = s
            .timeslots
            .iter()
            .find(|t| t.id == timeslot)
            .map(|t| t.stage_id.as_str());
        let agrees = production_stage.map_or(true, |ps| ps == Some(stage))
            && timeslot_stage.map_or(true, |ts| ts == stage);
        if !agrees {
            issues.push(ValidationIssue::new(
                IssueKind::StageDisagreement,
                format!(
                    "Placement '{production}@{timeslot}' is on stage '{stage}', production stage {:?}, timeslot stage {:?}",
                    production_stage.flatten(),
                    timeslot_stage
                ),
            ));
        }
    }
}

fn collect_readiness_issues(s: &ScenarioSnapshot, issues: &mut Vec<ValidationIssue>) {
    for (name, empty) in [
        ("productions", s.productions.is_empty()),
        ("stages", s.stages.is_empty()),
        ("timeslots", s.timeslots.is_empty()),
    ] {
        if empty {
            issues.push(ValidationIssue::new(
                IssueKind::EmptyCollection,
                format!("At least one entry is required in {name}"),
            ));
        }
    }

    for st in s.stages.iter().filter(|st| st.name.trim().is_empty()) {
        issues.push(ValidationIssue::new(
            IssueKind::MissingField,
            format!("Stage '{}' has no name", st.id),
        ));
    }
    for p in &s.productions {
        if p.title.trim().is_empty() {
            issues.push(ValidationIssue::new(
                IssueKind::MissingField,
                format!("Production '{}' has no title", p.id),
            ));
        }
        if p.stage_id.is_none() {
            issues.push(ValidationIssue::new(
                IssueKind::UnsetReference,
                format!("Production '{}' has no stage", p.id),
            ));
        }
    }
    for r in s.roles.iter().filter(|r| r.production_id.is_none()) {
        issues.push(ValidationIssue::new(
            IssueKind::UnsetReference,
            format!("Role '{}' has no production", r.id),
        ));
    }
    for c in s.person_production_roles.iter().filter(|c| !c.is_complete()) {
        issues.push(ValidationIssue::new(
            IssueKind::UnsetReference,
            format!("Capability '{}' is missing person, production or role", c.id),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CapabilityDraft, FixedAssignment, ProductionDraft, RoleDraft, StageDraft, TimeslotDraft,
    };
    use crate::store::EntityStore;
    use chrono::{NaiveDate, NaiveTime};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
    }

    fn seven() -> NaiveTime {
        NaiveTime::from_hms_opt(19, 0, 0).unwrap()
    }

    fn ready_store() -> EntityStore {
        let mut store = EntityStore::default();
        store.create(StageDraft::new("Main").with_id("s1")).unwrap();
        store
            .create(ProductionDraft::new("Aida").with_id("p1").on_stage("s1"))
            .unwrap();
        store
            .create(TimeslotDraft::new("s1", date(1), seven()).with_id("t1"))
            .unwrap();
        store
            .create(TimeslotDraft::new("s1", date(2), seven()).with_id("t2"))
            .unwrap();
        store
    }

    fn kinds(result: ValidationResult) -> Vec<IssueKind> {
        result.unwrap_err().into_iter().map(|i| i.kind).collect()
    }

    fn fixed(production: &str, timeslot: &str, stage: &str) -> FixedAssignment {
        FixedAssignment {
            production_id: production.into(),
            timeslot_id: timeslot.into(),
            stage_id: stage.into(),
            date: date(1),
            start_time: seven(),
        }
    }

    #[test]
    fn test_valid_scenario() {
        let snapshot = ready_store().snapshot();
        assert!(check_invariants(&snapshot).is_ok());
        assert!(validate_scenario(&snapshot).is_ok());
    }

    #[test]
    fn test_empty_scenario() {
        let snapshot = EntityStore::default().snapshot();
        assert!(check_invariants(&snapshot).is_ok());
        let found = kinds(validate_scenario(&snapshot));
        assert_eq!(found, vec![IssueKind::EmptyCollection; 3]);
    }

    #[test]
    fn test_unset_references_block_solve_only() {
        let mut store = ready_store();
        store.create(ProductionDraft::new("Tosca")).unwrap();
        store.create(RoleDraft::new("Scarpia")).unwrap();
        store.create(CapabilityDraft::new()).unwrap();
        let snapshot = store.snapshot();

        assert!(check_invariants(&snapshot).is_ok());
        let found = kinds(validate_scenario(&snapshot));
        assert_eq!(found, vec![IssueKind::UnsetReference; 3]);
    }

    #[test]
    fn test_duplicate_and_dangling() {
        let mut snapshot = ready_store().snapshot();
        snapshot.stages.push(snapshot.stages[0].clone());
        snapshot.productions[0].stage_id = Some("ghost".into());

        let issues = check_invariants(&snapshot).unwrap_err();
        assert!(issues
            .iter()
            .any(|i| i.kind == IssueKind::DuplicateId && i.message.contains("stage")));
        assert!(issues
            .iter()
            .any(|i| i.kind == IssueKind::DanglingReference && i.message.contains("ghost")));
    }

    #[test]
    fn test_weekday_drift_detected() {
        let mut snapshot = ready_store().snapshot();
        snapshot.timeslots[0].set_day_of_week(2);
        assert_eq!(kinds(check_invariants(&snapshot)), vec![IssueKind::WeekdayDrift]);

        snapshot.utc_offset_seconds = 100_000;
        assert!(kinds(check_invariants(&snapshot)).contains(&IssueKind::InvalidClock));
    }

    #[test]
    fn test_placement_invariants() {
        let mut snapshot = ready_store().snapshot();
        snapshot.fixed_assignments.push(fixed("p1", "t1", "s1"));
        snapshot.fixed_assignments.push(fixed("p1", "t1", "s1"));
        snapshot.fixed_assignments.push(fixed("p1", "t2", "s9"));

        let found = kinds(check_invariants(&snapshot));
        assert!(found.contains(&IssueKind::SlotConflict));
        assert!(found.contains(&IssueKind::CapacityExceeded));
        assert!(found.contains(&IssueKind::StageDisagreement));
        assert!(found.contains(&IssueKind::DanglingReference));
    }
}
