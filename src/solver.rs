//! Scheduler Service contract.
//!
//! The optimizer is an external service. This module defines what is sent
//! to it and what comes back; the transport is up to the caller, which must
//! echo the request's `sequence` in the response it hands to
//! [`PlacementReconciler::accept`](crate::reconcile::PlacementReconciler::accept).
//!
//! # Constraint Switches
//!
//! | Name | Default | Kind |
//! |------|---------|------|
//! | `one_production_per_timeslot` | on | hard |
//! | `exact_shows_count` | on | hard |
//! | `consecutive_shows` | on | hard |
//! | `monday_off` | on | hard |
//! | `weekend_always_show` | on | hard |
//! | `same_show_weekend` | off | hard |
//! | `break_between_different_shows` | on | soft |
//! | `weekend_priority_bonus` | on | soft |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{
    FixedAssignment, Person, PersonProductionRole, Production, Role, ScheduleItemId, Stage,
    Timeslot,
};
use crate::snapshot::ScenarioSnapshot;

pub const ONE_PRODUCTION_PER_TIMESLOT: &str = "one_production_per_timeslot";
pub const EXACT_SHOWS_COUNT: &str = "exact_shows_count";
pub const CONSECUTIVE_SHOWS: &str = "consecutive_shows";
pub const MONDAY_OFF: &str = "monday_off";
pub const WEEKEND_ALWAYS_SHOW: &str = "weekend_always_show";
pub const SAME_SHOW_WEEKEND: &str = "same_show_weekend";
pub const BREAK_BETWEEN_DIFFERENT_SHOWS: &str = "break_between_different_shows";
pub const WEEKEND_PRIORITY_BONUS: &str = "weekend_priority_bonus";

/// Named boolean constraint switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintConfig(BTreeMap<String, bool>);

impl Default for ConstraintConfig {
    fn default() -> Self {
        let switches = [
            (ONE_PRODUCTION_PER_TIMESLOT, true),
            (EXACT_SHOWS_COUNT, true),
            (CONSECUTIVE_SHOWS, true),
            (MONDAY_OFF, true),
            (WEEKEND_ALWAYS_SHOW, true),
            (SAME_SHOW_WEEKEND, false),
            (BREAK_BETWEEN_DIFFERENT_SHOWS, true),
            (WEEKEND_PRIORITY_BONUS, true),
        ];
        Self(
            switches
                .into_iter()
                .map(|(name, on)| (name.to_string(), on))
                .collect(),
        )
    }
}

impl ConstraintConfig {
    /// Applies overrides by name. Unknown names are passed through.
    pub fn merged(mut self, overrides: &BTreeMap<String, bool>) -> Self {
        for (name, on) in overrides {
            self.0.insert(name.clone(), *on);
        }
        self
    }

    pub fn with(mut self, name: impl Into<String>, on: bool) -> Self {
        self.0.insert(name.into(), on);
        self
    }

    /// Whether a switch is on. Unknown switches are off.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, on)| (name.as_str(), *on))
    }
}

/// Full scenario sent to the Scheduler Service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveRequest {
    /// Monotonic request number, echoed back in the response.
    pub sequence: u64,
    pub stages: Vec<Stage>,
    pub productions: Vec<Production>,
    pub timeslots: Vec<Timeslot>,
    pub fixed_assignments: Vec<FixedAssignment>,
    pub roles: Vec<Role>,
    pub people: Vec<Person>,
    pub person_production_roles: Vec<PersonProductionRole>,
    pub constraints: ConstraintConfig,
    pub time_limit_seconds: f64,
}

impl SolveRequest {
    pub(crate) fn from_snapshot(
        sequence: u64,
        snapshot: ScenarioSnapshot,
        constraints: ConstraintConfig,
        time_limit_seconds: f64,
    ) -> Self {
        Self {
            sequence,
            stages: snapshot.stages,
            productions: snapshot.productions,
            timeslots: snapshot.timeslots,
            fixed_assignments: snapshot.fixed_assignments,
            roles: snapshot.roles,
            people: snapshot.people,
            person_production_roles: snapshot.person_production_roles,
            constraints,
            time_limit_seconds,
        }
    }
}

/// Outcome class reported by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverStatus {
    Optimal,
    Feasible,
    Infeasible,
}

impl SolverStatus {
    /// Whether the response carries a usable schedule.
    pub fn has_solution(self) -> bool {
        !matches!(self, SolverStatus::Infeasible)
    }
}

/// One solver-placed performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub production_id: String,
    pub stage_id: String,
    pub timeslot_id: String,
    #[serde(default)]
    pub revenue: f64,
}

impl ScheduleEntry {
    pub fn new(
        production_id: impl Into<String>,
        stage_id: impl Into<String>,
        timeslot_id: impl Into<String>,
    ) -> Self {
        Self {
            production_id: production_id.into(),
            stage_id: stage_id.into(),
            timeslot_id: timeslot_id.into(),
            revenue: 0.0,
        }
    }

    pub fn schedule_item_id(&self) -> ScheduleItemId {
        ScheduleItemId::new(&self.production_id, &self.stage_id, &self.timeslot_id)
    }
}

/// One solver-cast role for one performance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignmentEntry {
    pub schedule_item_id: ScheduleItemId,
    pub production_id: String,
    pub timeslot_id: String,
    pub stage_id: String,
    pub person_id: String,
    pub role_id: String,
    #[serde(default)]
    pub is_conductor: bool,
}

/// Result returned by the Scheduler Service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResponse {
    /// Sequence of the request this answers.
    pub sequence: u64,
    pub status: SolverStatus,
    #[serde(default)]
    pub objective_value: f64,
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
    #[serde(default)]
    pub assignments: Vec<RoleAssignmentEntry>,
}

impl SolveResponse {
    /// An empty response, mostly for callers building one by hand.
    pub fn new(sequence: u64, status: SolverStatus) -> Self {
        Self {
            sequence,
            status,
            objective_value: 0.0,
            schedule: Vec::new(),
            assignments: Vec::new(),
        }
    }

    pub fn with_entry(mut self, entry: ScheduleEntry) -> Self {
        self.schedule.push(entry);
        self
    }

    pub fn with_assignment(mut self, assignment: RoleAssignmentEntry) -> Self {
        self.assignments.push(assignment);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_constraint_defaults_and_overrides() {
        let config = ConstraintConfig::default();
        assert_eq!(config.iter().count(), 8);
        assert!(config.is_enabled(MONDAY_OFF));
        assert!(!config.is_enabled(SAME_SHOW_WEEKEND));
        assert!(!config.is_enabled("no_such_switch"));

        let overrides = BTreeMap::from([(MONDAY_OFF.to_string(), false)]);
        let merged = config.merged(&overrides);
        assert!(!merged.is_enabled(MONDAY_OFF));
        assert!(merged.is_enabled(CONSECUTIVE_SHOWS));
    }

    #[test]
    fn test_constraints_serialize_as_flat_map() {
        let value = serde_json::to_value(ConstraintConfig::default()).unwrap();
        assert_eq!(value["same_show_weekend"], json!(false));
        assert_eq!(value["exact_shows_count"], json!(true));
    }

    #[test]
    fn test_response_wire_shape() {
        let raw = json!({
            "sequence": 3,
            "status": "feasible",
            "objective_value": 1250.5,
            "schedule": [
                {"production_id": "p1", "stage_id": "s1", "timeslot_id": "t1", "revenue": 800.0}
            ],
            "assignments": [{
                "schedule_item_id": "p1|s1|t1",
                "production_id": "p1",
                "timeslot_id": "t1",
                "stage_id": "s1",
                "person_id": "anna",
                "role_id": "p1_conductor",
                "is_conductor": true
            }]
        });
        let response: SolveResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.status, SolverStatus::Feasible);
        assert_eq!(
            response.schedule[0].schedule_item_id(),
            response.assignments[0].schedule_item_id
        );

        let infeasible: SolveResponse =
            serde_json::from_value(json!({"sequence": 4, "status": "infeasible"})).unwrap();
        assert!(!infeasible.status.has_solution());
        assert!(infeasible.schedule.is_empty());
    }

    #[test]
    fn test_unknown_status_rejected() {
        let result: Result<SolveResponse, _> =
            serde_json::from_value(json!({"sequence": 1, "status": "OPTIMAL"}));
        assert!(result.is_err());
    }
}
