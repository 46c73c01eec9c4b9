//! Read-only scenario snapshots.
//!
//! A [`ScenarioSnapshot`] is an owned copy of every collection, taken with
//! [`EntityStore::snapshot`](crate::store::EntityStore::snapshot). It is what
//! rendering layers read and what solve requests are built from, and it
//! offers the derived groupings views need.

use std::collections::BTreeMap;

use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::calendar::VenueClock;
use crate::models::{
    FixedAssignment, Person, PersonProductionRole, PlacementKind, Production, Role,
    RoleAssignment, ScheduleItemId, ScheduledPlacement, Stage, Timeslot,
};
use crate::store::CalendarMonth;

/// Owned copy of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSnapshot {
    /// Venue offset east of UTC.
    pub utc_offset_seconds: i32,
    pub performance_minutes: i64,
    pub calendar_month: Option<CalendarMonth>,
    pub stages: Vec<Stage>,
    pub productions: Vec<Production>,
    pub timeslots: Vec<Timeslot>,
    pub roles: Vec<Role>,
    pub people: Vec<Person>,
    pub person_production_roles: Vec<PersonProductionRole>,
    pub fixed_assignments: Vec<FixedAssignment>,
    pub scheduled_placements: Vec<ScheduledPlacement>,
    pub role_assignments: Vec<RoleAssignment>,
}

/// One committed placement, whichever source it comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementView {
    pub kind: PlacementKind,
    pub production_id: String,
    pub stage_id: String,
    pub timeslot_id: String,
    /// Venue-local date.
    pub date: NaiveDate,
    /// Venue-local start time.
    #[serde(with = "crate::models::clock_time")]
    pub start_time: NaiveTime,
}

impl PlacementView {
    pub fn schedule_item_id(&self) -> ScheduleItemId {
        ScheduleItemId::new(&self.production_id, &self.stage_id, &self.timeslot_id)
    }

    pub fn is_fixed(&self) -> bool {
        self.kind == PlacementKind::Fixed
    }
}

impl From<&FixedAssignment> for PlacementView {
    fn from(f: &FixedAssignment) -> Self {
        Self {
            kind: PlacementKind::Fixed,
            production_id: f.production_id.clone(),
            stage_id: f.stage_id.clone(),
            timeslot_id: f.timeslot_id.clone(),
            date: f.date,
            start_time: f.start_time,
        }
    }
}

impl From<&ScheduledPlacement> for PlacementView {
    fn from(s: &ScheduledPlacement) -> Self {
        Self {
            kind: PlacementKind::Scheduled,
            production_id: s.production_id.clone(),
            stage_id: s.stage_id.clone(),
            timeslot_id: s.timeslot_id.clone(),
            date: s.start.date_naive(),
            start_time: s.start.time(),
        }
    }
}

impl ScenarioSnapshot {
    /// The venue clock the snapshot was taken with, if its offset is valid.
    pub fn clock(&self) -> Option<VenueClock> {
        let offset = FixedOffset::east_opt(self.utc_offset_seconds)?;
        Some(VenueClock::new(
            offset,
            Duration::minutes(self.performance_minutes),
        ))
    }

    /// Productions grouped by committed stage; `None` collects unstaged ones.
    pub fn productions_by_stage(&self) -> BTreeMap<Option<&str>, Vec<&Production>> {
        let mut groups: BTreeMap<Option<&str>, Vec<&Production>> = BTreeMap::new();
        for production in &self.productions {
            groups
                .entry(production.stage_id.as_deref())
                .or_default()
                .push(production);
        }
        groups
    }

    /// Timeslots grouped by stage, each group in date/start order.
    pub fn timeslots_by_stage(&self) -> BTreeMap<&str, Vec<&Timeslot>> {
        let mut groups: BTreeMap<&str, Vec<&Timeslot>> = BTreeMap::new();
        for slot in &self.timeslots {
            groups.entry(slot.stage_id.as_str()).or_default().push(slot);
        }
        for slots in groups.values_mut() {
            slots.sort_by_key(|s| (s.date, s.start_time));
        }
        groups
    }

    /// Role assignments grouped by performance.
    pub fn assignments_by_schedule_item(&self) -> BTreeMap<&ScheduleItemId, Vec<&RoleAssignment>> {
        let mut groups: BTreeMap<&ScheduleItemId, Vec<&RoleAssignment>> = BTreeMap::new();
        for ra in &self.role_assignments {
            groups.entry(&ra.schedule_item_id).or_default().push(ra);
        }
        groups
    }

    /// Every committed placement, fixed and scheduled, in date/start/stage order.
    pub fn placements(&self) -> Vec<PlacementView> {
        let mut views: Vec<PlacementView> = self
            .fixed_assignments
            .iter()
            .map(PlacementView::from)
            .chain(self.scheduled_placements.iter().map(PlacementView::from))
            .collect();
        views.sort_by(|a, b| {
            (a.date, a.start_time, &a.stage_id).cmp(&(b.date, b.start_time, &b.stage_id))
        });
        views
    }
}
