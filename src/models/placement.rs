//! Placement models.
//!
//! A placement puts one performance of a production into one timeslot. There
//! are two sources:
//!
//! - **Fixed** ([`FixedAssignment`]): chosen by the editor, sticky across
//!   solves, passed to the solver as a hard constraint.
//! - **Scheduled** ([`ScheduledPlacement`]): produced by the solver and
//!   replaced wholesale on every accepted response.
//!
//! Both count against a production's `max_shows` and both occupy their
//! timeslot exclusively.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Editor-chosen placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedAssignment {
    pub production_id: String,
    pub timeslot_id: String,
    /// Equals both the production's and the timeslot's stage.
    pub stage_id: String,
    /// Copied from the timeslot.
    pub date: NaiveDate,
    /// Copied from the timeslot.
    #[serde(with = "super::clock_time")]
    pub start_time: NaiveTime,
}

/// Solver-produced placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledPlacement {
    pub production_id: String,
    pub stage_id: String,
    pub timeslot_id: String,
    /// Performance start in the venue offset.
    pub start: DateTime<FixedOffset>,
    /// Performance end in the venue offset.
    pub end: DateTime<FixedOffset>,
}

/// Who plays which role in one performance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub schedule_item_id: ScheduleItemId,
    pub production_id: String,
    pub timeslot_id: String,
    pub stage_id: String,
    pub person_id: String,
    pub role_id: String,
    pub is_conductor: bool,
}

/// Composite key of one performance: `production_id|stage_id|timeslot_id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleItemId(String);

impl ScheduleItemId {
    pub(crate) const SEPARATOR: char = '|';

    pub fn new(production_id: &str, stage_id: &str, timeslot_id: &str) -> Self {
        Self(format!(
            "{production_id}{sep}{stage_id}{sep}{timeslot_id}",
            sep = Self::SEPARATOR
        ))
    }

    /// Splits into `(production_id, stage_id, timeslot_id)`.
    ///
    /// Returns `None` unless there are exactly three non-empty parts.
    pub fn parts(&self) -> Option<(&str, &str, &str)> {
        let mut it = self.0.split(Self::SEPARATOR);
        let production = it.next()?;
        let stage = it.next()?;
        let timeslot = it.next()?;
        if it.next().is_some() || [production, stage, timeslot].iter().any(|p| p.is_empty()) {
            return None;
        }
        Some((production, stage, timeslot))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScheduleItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ScheduleItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which source a placement comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementKind {
    Fixed,
    Scheduled,
}

/// Identity of a committed placement.
///
/// A timeslot holds at most one placement, so `(kind, production, timeslot)`
/// addresses it uniquely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementId {
    pub kind: PlacementKind,
    pub production_id: String,
    pub timeslot_id: String,
}

impl PlacementId {
    pub fn fixed(production_id: impl Into<String>, timeslot_id: impl Into<String>) -> Self {
        Self {
            kind: PlacementKind::Fixed,
            production_id: production_id.into(),
            timeslot_id: timeslot_id.into(),
        }
    }

    pub fn scheduled(production_id: impl Into<String>, timeslot_id: impl Into<String>) -> Self {
        Self {
            kind: PlacementKind::Scheduled,
            production_id: production_id.into(),
            timeslot_id: timeslot_id.into(),
        }
    }
}

impl FixedAssignment {
    pub fn placement_id(&self) -> PlacementId {
        PlacementId::fixed(&self.production_id, &self.timeslot_id)
    }

    pub fn schedule_item_id(&self) -> ScheduleItemId {
        ScheduleItemId::new(&self.production_id, &self.stage_id, &self.timeslot_id)
    }
}

impl ScheduledPlacement {
    pub fn placement_id(&self) -> PlacementId {
        PlacementId::scheduled(&self.production_id, &self.timeslot_id)
    }

    pub fn schedule_item_id(&self) -> ScheduleItemId {
        ScheduleItemId::new(&self.production_id, &self.stage_id, &self.timeslot_id)
    }
}
