//! Timeslot model.
//!
//! A timeslot is one bookable performance start on one stage. Its weekday is
//! derived from `date` in the venue's civil calendar and is never accepted
//! from callers; only the ledger computes it.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// A bookable start time on a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeslot {
    /// Unique timeslot identifier.
    pub id: String,
    /// Stage the slot belongs to.
    pub stage_id: String,
    /// Calendar date of the performance.
    pub date: NaiveDate,
    /// Monday = 0 … Sunday = 6, derived from `date`.
    day_of_week: u8,
    /// Local start time.
    #[serde(with = "super::clock_time")]
    pub start_time: NaiveTime,
}

impl Timeslot {
    pub(crate) fn new(
        id: impl Into<String>,
        stage_id: impl Into<String>,
        date: NaiveDate,
        day_of_week: u8,
        start_time: NaiveTime,
    ) -> Self {
        Self {
            id: id.into(),
            stage_id: stage_id.into(),
            date,
            day_of_week,
            start_time,
        }
    }

    /// Weekday number (Monday = 0 … Sunday = 6).
    pub fn day_of_week(&self) -> u8 {
        self.day_of_week
    }

    /// Whether the slot falls on Saturday or Sunday.
    pub fn is_weekend(&self) -> bool {
        self.day_of_week >= 5
    }

    pub(crate) fn set_day_of_week(&mut self, day_of_week: u8) {
        self.day_of_week = day_of_week;
    }
}

/// Creation payload for a [`Timeslot`].
#[derive(Debug, Clone)]
pub struct TimeslotDraft {
    pub id: Option<String>,
    pub stage_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
}

impl TimeslotDraft {
    pub fn new(stage_id: impl Into<String>, date: NaiveDate, start_time: NaiveTime) -> Self {
        Self {
            id: None,
            stage_id: stage_id.into(),
            date,
            start_time,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Partial update for a [`Timeslot`].
///
/// Has no `day_of_week` field: the ledger re-derives it from `date`.
#[derive(Debug, Clone, Default)]
pub struct TimeslotPatch {
    pub stage_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
}

impl TimeslotPatch {
    pub fn with_stage(mut self, stage_id: impl Into<String>) -> Self {
        self.stage_id = Some(stage_id.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_start_time(mut self, start_time: NaiveTime) -> Self {
        self.start_time = Some(start_time);
        self
    }
}
