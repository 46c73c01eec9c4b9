//! Calendar slot generation.
//!
//! Produces a month's timeslot grid for a set of stages. The weekday of a
//! date is read from the venue's fixed civil offset, never from the host's
//! locale: the date is taken as midnight UTC and the weekday is read from
//! that instant shifted into the venue offset.
//!
//! # Weekday Policy (per stage)
//!
//! | Day | Slots |
//! |-----|-------|
//! | Monday | 1, at `monday_time` (the venue is normally dark; kept for data continuity) |
//! | Tuesday–Friday | 1, the stage's weekday evening time |
//! | Saturday, Sunday | 2, the stage's weekend morning and evening times |
//!
//! Generation is pure: the same inputs always give the same slots, with the
//! same identities, so a month can be regenerated at any time.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc,
};

use crate::config::{SlotTimes, VenueConfig};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{clock_time, Stage, Timeslot};

/// Venue-local time arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VenueClock {
    offset: FixedOffset,
    performance: Duration,
}

impl VenueClock {
    pub fn new(offset: FixedOffset, performance: Duration) -> Self {
        Self {
            offset,
            performance,
        }
    }

    pub fn from_config(config: &VenueConfig) -> LedgerResult<Self> {
        Ok(Self::new(config.offset()?, config.performance_length()))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Nominal length of one performance.
    pub fn performance(&self) -> Duration {
        self.performance
    }

    /// Weekday of a date-only value (Monday = 0 … Sunday = 6).
    pub fn weekday(&self, date: NaiveDate) -> u8 {
        let midnight_utc = date.and_time(NaiveTime::default());
        let local = self.offset.from_utc_datetime(&midnight_utc);
        local.weekday().num_days_from_monday() as u8
    }

    /// The instant a wall-clock `time` on `date` denotes at the venue.
    pub fn local_datetime(&self, date: NaiveDate, time: NaiveTime) -> DateTime<FixedOffset> {
        let shift = Duration::seconds(i64::from(self.offset.local_minus_utc()));
        self.offset.from_utc_datetime(&(date.and_time(time) - shift))
    }

    /// `(start, end)` of a performance starting at `time` on `date`.
    pub fn performance_window(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
        let start = self.local_datetime(date, time);
        (start, start + self.performance)
    }
}

impl Default for VenueClock {
    /// UTC+3 with three-hour performances.
    fn default() -> Self {
        let offset = FixedOffset::east_opt(3 * 3600).unwrap_or_else(|| Utc.fix());
        Self::new(offset, Duration::minutes(180))
    }
}

/// Number of days in a month, or `None` for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?;
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|d| d.day())
}

/// Identity of a generated slot: `slot_<date>_<stage>_<HHMM>`.
pub fn slot_id(date: NaiveDate, stage_id: &str, time: NaiveTime) -> String {
    format!(
        "slot_{}_{}_{}",
        date.format("%Y-%m-%d"),
        stage_id,
        clock_time::format(&time).replace(':', "")
    )
}

/// Builds month grids of timeslots from the venue configuration.
#[derive(Debug, Clone)]
pub struct CalendarSlotGenerator {
    clock: VenueClock,
    config: VenueConfig,
}

impl CalendarSlotGenerator {
    /// Creates a generator; fails on an invalid configuration.
    pub fn new(config: &VenueConfig) -> LedgerResult<Self> {
        config.validate()?;
        Ok(Self {
            clock: VenueClock::from_config(config)?,
            config: config.clone(),
        })
    }

    pub fn clock(&self) -> VenueClock {
        self.clock
    }

    /// Slot times used for `stage`.
    pub fn slot_times(&self, stage: &Stage) -> SlotTimes {
        self.config.slot_times(stage)
    }

    /// Start times a stage gets on a given weekday.
    pub fn start_times(&self, stage: &Stage, day_of_week: u8) -> Vec<NaiveTime> {
        let times = self.slot_times(stage);
        match day_of_week {
            0 => vec![self.config.monday_time],
            5 | 6 => vec![times.weekend_morning, times.weekend_evening],
            _ => vec![times.weekday],
        }
    }

    /// Generates every slot of `month` (1–12) for `stages`, ordered by date,
    /// then stage order, then start time.
    pub fn generate(&self, year: i32, month: u32, stages: &[Stage]) -> LedgerResult<Vec<Timeslot>> {
        let days = days_in_month(year, month).ok_or_else(|| {
            LedgerError::validation(format!("invalid calendar month {year}-{month:02}"))
        })?;

        let mut slots = Vec::with_capacity(days as usize * stages.len() * 2);
        for date in (1..=days).filter_map(|day| NaiveDate::from_ymd_opt(year, month, day)) {
            let dow = self.clock.weekday(date);
            for stage in stages {
                for time in self.start_times(stage, dow) {
                    slots.push(Timeslot::new(
                        slot_id(date, &stage.id, time),
                        stage.id.as_str(),
                        date,
                        dow,
                        time,
                    ));
                }
            }
        }
        Ok(slots)
    }
}
