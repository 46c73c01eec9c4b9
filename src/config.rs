//! Venue configuration.
//!
//! Read from TOML. Every field has a default, so an empty document yields
//! the stock venue: UTC+3 civil calendar, three-hour performances, and the
//! slot-time table of the two named house stages.
//!
//! ```toml
//! utc_offset_hours = 3
//! performance_minutes = 180
//! monday_time = "19:00"
//!
//! [fallback]
//! weekday = "19:00"
//! weekend_morning = "11:00"
//! weekend_evening = "20:00"
//!
//! [[stages]]
//! id = "s1"
//! name_pattern = "Историческая"
//! weekday = "19:00"
//! weekend_morning = "14:00"
//! weekend_evening = "19:00"
//!
//! [solver]
//! time_limit_seconds = 10.0
//!
//! [solver.constraints]
//! monday_off = false
//! ```

use chrono::{Duration, FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{clock_time, Stage};

/// Venue-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Fixed civil offset of the venue, in whole hours east of UTC.
    #[serde(default = "default_offset_hours")]
    pub utc_offset_hours: i32,
    /// Nominal performance length, used for placement end times.
    #[serde(default = "default_performance_minutes")]
    pub performance_minutes: u32,
    /// Start of the single Monday slot on every stage.
    #[serde(default = "default_monday_time", with = "clock_time")]
    pub monday_time: NaiveTime,
    /// Slot times for stages no rule matches.
    #[serde(default = "SlotTimes::fallback")]
    pub fallback: SlotTimes,
    /// Per-stage slot times, first match wins.
    #[serde(default = "default_stage_rules")]
    pub stages: Vec<StageSlotRule>,
    #[serde(default)]
    pub solver: SolverSettings,
}

/// Slot start times of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTimes {
    /// Tuesday–Friday evening slot.
    #[serde(with = "clock_time")]
    pub weekday: NaiveTime,
    /// Saturday/Sunday first slot.
    #[serde(with = "clock_time")]
    pub weekend_morning: NaiveTime,
    /// Saturday/Sunday second slot.
    #[serde(with = "clock_time")]
    pub weekend_evening: NaiveTime,
}

/// Slot times bound to a stage by identity or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSlotRule {
    /// Canonical stage identity.
    #[serde(default)]
    pub id: Option<String>,
    /// Case-insensitive substring of the stage name.
    #[serde(default)]
    pub name_pattern: Option<String>,
    #[serde(flatten)]
    pub times: SlotTimes,
}

/// Settings forwarded to the Scheduler Service with every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSettings {
    #[serde(default = "default_time_limit")]
    pub time_limit_seconds: f64,
    /// Overrides merged over the default constraint switches.
    #[serde(default)]
    pub constraints: BTreeMap<String, bool>,
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

fn default_offset_hours() -> i32 {
    3
}

fn default_performance_minutes() -> u32 {
    180
}

fn default_monday_time() -> NaiveTime {
    hm(19, 0)
}

fn default_time_limit() -> f64 {
    10.0
}

fn default_stage_rules() -> Vec<StageSlotRule> {
    vec![
        StageSlotRule::for_id("s1", SlotTimes::new(hm(19, 0), hm(14, 0), hm(19, 0)))
            .with_name_pattern("Историческая"),
        StageSlotRule::for_id("s2", SlotTimes::new(hm(18, 0), hm(12, 0), hm(18, 0)))
            .with_name_pattern("Новая"),
    ]
}

impl SlotTimes {
    pub fn new(weekday: NaiveTime, weekend_morning: NaiveTime, weekend_evening: NaiveTime) -> Self {
        Self {
            weekday,
            weekend_morning,
            weekend_evening,
        }
    }

    /// Generic times for unrecognised stages.
    pub fn fallback() -> Self {
        Self::new(hm(19, 0), hm(11, 0), hm(20, 0))
    }
}

impl StageSlotRule {
    pub fn for_id(id: impl Into<String>, times: SlotTimes) -> Self {
        Self {
            id: Some(id.into()),
            name_pattern: None,
            times,
        }
    }

    pub fn for_name(pattern: impl Into<String>, times: SlotTimes) -> Self {
        Self {
            id: None,
            name_pattern: Some(pattern.into()),
            times,
        }
    }

    pub fn with_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.name_pattern = Some(pattern.into());
        self
    }

    /// Whether the rule applies to `stage`.
    pub fn matches(&self, stage: &Stage) -> bool {
        if self.id.as_deref() == Some(stage.id.as_str()) {
            return true;
        }
        match &self.name_pattern {
            Some(pattern) if !pattern.is_empty() => stage
                .name
                .to_lowercase()
                .contains(&pattern.to_lowercase()),
            _ => false,
        }
    }
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_limit_seconds: default_time_limit(),
            constraints: BTreeMap::new(),
        }
    }
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_offset_hours(),
            performance_minutes: default_performance_minutes(),
            monday_time: default_monday_time(),
            fallback: SlotTimes::fallback(),
            stages: default_stage_rules(),
            solver: SolverSettings::default(),
        }
    }
}

impl VenueConfig {
    /// Parses a TOML document and validates it.
    pub fn from_toml_str(content: &str) -> LedgerResult<Self> {
        let config: VenueConfig = toml::from_str(content)
            .map_err(|e| LedgerError::Config(format!("Failed to parse venue config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the venue configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            LedgerError::Config(format!(
                "Failed to read venue config {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Checks ranges that serde cannot express.
    pub fn validate(&self) -> LedgerResult<()> {
        self.offset()?;
        if self.performance_minutes == 0 {
            return Err(LedgerError::Config(
                "performance_minutes must be positive".into(),
            ));
        }
        let limit = self.solver.time_limit_seconds;
        if limit.is_nan() || limit <= 0.0 {
            return Err(LedgerError::Config(
                "solver.time_limit_seconds must be positive".into(),
            ));
        }
        let all_times = std::iter::once(&self.fallback).chain(self.stages.iter().map(|r| &r.times));
        for times in all_times {
            if times.weekend_morning == times.weekend_evening {
                return Err(LedgerError::Config(format!(
                    "weekend slots must differ, both are {}",
                    clock_time::format(&times.weekend_morning)
                )));
            }
        }
        if let Some(rule) = self
            .stages
            .iter()
            .find(|r| r.id.is_none() && r.name_pattern.as_deref().map_or(true, str::is_empty))
        {
            return Err(LedgerError::Config(format!(
                "stage rule {:?} has neither id nor name_pattern",
                rule.times
            )));
        }
        Ok(())
    }

    /// The venue's civil offset.
    pub fn offset(&self) -> LedgerResult<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                LedgerError::Config(format!(
                    "utc_offset_hours {} is out of range",
                    self.utc_offset_hours
                ))
            })
    }

    pub fn performance_length(&self) -> Duration {
        Duration::minutes(i64::from(self.performance_minutes))
    }

    /// Slot times for a stage: first matching rule, else the fallback.
    pub fn slot_times(&self, stage: &Stage) -> SlotTimes {
        self.stages
            .iter()
            .find(|rule| rule.matches(stage))
            .map(|rule| rule.times)
            .unwrap_or(self.fallback)
    }
}
