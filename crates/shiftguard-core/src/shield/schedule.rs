use chrono::{DateTime, Datelike, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Weekly restriction window handed to the shield platform.
///
/// `start`/`end` are local `HH:MM`; `days` uses 0 = Sunday .. 6 = Saturday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSchedule {
    #[serde(default = "default_start")]
    pub start: String,
    #[serde(default = "default_end")]
    pub end: String,
    #[serde(default = "default_days")]
    pub days: Vec<u8>,
}

fn default_start() -> String {
    "09:00".into()
}
fn default_end() -> String {
    "17:00".into()
}
fn default_days() -> Vec<u8> {
    vec![1, 2, 3, 4, 5]
}

impl Default for WorkSchedule {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: default_end(),
            days: default_days(),
        }
    }
}

impl WorkSchedule {
    pub fn start_time(&self) -> Result<NaiveTime, ValidationError> {
        parse_hhmm("start", &self.start)
    }

    pub fn end_time(&self) -> Result<NaiveTime, ValidationError> {
        parse_hhmm("end", &self.end)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let start = self.start_time()?;
        let end = self.end_time()?;
        if end <= start {
            return Err(ValidationError::InvalidTimeRange {
                start: self.start.clone(),
                end: self.end.clone(),
            });
        }
        if let Some(bad) = self.days.iter().find(|d| **d > 6) {
            return Err(ValidationError::InvalidValue {
                field: "days".into(),
                message: format!("day {bad} is outside 0 (Sunday) ..= 6 (Saturday)"),
            });
        }
        Ok(())
    }

    /// Whether `at`, in its own timezone, falls inside the window.
    pub fn contains<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        let (Ok(start), Ok(end)) = (self.start_time(), self.end_time()) else {
            return false;
        };
        let weekday = at.weekday().num_days_from_sunday() as u8;
        let time = at.time();
        self.days.contains(&weekday) && time >= start && time < end
    }
}

fn parse_hhmm(field: &str, value: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| ValidationError::InvalidValue {
        field: field.into(),
        message: format!("expected HH:MM, got '{value}'"),
    })
}
