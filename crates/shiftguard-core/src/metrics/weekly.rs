//! Trailing seven-day totals.

use chrono::{DateTime, Days, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::session::CompletedSession;

/// Days in the weekly window.
pub const WEEK_DAYS: usize = 7;

/// Minutes worked on each of the last seven local days, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyTotals {
    /// `MM-DD` per day.
    pub labels: Vec<String>,
    pub minutes: Vec<u64>,
}

impl WeeklyTotals {
    pub fn total_minutes(&self) -> u64 {
        self.minutes.iter().sum()
    }

    /// Label and minutes of the busiest day, if any day has work.
    pub fn best_day(&self) -> Option<(&str, u64)> {
        self.labels
            .iter()
            .zip(&self.minutes)
            .filter(|(_, m)| **m > 0)
            .max_by_key(|(_, m)| **m)
            .map(|(l, m)| (l.as_str(), *m))
    }
}

/// Session length in whole minutes, rounding half up.
pub fn rounded_minutes(duration_seconds: u64) -> u64 {
    (duration_seconds + 30) / 60
}

/// Per-day totals for the trailing week ending today.
///
/// Each session is attributed to the local day of its `started_at` and rounded
/// to the nearest minute before summing.
pub fn compute_weekly_totals<Tz: TimeZone>(
    history: &[CompletedSession],
    now: &DateTime<Tz>,
) -> WeeklyTotals {
    let tz = now.timezone();
    let today = now.date_naive();
    let days: Vec<NaiveDate> = (0..WEEK_DAYS as u64)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .collect();

    let mut minutes = vec![0u64; days.len()];
    for session in history {
        let day = session.started_at.with_timezone(&tz).date_naive();
        if let Some(slot) = days.iter().position(|d| *d == day) {
            minutes[slot] += rounded_minutes(session.duration_seconds);
        }
    }

    WeeklyTotals {
        labels: days.iter().map(|d| d.format("%m-%d").to_string()).collect(),
        minutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;
    use chrono::{Duration, Utc};

    fn session(day: u32, seconds: u64) -> CompletedSession {
        let started_at = Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap();
        CompletedSession {
            session_id: SessionId::generate(),
            started_at,
            ended_at: started_at + Duration::seconds(seconds as i64),
            duration_seconds: seconds,
        }
    }

    #[test]
    fn seven_labels_oldest_first_with_zero_days() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 20, 0, 0).unwrap();
        let totals = compute_weekly_totals(&[], &now);
        assert_eq!(
            totals.labels,
            ["03-04", "03-05", "03-06", "03-07", "03-08", "03-09", "03-10"]
        );
        assert_eq!(totals.minutes, vec![0; 7]);
        assert_eq!(totals.best_day(), None);
    }

    #[test]
    fn sessions_round_individually_then_sum() {
        let history = vec![
            session(10, 89),  // 1 min
            session(10, 90),  // 2 min
            session(9, 1200), // 20 min
            session(2, 3600), // outside the window
        ];
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 20, 0, 0).unwrap();
        let totals = compute_weekly_totals(&history, &now);
        assert_eq!(totals.minutes, vec![0, 0, 0, 0, 0, 20, 3]);
        assert_eq!(totals.total_minutes(), 23);
        assert_eq!(totals.best_day(), Some(("03-09", 20)));
    }

    #[test]
    fn window_crosses_month_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let totals = compute_weekly_totals(&[], &now);
        assert_eq!(totals.labels.first().map(String::as_str), Some("02-24"));
        assert_eq!(totals.labels.last().map(String::as_str), Some("03-02"));
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(rounded_minutes(0), 0);
        assert_eq!(rounded_minutes(29), 0);
        assert_eq!(rounded_minutes(30), 1);
        assert_eq!(rounded_minutes(150), 3);
    }
}
