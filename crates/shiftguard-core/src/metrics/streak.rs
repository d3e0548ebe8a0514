//! Focus streaks over local calendar days.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, TimeZone};

use crate::session::CompletedSession;

/// Local calendar days on which at least one session started.
pub fn active_days<Tz: TimeZone>(history: &[CompletedSession], tz: &Tz) -> BTreeSet<NaiveDate> {
    history
        .iter()
        .map(|s| s.started_at.with_timezone(tz).date_naive())
        .collect()
}

/// Consecutive local days ending today that each have at least one session.
///
/// A day without sessions today means a streak of 0, even if yesterday
/// had one.
pub fn compute_focus_streak<Tz: TimeZone>(history: &[CompletedSession], now: &DateTime<Tz>) -> u32 {
    let days = active_days(history, &now.timezone());
    let mut cursor = Some(now.date_naive());
    let mut streak = 0;
    while let Some(day) = cursor.filter(|d| days.contains(d)) {
        streak += 1;
        cursor = day.pred_opt();
    }
    streak
}

/// Longest run of consecutive active days anywhere in the history.
pub fn longest_focus_streak<Tz: TimeZone>(history: &[CompletedSession], tz: &Tz) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in active_days(history, tz) {
        run = match previous.and_then(|p| p.succ_opt()) {
            Some(next) if next == day => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;
    use chrono::{Duration, FixedOffset, Utc};

    fn session_on(day: u32, hour: u32) -> CompletedSession {
        let started_at = Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap();
        CompletedSession {
            session_id: SessionId::generate(),
            started_at,
            ended_at: started_at + Duration::hours(1),
            duration_seconds: 3600,
        }
    }

    #[test]
    fn three_day_streak_stops_at_gap() {
        // Today is the 10th; sessions on 10, 9, 8 and 6.
        let history = vec![
            session_on(6, 9),
            session_on(8, 9),
            session_on(9, 9),
            session_on(9, 14),
            session_on(10, 9),
        ];
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 18, 0, 0).unwrap();
        assert_eq!(compute_focus_streak(&history, &now), 3);
    }

    #[test]
    fn no_session_today_means_zero() {
        let history = vec![session_on(8, 9), session_on(9, 9)];
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap();
        assert_eq!(compute_focus_streak(&history, &now), 0);
        assert_eq!(compute_focus_streak(&[], &now), 0);
    }

    #[test]
    fn days_are_local_to_the_given_timezone() {
        // 23:30 UTC on the 9th is already the 10th in UTC+2.
        let history = vec![CompletedSession {
            session_id: SessionId::from("late"),
            started_at: Utc.with_ymd_and_hms(2026, 3, 9, 23, 30, 0).unwrap(),
            ended_at: Utc.with_ymd_and_hms(2026, 3, 10, 0, 30, 0).unwrap(),
            duration_seconds: 3600,
        }];
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(compute_focus_streak(&history, &now), 1);
        assert_eq!(compute_focus_streak(&history, &now.with_timezone(&Utc)), 0);
    }

    #[test]
    fn longest_streak_spans_history() {
        let history = vec![
            session_on(1, 9),
            session_on(2, 9),
            session_on(3, 9),
            session_on(3, 15),
            session_on(5, 9),
        ];
        assert_eq!(longest_focus_streak(&history, &Utc), 3);
        assert_eq!(longest_focus_streak(&[], &Utc), 0);
    }
}
