//! Focus metrics engine.
//!
//! Pure functions over the completed-session history. Every function takes
//! the reference instant explicitly; days are calendar days in that
//! instant's timezone. The `*_local` helpers use the machine's timezone.

mod focus;
mod streak;
mod summary;
mod weekly;

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

pub use focus::{compute_focus_metrics, focus_score, AppClassifier, ClassifiedUsage, FocusMetrics};
pub use streak::{active_days, compute_focus_streak, longest_focus_streak};
pub use summary::{format_duration, summarize_session, DurationStyle, SessionSummary};
pub use weekly::{compute_weekly_totals, rounded_minutes, WeeklyTotals, WEEK_DAYS};

use crate::session::CompletedSession;

/// Everything recomputed after a session completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusReport {
    pub streak: u32,
    pub longest_streak: u32,
    pub weekly: WeeklyTotals,
    pub sessions: usize,
}

impl FocusReport {
    pub fn compute<Tz: TimeZone>(history: &[CompletedSession], now: &DateTime<Tz>) -> Self {
        Self {
            streak: compute_focus_streak(history, now),
            longest_streak: longest_focus_streak(history, &now.timezone()),
            weekly: compute_weekly_totals(history, now),
            sessions: history.len(),
        }
    }

    pub fn compute_local(history: &[CompletedSession]) -> Self {
        Self::compute(history, &Local::now())
    }
}

pub fn compute_focus_streak_local(history: &[CompletedSession]) -> u32 {
    compute_focus_streak(history, &Local::now())
}

pub fn compute_weekly_totals_local(history: &[CompletedSession]) -> WeeklyTotals {
    compute_weekly_totals(history, &Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn empty_history_report_is_all_zero() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let report = FocusReport::compute(&[], &now);
        assert_eq!(report.streak, 0);
        assert_eq!(report.longest_streak, 0);
        assert_eq!(report.weekly.minutes.len(), WEEK_DAYS);
        assert_eq!(report.weekly.total_minutes(), 0);
    }
}
