use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{BreakKind, SessionId, WorkSession};

/// End-of-session figures shown after clock-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Wall time from clock-in; breaks included.
    pub elapsed_seconds: u64,
    pub break_seconds: u64,
    /// Elapsed time minus breaks.
    pub worked_seconds: u64,
    pub breaks_by_kind: BTreeMap<BreakKind, u32>,
}

/// Summarize a session. Open sessions and breaks are measured up to `now`.
pub fn summarize_session(session: &WorkSession, now: DateTime<Utc>) -> SessionSummary {
    let elapsed_seconds = session.elapsed_seconds(now);
    let break_seconds = session.break_seconds(now).min(elapsed_seconds);
    let mut breaks_by_kind = BTreeMap::new();
    for b in &session.breaks {
        *breaks_by_kind.entry(b.kind).or_insert(0) += 1;
    }
    SessionSummary {
        session_id: session.id.clone(),
        started_at: session.started_at,
        ended_at: session.ended_at,
        elapsed_seconds,
        break_seconds,
        worked_seconds: elapsed_seconds - break_seconds,
        breaks_by_kind,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationStyle {
    /// `1h 5m` / `5m`
    Short,
    /// `01:05:09` / `05:09`
    #[default]
    Clock,
    /// `1 hour 5 minutes`
    Long,
}

pub fn format_duration(seconds: u64, style: DurationStyle) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds / 60) % 60;
    let secs = seconds % 60;
    match style {
        DurationStyle::Short if hours > 0 => format!("{hours}h {minutes}m"),
        DurationStyle::Short => format!("{minutes}m"),
        DurationStyle::Clock if hours > 0 => format!("{hours:02}:{minutes:02}:{secs:02}"),
        DurationStyle::Clock => format!("{minutes:02}:{secs:02}"),
        DurationStyle::Long if hours > 0 => {
            format!("{} {}", plural(hours, "hour"), plural(minutes, "minute"))
        }
        DurationStyle::Long if minutes > 0 => {
            format!("{} {}", plural(minutes, "minute"), plural(secs, "second"))
        }
        DurationStyle::Long => plural(secs, "second"),
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
