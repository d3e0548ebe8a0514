use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{BreakKind, SessionId, SessionStatus};

/// Every session transition produces an Event.
/// The CLI prints them; a UI would render them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ClockedIn {
        session_id: SessionId,
        at: DateTime<Utc>,
    },
    BreakStarted {
        session_id: SessionId,
        kind: BreakKind,
        at: DateTime<Utc>,
    },
    BreakEnded {
        session_id: SessionId,
        kind: BreakKind,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    ClockedOut {
        session_id: SessionId,
        duration_seconds: u64,
        break_count: usize,
        at: DateTime<Utc>,
    },
    /// Bypass was requested while clocked in.
    BypassRequested {
        session_id: SessionId,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        status: SessionStatus,
        session_id: Option<SessionId>,
        started_at: Option<DateTime<Utc>>,
        elapsed_secs: u64,
        break_secs: u64,
        break_count: usize,
        pending_records: usize,
        at: DateTime<Utc>,
    },
}
