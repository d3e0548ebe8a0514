use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Opaque identifier of a work session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(format!("sess_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakKind {
    Lunch,
    Coffee,
    Personal,
}

impl BreakKind {
    pub const ALL: [BreakKind; 3] = [BreakKind::Lunch, BreakKind::Coffee, BreakKind::Personal];

    pub fn as_str(&self) -> &'static str {
        match self {
            BreakKind::Lunch => "lunch",
            BreakKind::Coffee => "coffee",
            BreakKind::Personal => "personal",
        }
    }
}

impl fmt::Display for BreakKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BreakKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lunch" => Ok(BreakKind::Lunch),
            "coffee" => Ok(BreakKind::Coffee),
            "personal" => Ok(BreakKind::Personal),
            other => Err(ValidationError::InvalidValue {
                field: "break kind".into(),
                message: format!("expected lunch, coffee or personal, got '{other}'"),
            }),
        }
    }
}

/// State of the work-session state machine.
///
/// ```text
/// ClockedOut -> ClockedIn -> OnBreak(kind) -> ClockedIn -> ClockedOut
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "kind", rename_all = "snake_case")]
pub enum SessionStatus {
    ClockedOut,
    ClockedIn,
    OnBreak(BreakKind),
}

impl SessionStatus {
    pub fn activity(&self) -> Activity {
        match self {
            SessionStatus::ClockedOut => Activity::NotWorking,
            SessionStatus::ClockedIn => Activity::Working,
            SessionStatus::OnBreak(_) => Activity::OnBreak,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::ClockedOut => f.write_str("clocked out"),
            SessionStatus::ClockedIn => f.write_str("clocked in"),
            SessionStatus::OnBreak(kind) => write!(f, "on a {kind} break"),
        }
    }
}

/// Coarse status shown to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Activity {
    Working,
    OnBreak,
    NotWorking,
}

/// The transitions a caller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    ClockIn,
    StartBreak,
    EndBreak,
    ClockOut,
    RequestBypass,
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionAction::ClockIn => "clock in",
            SessionAction::StartBreak => "start a break",
            SessionAction::EndBreak => "end a break",
            SessionAction::ClockOut => "clock out",
            SessionAction::RequestBypass => "request a bypass",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakInterval {
    pub kind: BreakKind,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl BreakInterval {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Length of the break, measured up to `until` while it is still open.
    pub fn duration_seconds(&self, until: DateTime<Utc>) -> u64 {
        let end = self.ended_at.unwrap_or(until);
        span_seconds(self.started_at, end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSession {
    pub id: SessionId,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    #[serde(default)]
    pub breaks: Vec<BreakInterval>,
}

impl WorkSession {
    pub(crate) fn open(id: SessionId, at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at: at,
            ended_at: None,
            status: SessionStatus::ClockedIn,
            breaks: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn open_break(&self) -> Option<&BreakInterval> {
        self.breaks.last().filter(|b| b.is_open())
    }

    /// Seconds since clock-in, measured up to `until` while the session is open.
    pub fn elapsed_seconds(&self, until: DateTime<Utc>) -> u64 {
        span_seconds(self.started_at, self.ended_at.unwrap_or(until))
    }

    pub fn break_seconds(&self, until: DateTime<Utc>) -> u64 {
        let until = self.ended_at.unwrap_or(until);
        self.breaks.iter().map(|b| b.duration_seconds(until)).sum()
    }

    pub(crate) fn begin_break(&mut self, kind: BreakKind, at: DateTime<Utc>) {
        self.breaks.push(BreakInterval {
            kind,
            started_at: at,
            ended_at: None,
        });
        self.status = SessionStatus::OnBreak(kind);
    }

    /// Closes the open break, if any, and returns it.
    pub(crate) fn finish_break(&mut self, at: DateTime<Utc>) -> Option<BreakInterval> {
        let open = self.breaks.last_mut().filter(|b| b.is_open())?;
        open.ended_at = Some(at);
        self.status = SessionStatus::ClockedIn;
        Some(open.clone())
    }

    /// Ends the session and produces its history record.
    pub(crate) fn close(&mut self, at: DateTime<Utc>) -> CompletedSession {
        self.finish_break(at);
        self.ended_at = Some(at);
        self.status = SessionStatus::ClockedOut;
        CompletedSession {
            session_id: self.id.clone(),
            started_at: self.started_at,
            ended_at: at,
            duration_seconds: span_seconds(self.started_at, at),
        }
    }
}

/// Append-only history record; the only input to derived statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSession {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: u64,
}

fn span_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_seconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap() + Duration::minutes(min)
    }

    #[test]
    fn close_ends_open_break_at_session_end() {
        let mut session = WorkSession::open(SessionId::from("s1"), at(0));
        session.begin_break(BreakKind::Lunch, at(30));
        let record = session.close(at(90));

        assert_eq!(record.duration_seconds, 90 * 60);
        assert_eq!(session.breaks[0].ended_at, Some(at(90)));
        assert_eq!(session.status, SessionStatus::ClockedOut);
        assert!(session.open_break().is_none());
    }

    #[test]
    fn break_seconds_counts_open_break_until_now() {
        let mut session = WorkSession::open(SessionId::from("s1"), at(0));
        session.begin_break(BreakKind::Coffee, at(5));
        session.finish_break(at(15));
        session.begin_break(BreakKind::Personal, at(20));
        assert_eq!(session.break_seconds(at(25)), 15 * 60);
        assert_eq!(session.elapsed_seconds(at(25)), 25 * 60);
    }

    #[test]
    fn finish_break_without_open_break_is_none() {
        let mut session = WorkSession::open(SessionId::from("s1"), at(0));
        assert!(session.finish_break(at(1)).is_none());
        assert_eq!(session.status, SessionStatus::ClockedIn);
    }

    #[test]
    fn break_kind_parses_case_insensitively() {
        assert_eq!("Coffee".parse::<BreakKind>().unwrap(), BreakKind::Coffee);
        assert!("nap".parse::<BreakKind>().is_err());
    }

    #[test]
    fn status_serializes_with_kind() {
        let json = serde_json::to_value(SessionStatus::OnBreak(BreakKind::Lunch)).unwrap();
        assert_eq!(json, serde_json::json!({"state": "on_break", "kind": "lunch"}));
        let json = serde_json::to_value(SessionStatus::ClockedOut).unwrap();
        assert_eq!(json, serde_json::json!({"state": "clocked_out"}));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
        assert!(SessionId::generate().as_str().starts_with("sess_"));
    }
}
