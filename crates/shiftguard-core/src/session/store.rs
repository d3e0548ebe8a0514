//! Work-session state machine.
//!
//! The store owns the single open [`WorkSession`] of a device and commits
//! every transition synchronously. Shield calls are queued on the
//! [`ShieldDispatcher`] afterwards and can only produce warnings.
//!
//! ## State Transitions
//!
//! ```text
//! ClockedOut -> ClockedIn -> OnBreak(kind) -> ClockedIn -> ClockedOut
//!                   \___________________________________/
//!                        clock_out from either state
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = SessionStore::new(Box::new(db), dispatcher, telemetry);
//! store.restore()?;
//! let clock_in = store.clock_in()?;
//! if let Some(warning) = clock_in.shield.outcome().await { /* show it */ }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;

use super::model::{
    BreakInterval, BreakKind, CompletedSession, SessionAction, SessionId, SessionStatus,
    WorkSession,
};
use super::repository::SessionRepository;
use crate::clock::{Clock, SystemClock};
use crate::error::{DatabaseError, SessionError};
use crate::events::Event;
use crate::shield::{ShieldDispatcher, ShieldTicket, WorkSchedule};
use crate::telemetry::{emit, TelemetryEvent, TelemetrySink};

/// Result of a transition that also issued a shield request.
#[derive(Debug)]
pub struct Transition {
    pub event: Event,
    pub shield: ShieldTicket,
}

/// Result of a successful clock-out.
#[derive(Debug)]
pub struct ClockOut {
    /// The closed session, breaks included.
    pub session: WorkSession,
    /// The record appended to history.
    pub record: CompletedSession,
    pub event: Event,
    pub shield: ShieldTicket,
}

#[derive(Debug, Clone)]
struct PendingRecord {
    record: CompletedSession,
    breaks: Vec<BreakInterval>,
}

/// Explicit service object for the session lifecycle.
///
/// Construct once at startup and pass by reference; all transitions take
/// `&mut self`, so there is exactly one writer.
pub struct SessionStore {
    repo: Box<dyn SessionRepository>,
    shield: ShieldDispatcher,
    telemetry: Arc<dyn TelemetrySink>,
    clock: Arc<dyn Clock>,
    schedule: WorkSchedule,
    current: Option<WorkSession>,
    /// Latest timestamp handed out; keeps intervals ordered if the wall clock steps back.
    last_event_at: Option<DateTime<Utc>>,
    /// Closed sessions whose append failed.
    pending: Vec<PendingRecord>,
    active_tx: watch::Sender<Option<SessionId>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("status", &self.status())
            .field("current", &self.current)
            .field("pending", &self.pending.len())
            .field("shield", &self.shield)
            .finish()
    }
}

impl SessionStore {
    /// Create a store in the `ClockedOut` state. Call [`SessionStore::restore`]
    /// to pick up a session left open by a previous process.
    pub fn new(
        repo: Box<dyn SessionRepository>,
        shield: ShieldDispatcher,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        let (active_tx, _rx) = watch::channel(None);
        Self {
            repo,
            shield,
            telemetry,
            clock: Arc::new(SystemClock),
            schedule: WorkSchedule::default(),
            current: None,
            last_event_at: None,
            pending: Vec::new(),
            active_tx,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Schedule passed to the shield on every clock-in.
    pub fn with_schedule(mut self, schedule: WorkSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> SessionStatus {
        self.current
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(SessionStatus::ClockedOut)
    }

    pub fn current_session(&self) -> Option<&WorkSession> {
        self.current.as_ref()
    }

    pub fn active_session_id(&self) -> Option<&SessionId> {
        self.current.as_ref().map(|s| &s.id)
    }

    /// Receiver that always holds the id of the open session, if any.
    pub fn watch_active_session(&self) -> watch::Receiver<Option<SessionId>> {
        self.active_tx.subscribe()
    }

    pub fn pending_records(&self) -> Vec<CompletedSession> {
        self.pending.iter().map(|p| p.record.clone()).collect()
    }

    pub fn repository(&self) -> &dyn SessionRepository {
        self.repo.as_ref()
    }

    pub fn shield(&self) -> &ShieldDispatcher {
        &self.shield
    }

    pub fn schedule(&self) -> &WorkSchedule {
        &self.schedule
    }

    pub fn history(&self) -> Result<Vec<CompletedSession>, DatabaseError> {
        self.repo.completed_all()
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        let now = self.clock.now().max(self.last_event_at.unwrap_or(DateTime::<Utc>::MIN_UTC));
        let session = self.current.as_ref();
        Event::StateSnapshot {
            status: self.status(),
            session_id: session.map(|s| s.id.clone()),
            started_at: session.map(|s| s.started_at),
            elapsed_secs: session.map(|s| s.elapsed_seconds(now)).unwrap_or(0),
            break_secs: session.map(|s| s.break_seconds(now)).unwrap_or(0),
            break_count: session.map(|s| s.breaks.len()).unwrap_or(0),
            pending_records: self.pending.len(),
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Open a new session and queue a shield arm.
    ///
    /// The session counts as started whatever the shield reports.
    pub fn clock_in(&mut self) -> Result<Transition, SessionError> {
        self.require(SessionAction::ClockIn, |s| s == SessionStatus::ClockedOut)?;

        let now = self.tick();
        let session = WorkSession::open(SessionId::generate(), now);
        let session_id = session.id.clone();
        self.current = Some(session);
        self.save_snapshot();
        self.active_tx.send_replace(Some(session_id.clone()));
        tracing::info!(session_id = %session_id, "clocked in");

        emit(
            self.telemetry.as_ref(),
            TelemetryEvent::SessionStarted {
                session_id: session_id.clone(),
                started_at: now,
            },
        );
        let shield = self.shield.arm(self.schedule.clone());

        Ok(Transition {
            event: Event::ClockedIn {
                session_id,
                at: now,
            },
            shield,
        })
    }

    pub fn start_break(&mut self, kind: BreakKind) -> Result<Event, SessionError> {
        self.require(SessionAction::StartBreak, |s| s == SessionStatus::ClockedIn)?;

        let now = self.tick();
        let session = self.open_session_mut(SessionAction::StartBreak)?;
        session.begin_break(kind, now);
        let session_id = session.id.clone();
        self.save_snapshot();
        tracing::info!(session_id = %session_id, kind = %kind, "break started");

        Ok(Event::BreakStarted {
            session_id,
            kind,
            at: now,
        })
    }

    pub fn end_break(&mut self) -> Result<Event, SessionError> {
        self.require(SessionAction::EndBreak, |s| {
            matches!(s, SessionStatus::OnBreak(_))
        })?;

        let now = self.tick();
        let session = self.open_session_mut(SessionAction::EndBreak)?;
        let closed = session
            .finish_break(now)
            .ok_or(SessionError::InvalidTransition {
                from: SessionStatus::ClockedIn,
                action: SessionAction::EndBreak,
            })?;
        let session_id = session.id.clone();
        self.save_snapshot();
        tracing::info!(session_id = %session_id, kind = %closed.kind, "break ended");

        Ok(Event::BreakEnded {
            session_id,
            kind: closed.kind,
            duration_secs: closed.duration_seconds(now),
            at: now,
        })
    }

    /// Close the open session (and any open break), append it to history and
    /// queue a shield disarm.
    ///
    /// On [`SessionError::PersistenceFailure`] the session is still closed and
    /// the disarm still queued; the error carries its ticket and the record
    /// waits in [`SessionStore::pending_records`].
    pub fn clock_out(&mut self) -> Result<ClockOut, SessionError> {
        self.require(SessionAction::ClockOut, |s| s != SessionStatus::ClockedOut)?;

        let now = self.tick();
        let mut session = self
            .current
            .take()
            .ok_or(SessionError::InvalidTransition {
                from: SessionStatus::ClockedOut,
                action: SessionAction::ClockOut,
            })?;
        let record = session.close(now);
        self.active_tx.send_replace(None);
        self.save_snapshot();
        let shield = self.shield.disarm();

        tracing::info!(
            session_id = %record.session_id,
            duration_seconds = record.duration_seconds,
            breaks = session.breaks.len(),
            "clocked out"
        );
        emit(
            self.telemetry.as_ref(),
            TelemetryEvent::SessionEnded {
                session_id: record.session_id.clone(),
                ended_at: record.ended_at,
                duration_seconds: record.duration_seconds,
            },
        );

        if let Err(source) = self.repo.append_completed(&record, &session.breaks) {
            tracing::error!(
                session_id = %record.session_id,
                "failed to record completed session: {}",
                source
            );
            self.pending.push(PendingRecord {
                record: record.clone(),
                breaks: session.breaks.clone(),
            });
            return Err(SessionError::PersistenceFailure {
                record,
                source,
                shield,
            });
        }

        let event = Event::ClockedOut {
            session_id: record.session_id.clone(),
            duration_seconds: record.duration_seconds,
            break_count: session.breaks.len(),
            at: now,
        };
        Ok(ClockOut {
            session,
            record,
            event,
            shield,
        })
    }

    /// Forward a bypass request to the shield while a session is open.
    pub fn request_bypass(&mut self) -> Result<Transition, SessionError> {
        self.require(SessionAction::RequestBypass, |s| {
            s != SessionStatus::ClockedOut
        })?;
        let now = self.tick();
        let session_id = self
            .active_session_id()
            .cloned()
            .ok_or(SessionError::InvalidTransition {
                from: SessionStatus::ClockedOut,
                action: SessionAction::RequestBypass,
            })?;
        tracing::info!(session_id = %session_id, "bypass requested");
        Ok(Transition {
            event: Event::BypassRequested {
                session_id,
                at: now,
            },
            shield: self.shield.bypass(),
        })
    }

    /// Re-append records whose first append failed. Returns how many were
    /// written; stops at the first failure.
    pub fn retry_pending(&mut self) -> Result<usize, DatabaseError> {
        let mut written = 0;
        while let Some(pending) = self.pending.first() {
            match self.repo.append_completed(&pending.record, &pending.breaks) {
                Ok(()) => written += 1,
                // An earlier attempt landed after all.
                Err(DatabaseError::Conflict(_)) => {}
                Err(e) => return Err(e),
            }
            self.pending.remove(0);
        }
        Ok(written)
    }

    /// Pick up a session left open by a previous process.
    pub fn restore(&mut self) -> Result<Option<&WorkSession>, DatabaseError> {
        if self.current.is_some() {
            return Ok(self.current.as_ref());
        }
        let Some(mut session) = self.repo.load_open_session()? else {
            return Ok(None);
        };
        if !session.is_open() || self.already_recorded(&session)? {
            tracing::warn!(session_id = %session.id, "discarding stale open-session snapshot");
            self.repo.save_open_session(None)?;
            return Ok(None);
        }

        session.status = match session.open_break() {
            Some(open) => SessionStatus::OnBreak(open.kind),
            None => SessionStatus::ClockedIn,
        };
        self.last_event_at = latest_timestamp(&session);
        self.active_tx.send_replace(Some(session.id.clone()));
        tracing::info!(session_id = %session.id, status = %session.status, "restored open session");
        self.current = Some(session);
        Ok(self.current.as_ref())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn require(
        &self,
        action: SessionAction,
        allowed: impl FnOnce(SessionStatus) -> bool,
    ) -> Result<(), SessionError> {
        let from = self.status();
        if allowed(from) {
            Ok(())
        } else {
            tracing::debug!(%from, %action, "rejected transition");
            Err(SessionError::InvalidTransition { from, action })
        }
    }

    fn open_session_mut(&mut self, action: SessionAction) -> Result<&mut WorkSession, SessionError> {
        self.current
            .as_mut()
            .ok_or(SessionError::InvalidTransition {
                from: SessionStatus::ClockedOut,
                action,
            })
    }

    fn tick(&mut self) -> DateTime<Utc> {
        let now = self.clock.now();
        let now = match self.last_event_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_event_at = Some(now);
        now
    }

    fn save_snapshot(&self) {
        if let Err(e) = self.repo.save_open_session(self.current.as_ref()) {
            tracing::warn!("failed to persist open-session snapshot: {}", e);
        }
    }

    fn already_recorded(&self, session: &WorkSession) -> Result<bool, DatabaseError> {
        let window_end = session.started_at + Duration::seconds(1);
        Ok(self
            .repo
            .completed_between(session.started_at, window_end)?
            .iter()
            .any(|r| r.session_id == session.id))
    }
}

fn latest_timestamp(session: &WorkSession) -> Option<DateTime<Utc>> {
    session
        .breaks
        .iter()
        .flat_map(|b| [Some(b.started_at), b.ended_at])
        .flatten()
        .chain([session.started_at])
        .max()
}
