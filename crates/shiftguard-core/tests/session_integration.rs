//! End-to-end session flows against SQLite and the in-process shield.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use shiftguard_core::error::ShieldError;
use shiftguard_core::metrics::FocusReport;
use shiftguard_core::session::{BreakKind, SessionRepository, SessionStatus, SessionStore};
use shiftguard_core::shield::{
    LocalShield, ShieldAdapter, ShieldDispatcher, ShieldEventKind, ShieldEventLog,
    ShieldOperation, WorkSchedule,
};
use shiftguard_core::telemetry::{MemoryTelemetry, TelemetryEvent};
use shiftguard_core::usage::UsageTracker;
use shiftguard_core::{Database, ManualClock, SessionError};

fn start() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn authorized_shield() -> Arc<LocalShield> {
    let shield = Arc::new(LocalShield::new(true));
    shield.request_authorization().unwrap();
    shield
}

#[tokio::test]
async fn workday_with_shield_and_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shiftguard.db");
    let shield = authorized_shield();
    let dispatcher = ShieldDispatcher::spawn(shield.clone()).unwrap();
    let telemetry = Arc::new(MemoryTelemetry::new());
    let clock = ManualClock::new(start());

    let mut store = SessionStore::new(
        Box::new(Database::open_at(&path).unwrap()),
        dispatcher,
        telemetry.clone(),
    )
    .with_clock(Arc::new(clock.clone()))
    .with_schedule(WorkSchedule::default());

    let clock_in = store.clock_in().unwrap();
    assert!(clock_in.shield.outcome().await.is_none());
    assert!(shield.is_armed());

    clock.advance(Duration::minutes(5));
    store.start_break(BreakKind::Coffee).unwrap();
    clock.advance(Duration::minutes(10));
    store.end_break().unwrap();
    clock.advance(Duration::minutes(5));
    let out = store.clock_out().unwrap();
    assert!(out.shield.outcome().await.is_none());
    assert!(!shield.is_armed());
    assert_eq!(shield.history(), [ShieldOperation::Arm, ShieldOperation::Disarm]);

    // A fresh connection sees the same history.
    let db = Database::open_at(&path).unwrap();
    let history = db.completed_all().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].duration_seconds, 1200);
    let breaks = db.breaks_for(&history[0].session_id).unwrap();
    assert_eq!(breaks.len(), 1);
    assert_eq!(breaks[0].started_at, start() + Duration::minutes(5));
    assert_eq!(breaks[0].ended_at, Some(start() + Duration::minutes(15)));

    let report = FocusReport::compute(&history, &(start() + Duration::hours(8)));
    assert_eq!(report.streak, 1);
    assert_eq!(report.weekly.minutes.last(), Some(&20));

    let names: Vec<_> = telemetry.events().iter().map(|e| e.name()).collect();
    assert_eq!(names, ["session_started", "session_ended"]);
}

#[tokio::test]
async fn missing_consent_warns_but_session_starts() {
    let shield = Arc::new(LocalShield::new(true).denying_consent());
    let dispatcher = ShieldDispatcher::spawn(shield.clone()).unwrap();
    let mut store = SessionStore::new(
        Box::new(Database::open_memory().unwrap()),
        dispatcher,
        Arc::new(MemoryTelemetry::new()),
    );

    let clock_in = store.clock_in().unwrap();
    let warning = clock_in.shield.outcome().await.unwrap();
    assert_eq!(warning.operation, ShieldOperation::Arm);
    assert_eq!(warning.reason, ShieldError::NotAuthorized);
    assert_eq!(store.status(), SessionStatus::ClockedIn);

    // Disarm without a prior arm is still fine.
    let out = store.clock_out().unwrap();
    assert!(out.shield.outcome().await.is_none());
}

#[tokio::test]
async fn disarm_issued_while_arm_pending_runs_after_it() {
    let shield = authorized_shield();
    let dispatcher = ShieldDispatcher::spawn(shield.clone()).unwrap();
    let mut store = SessionStore::new(
        Box::new(Database::open_memory().unwrap()),
        dispatcher,
        Arc::new(MemoryTelemetry::new()),
    );

    // Neither ticket is awaited before the next transition.
    let arm = store.clock_in().unwrap().shield;
    let disarm = store.clock_out().unwrap().shield;
    assert!(disarm.outcome().await.is_none());
    assert!(arm.outcome().await.is_none());

    assert_eq!(shield.history(), [ShieldOperation::Arm, ShieldOperation::Disarm]);
    assert!(!shield.is_armed());
}

#[tokio::test]
async fn bypass_reaches_event_log_and_telemetry() {
    let shield = authorized_shield();
    let telemetry = Arc::new(MemoryTelemetry::new());
    let mut events = shield.subscribe();
    let dispatcher = ShieldDispatcher::spawn(shield.clone()).unwrap();
    let mut store = SessionStore::new(
        Box::new(Database::open_memory().unwrap()),
        dispatcher,
        telemetry.clone(),
    );

    store.clock_in().unwrap().shield.outcome().await;
    shield.simulate_attempt(Some("com.video.app".into()));
    assert!(store.request_bypass().unwrap().shield.outcome().await.is_none());

    let mut log = ShieldEventLog::new(telemetry.clone());
    assert_eq!(log.drain(&mut events), 2);
    assert_eq!(log.totals().attempts, 1);
    assert_eq!(log.totals().bypasses, 1);
    assert!(telemetry
        .events()
        .iter()
        .any(|e| matches!(e, TelemetryEvent::ShieldBypass { .. })));

    let kinds: Vec<_> = log.recent().map(|e| e.kind).collect();
    assert_eq!(kinds, [ShieldEventKind::Attempt, ShieldEventKind::Bypass]);
}

#[test]
fn open_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shiftguard.db");
    let clock = ManualClock::new(start());

    let session_id = {
        let mut store = SessionStore::new(
            Box::new(Database::open_at(&path).unwrap()),
            ShieldDispatcher::disabled(),
            Arc::new(MemoryTelemetry::new()),
        )
        .with_clock(Arc::new(clock.clone()));
        store.clock_in().unwrap();
        clock.advance(Duration::minutes(45));
        store.start_break(BreakKind::Lunch).unwrap();
        store.active_session_id().cloned().unwrap()
    };

    clock.advance(Duration::minutes(30));
    let mut store = SessionStore::new(
        Box::new(Database::open_at(&path).unwrap()),
        ShieldDispatcher::disabled(),
        Arc::new(MemoryTelemetry::new()),
    )
    .with_clock(Arc::new(clock.clone()));
    store.restore().unwrap();
    assert_eq!(store.active_session_id(), Some(&session_id));
    assert_eq!(store.status(), SessionStatus::OnBreak(BreakKind::Lunch));

    // A second clock-in is still refused after the restart.
    assert!(matches!(
        store.clock_in(),
        Err(SessionError::InvalidTransition { .. })
    ));

    store.end_break().unwrap();
    let out = store.clock_out().unwrap();
    assert_eq!(out.record.duration_seconds, 75 * 60);
    assert_eq!(out.session.breaks[0].duration_seconds(out.record.ended_at), 30 * 60);
}

#[test]
fn usage_is_attributed_through_the_active_session_channel() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shiftguard.db");
    let mut store = SessionStore::new(
        Box::new(Database::open_at(&path).unwrap()),
        ShieldDispatcher::disabled(),
        Arc::new(MemoryTelemetry::new()),
    );
    let tracker = UsageTracker::new(
        Box::new(Database::open_at(&path).unwrap()),
        store.watch_active_session(),
    );

    assert!(!tracker.record("slack", 60).unwrap());
    store.clock_in().unwrap();
    let id = store.active_session_id().cloned().unwrap();
    assert!(tracker.record("slack", 60).unwrap());
    assert!(tracker.record("news", 30).unwrap());
    store.clock_out().unwrap();
    assert!(!tracker.record("slack", 60).unwrap());

    let totals = tracker.totals_for(&id).unwrap();
    assert_eq!(totals.len(), 2);
    assert_eq!(totals[0].app_identifier, "slack");
}
