//! Metrics computed from a persisted history.

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use shiftguard_core::metrics::{
    compute_focus_metrics, compute_focus_streak, compute_weekly_totals, AppClassifier,
    FocusReport,
};
use shiftguard_core::session::{
    BreakInterval, BreakKind, CompletedSession, SessionId, SessionRepository,
};
use shiftguard_core::usage::{AppUsageSample, UsageRepository};
use shiftguard_core::Database;

fn record(id: &str, started_at: DateTime<Utc>, minutes: i64) -> CompletedSession {
    CompletedSession {
        session_id: SessionId::from(id),
        started_at,
        ended_at: started_at + Duration::minutes(minutes),
        duration_seconds: (minutes * 60) as u64,
    }
}

fn seeded() -> Database {
    let db = Database::open_memory().unwrap();
    let day = |d: u32, h: u32| Utc.with_ymd_and_hms(2026, 3, d, h, 0, 0).unwrap();
    // Sessions on 10, 9, 8, a gap on 7, then 6.
    db.append_completed(&record("s6", day(6, 9), 60), &[]).unwrap();
    db.append_completed(&record("s8", day(8, 9), 90), &[]).unwrap();
    db.append_completed(&record("s9a", day(9, 9), 30), &[]).unwrap();
    db.append_completed(&record("s9b", day(9, 14), 45), &[]).unwrap();
    db.append_completed(
        &record("s10", day(10, 9), 120),
        &[BreakInterval {
            kind: BreakKind::Lunch,
            started_at: day(10, 10),
            ended_at: Some(day(10, 10) + Duration::minutes(30)),
        }],
    )
    .unwrap();
    db
}

#[test]
fn streak_counts_back_from_today_until_the_gap() {
    let db = seeded();
    let history = db.completed_all().unwrap();
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 18, 0, 0).unwrap();
    assert_eq!(compute_focus_streak(&history, &now), 3);

    let report = FocusReport::compute(&history, &now);
    assert_eq!(report.streak, 3);
    assert_eq!(report.longest_streak, 3);
    assert_eq!(report.sessions, 5);
}

#[test]
fn weekly_totals_from_database_history() {
    let db = seeded();
    let history = db.completed_all().unwrap();
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 18, 0, 0).unwrap();
    let totals = compute_weekly_totals(&history, &now);

    assert_eq!(totals.labels.len(), 7);
    assert_eq!(totals.minutes, vec![0, 0, 60, 0, 90, 75, 120]);

    let window_start = Utc.with_ymd_and_hms(2026, 3, 4, 0, 0, 0).unwrap();
    let window: Vec<_> = db
        .completed_between(window_start, now)
        .unwrap();
    let window_minutes: u64 = window.iter().map(|s| s.duration_seconds / 60).sum();
    assert!(totals.total_minutes() <= window_minutes);
}

#[test]
fn timezone_moves_sessions_between_days() {
    let history = vec![record(
        "late",
        Utc.with_ymd_and_hms(2026, 3, 9, 22, 30, 0).unwrap(),
        60,
    )];
    let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
    let now = tokyo.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();

    let local = compute_weekly_totals(&history, &now);
    assert_eq!(local.minutes[6], 60);
    let utc = compute_weekly_totals(&history, &now.with_timezone(&Utc));
    assert_eq!(utc.minutes[5], 60);
}

#[test]
fn focus_metrics_from_stored_usage() {
    let db = seeded();
    let history = db.completed_all().unwrap();
    let mut breaks = Vec::new();
    for s in &history {
        breaks.extend(db.breaks_for(&s.session_id).unwrap());
    }

    let at = Utc.with_ymd_and_hms(2026, 3, 10, 9, 30, 0).unwrap();
    for (app, secs) in [("slack", 2400), ("mail", 600), ("video", 1000)] {
        db.append_usage(&AppUsageSample {
            session_id: SessionId::from("s10"),
            app_identifier: app.to_string(),
            foreground_seconds: secs,
            recorded_at: at,
        })
        .unwrap();
    }
    let usage = db.usage_for_session(&SessionId::from("s10")).unwrap();
    let metrics = compute_focus_metrics(
        &history,
        &breaks,
        &usage,
        &AppClassifier::new(["Slack", "Mail"]),
    );

    assert_eq!(metrics.productive_seconds, 3000);
    assert_eq!(metrics.distracted_seconds, 1000);
    assert_eq!(metrics.focus_score, 75);
    assert_eq!(metrics.break_seconds, 30 * 60);
    assert_eq!(metrics.total_work_seconds, (60 + 90 + 30 + 45 + 120) * 60);
}
