//! Per-app foreground time, attributed to the open work session.
//!
//! The tracker never asks the session store directly; it reads the active
//! session id from the store's `watch` channel. Samples arriving while no
//! session is open are dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::clock::{Clock, SystemClock};
use crate::error::DatabaseError;
use crate::session::SessionId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUsageSample {
    pub session_id: SessionId,
    pub app_identifier: String,
    pub foreground_seconds: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Summed foreground time of one app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUsageTotal {
    pub app_identifier: String,
    pub foreground_seconds: u64,
}

pub trait UsageRepository: Send {
    fn append_usage(&self, sample: &AppUsageSample) -> Result<(), DatabaseError>;

    /// Per-app totals of one session, largest first.
    fn usage_for_session(&self, session_id: &SessionId) -> Result<Vec<AppUsageTotal>, DatabaseError>;

    /// Per-app totals of samples recorded in `[from, to)`, largest first.
    fn usage_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AppUsageTotal>, DatabaseError>;
}

/// Sum samples per app, largest total first; ties sorted by name.
pub fn sum_by_app<'a>(samples: impl IntoIterator<Item = &'a AppUsageSample>) -> Vec<AppUsageTotal> {
    let mut sums: HashMap<&str, u64> = HashMap::new();
    for sample in samples {
        *sums.entry(sample.app_identifier.as_str()).or_insert(0) += sample.foreground_seconds;
    }
    let mut totals: Vec<AppUsageTotal> = sums
        .into_iter()
        .map(|(app, secs)| AppUsageTotal {
            app_identifier: app.to_string(),
            foreground_seconds: secs,
        })
        .collect();
    sort_totals(&mut totals);
    totals
}

pub(crate) fn sort_totals(totals: &mut [AppUsageTotal]) {
    totals.sort_by(|a, b| {
        b.foreground_seconds
            .cmp(&a.foreground_seconds)
            .then_with(|| a.app_identifier.cmp(&b.app_identifier))
    });
}

/// In-process [`UsageRepository`].
#[derive(Debug, Default)]
pub struct MemoryUsageRepository {
    samples: Mutex<Vec<AppUsageSample>>,
}

impl MemoryUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<AppUsageSample> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AppUsageSample>> {
        self.samples.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl UsageRepository for MemoryUsageRepository {
    fn append_usage(&self, sample: &AppUsageSample) -> Result<(), DatabaseError> {
        self.lock().push(sample.clone());
        Ok(())
    }

    fn usage_for_session(&self, session_id: &SessionId) -> Result<Vec<AppUsageTotal>, DatabaseError> {
        let samples = self.lock();
        Ok(sum_by_app(samples.iter().filter(|s| &s.session_id == session_id)))
    }

    fn usage_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AppUsageTotal>, DatabaseError> {
        let samples = self.lock();
        Ok(sum_by_app(
            samples
                .iter()
                .filter(|s| s.recorded_at >= from && s.recorded_at < to),
        ))
    }
}

impl<R: UsageRepository + Sync + ?Sized> UsageRepository for Arc<R> {
    fn append_usage(&self, sample: &AppUsageSample) -> Result<(), DatabaseError> {
        (**self).append_usage(sample)
    }

    fn usage_for_session(&self, session_id: &SessionId) -> Result<Vec<AppUsageTotal>, DatabaseError> {
        (**self).usage_for_session(session_id)
    }

    fn usage_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AppUsageTotal>, DatabaseError> {
        (**self).usage_between(from, to)
    }
}

/// Records foreground samples against whichever session is open.
pub struct UsageTracker {
    repo: Box<dyn UsageRepository>,
    active: watch::Receiver<Option<SessionId>>,
    clock: Arc<dyn Clock>,
}

impl UsageTracker {
    pub fn new(repo: Box<dyn UsageRepository>, active: watch::Receiver<Option<SessionId>>) -> Self {
        Self {
            repo,
            active,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.active.borrow().clone()
    }

    /// Attribute `seconds` of foreground time in `app` to the open session.
    ///
    /// Returns `Ok(false)` when the sample was dropped: no open session, an
    /// empty app identifier, or zero seconds.
    pub fn record(&self, app_identifier: &str, seconds: u64) -> Result<bool, DatabaseError> {
        let app_identifier = app_identifier.trim();
        let Some(session_id) = self.active_session() else {
            tracing::debug!(app = app_identifier, seconds, "usage sample outside a session dropped");
            return Ok(false);
        };
        if app_identifier.is_empty() || seconds == 0 {
            tracing::debug!(app = app_identifier, seconds, "empty usage sample dropped");
            return Ok(false);
        }

        self.repo.append_usage(&AppUsageSample {
            session_id,
            app_identifier: app_identifier.to_string(),
            foreground_seconds: seconds,
            recorded_at: self.clock.now(),
        })?;
        Ok(true)
    }

    pub fn totals_for(&self, session_id: &SessionId) -> Result<Vec<AppUsageTotal>, DatabaseError> {
        self.repo.usage_for_session(session_id)
    }

    /// Totals for the open session; empty when clocked out.
    pub fn current_totals(&self) -> Result<Vec<AppUsageTotal>, DatabaseError> {
        match self.active_session() {
            Some(id) => self.repo.usage_for_session(&id),
            None => Ok(Vec::new()),
        }
    }

    pub fn totals_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AppUsageTotal>, DatabaseError> {
        self.repo.usage_between(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(
        repo: Arc<MemoryUsageRepository>,
    ) -> (UsageTracker, watch::Sender<Option<SessionId>>) {
        let (tx, rx) = watch::channel(None);
        (UsageTracker::new(Box::new(repo), rx), tx)
    }

    #[test]
    fn samples_outside_a_session_are_dropped() {
        let repo = Arc::new(MemoryUsageRepository::new());
        let (tracker, _tx) = tracker(repo.clone());
        assert!(!tracker.record("slack", 60).unwrap());
        assert!(repo.samples().is_empty());
    }

    #[test]
    fn samples_follow_the_active_session() {
        let repo = Arc::new(MemoryUsageRepository::new());
        let (tracker, tx) = tracker(repo.clone());

        tx.send_replace(Some(SessionId::from("s1")));
        assert!(tracker.record("slack", 60).unwrap());
        assert!(tracker.record("slack", 30).unwrap());
        assert!(tracker.record("youtube", 120).unwrap());
        assert!(!tracker.record("  ", 10).unwrap());
        assert!(!tracker.record("mail", 0).unwrap());

        tx.send_replace(Some(SessionId::from("s2")));
        assert!(tracker.record("mail", 15).unwrap());

        let s1 = tracker.totals_for(&SessionId::from("s1")).unwrap();
        assert_eq!(
            s1,
            vec![
                AppUsageTotal { app_identifier: "youtube".into(), foreground_seconds: 120 },
                AppUsageTotal { app_identifier: "slack".into(), foreground_seconds: 90 },
            ]
        );
        assert_eq!(tracker.current_totals().unwrap().len(), 1);

        tx.send_replace(None);
        assert!(tracker.current_totals().unwrap().is_empty());
    }

    #[test]
    fn ties_sort_by_name() {
        let at = Utc::now();
        let samples: Vec<AppUsageSample> = ["b", "a"]
            .iter()
            .map(|app| AppUsageSample {
                session_id: SessionId::from("s"),
                app_identifier: app.to_string(),
                foreground_seconds: 10,
                recorded_at: at,
            })
            .collect();
        let totals = sum_by_app(&samples);
        assert_eq!(totals[0].app_identifier, "a");
    }
}
