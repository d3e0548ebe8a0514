use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ShieldEvent, ShieldEventKind, ShieldSubscription};
use crate::telemetry::{emit, TelemetryEvent, TelemetrySink};

/// How many raw events the log keeps for timestamp queries.
const RECENT_EVENT_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldEventCounts {
    pub attempts: u64,
    pub bypasses: u64,
    pub graces: u64,
}

impl ShieldEventCounts {
    fn add(&mut self, kind: ShieldEventKind) {
        match kind {
            ShieldEventKind::Attempt => self.attempts += 1,
            ShieldEventKind::Bypass => self.bypasses += 1,
            ShieldEventKind::Grace => self.graces += 1,
        }
    }
}

/// Consumes shield events: counts them, keeps a bounded tail, and forwards
/// bypasses to telemetry.
///
/// Events are never tied to "the current session" on arrival; attribution is
/// done later by comparing `at` with a session's interval.
pub struct ShieldEventLog {
    totals: ShieldEventCounts,
    recent: VecDeque<ShieldEvent>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl ShieldEventLog {
    pub fn new(telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            totals: ShieldEventCounts::default(),
            recent: VecDeque::new(),
            telemetry,
        }
    }

    /// Continue counting from totals kept elsewhere.
    pub fn with_totals(mut self, totals: ShieldEventCounts) -> Self {
        self.totals = totals;
        self
    }

    pub fn record(&mut self, event: ShieldEvent) {
        self.totals.add(event.kind);
        if event.kind == ShieldEventKind::Bypass {
            emit(
                self.telemetry.as_ref(),
                TelemetryEvent::ShieldBypass { at: event.at },
            );
        }
        if self.recent.len() == RECENT_EVENT_LIMIT {
            self.recent.pop_front();
        }
        self.recent.push_back(event);
    }

    /// Record everything already buffered on the subscription.
    pub fn drain(&mut self, subscription: &mut ShieldSubscription) -> usize {
        let mut n = 0;
        while let Some(event) = subscription.try_recv() {
            self.record(event);
            n += 1;
        }
        n
    }

    /// Record events until the stream ends, then hand the log back.
    pub async fn run(mut self, mut subscription: ShieldSubscription) -> Self {
        while let Some(event) = subscription.recv().await {
            self.record(event);
        }
        self
    }

    pub fn totals(&self) -> ShieldEventCounts {
        self.totals
    }

    /// Counts of retained events with `from <= at < to`.
    pub fn counts_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> ShieldEventCounts {
        let mut counts = ShieldEventCounts::default();
        self.recent
            .iter()
            .filter(|e| e.at >= from && e.at < to)
            .for_each(|e| counts.add(e.kind));
        counts
    }

    pub fn recent(&self) -> impl Iterator<Item = &ShieldEvent> {
        self.recent.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shield::ShieldEventBus;
    use crate::telemetry::MemoryTelemetry;
    use chrono::{Duration, TimeZone};

    fn at(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap() + Duration::minutes(min)
    }

    #[test]
    fn bypasses_reach_telemetry() {
        let sink = Arc::new(MemoryTelemetry::new());
        let mut log = ShieldEventLog::new(sink.clone());
        log.record(ShieldEvent::new(ShieldEventKind::Attempt, None, at(1)));
        log.record(ShieldEvent::new(ShieldEventKind::Bypass, None, at(2)));

        assert_eq!(log.totals().attempts, 1);
        assert_eq!(log.totals().bypasses, 1);
        assert_eq!(sink.events(), vec![TelemetryEvent::ShieldBypass { at: at(2) }]);
    }

    #[test]
    fn attribution_uses_event_timestamps() {
        let mut log = ShieldEventLog::new(Arc::new(MemoryTelemetry::new()));
        log.record(ShieldEvent::new(ShieldEventKind::Attempt, None, at(-5)));
        log.record(ShieldEvent::new(ShieldEventKind::Attempt, None, at(10)));
        log.record(ShieldEvent::new(ShieldEventKind::Grace, None, at(20)));

        let during = log.counts_between(at(0), at(20));
        assert_eq!(during.attempts, 1);
        assert_eq!(during.graces, 0);
    }

    #[test]
    fn drain_consumes_buffered_events() {
        let bus = ShieldEventBus::new();
        let mut sub = bus.subscribe();
        bus.publish(ShieldEvent::new(ShieldEventKind::Attempt, None, at(0)));
        bus.publish(ShieldEvent::new(ShieldEventKind::Attempt, None, at(1)));

        let mut log = ShieldEventLog::new(Arc::new(MemoryTelemetry::new()));
        assert_eq!(log.drain(&mut sub), 2);
        assert_eq!(log.totals().attempts, 2);
    }

    #[tokio::test]
    async fn run_counts_until_the_bus_closes() {
        let bus = ShieldEventBus::new();
        let sub = bus.subscribe();
        let sink = Arc::new(MemoryTelemetry::new());
        let task = tokio::spawn(ShieldEventLog::new(sink.clone()).run(sub));

        bus.publish(ShieldEvent::new(ShieldEventKind::Attempt, None, at(0)));
        bus.publish(ShieldEvent::new(ShieldEventKind::Bypass, None, at(1)));
        bus.publish(ShieldEvent::new(ShieldEventKind::Grace, None, at(2)));
        drop(bus);

        let log = task.await.unwrap();
        assert_eq!(
            log.totals(),
            ShieldEventCounts {
                attempts: 1,
                bypasses: 1,
                graces: 1,
            }
        );
        assert_eq!(log.recent().count(), 3);
        assert_eq!(sink.events(), vec![TelemetryEvent::ShieldBypass { at: at(1) }]);
    }
}
