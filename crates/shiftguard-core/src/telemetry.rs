//! Fire-and-forget telemetry boundary.
//!
//! The core emits three events. Transport is someone else's problem; a sink
//! that fails is logged and otherwise ignored.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    SessionStarted {
        session_id: SessionId,
        started_at: DateTime<Utc>,
    },
    SessionEnded {
        session_id: SessionId,
        ended_at: DateTime<Utc>,
        duration_seconds: u64,
    },
    ShieldBypass {
        at: DateTime<Utc>,
    },
}

impl TelemetryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::SessionStarted { .. } => "session_started",
            TelemetryEvent::SessionEnded { .. } => "session_ended",
            TelemetryEvent::ShieldBypass { .. } => "shield_bypass",
        }
    }
}

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("telemetry sink unavailable: {0}")]
    Unavailable(String),
}

pub trait TelemetrySink: Send + Sync {
    fn capture(&self, event: &TelemetryEvent) -> Result<(), TelemetryError>;
}

/// Hand an event to the sink; a failure never reaches the caller.
pub fn emit(sink: &dyn TelemetrySink, event: TelemetryEvent) {
    if let Err(e) = sink.capture(&event) {
        tracing::warn!(event = event.name(), "telemetry delivery failed: {}", e);
    }
}

/// Drops everything. Used when telemetry is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn capture(&self, _event: &TelemetryEvent) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Writes events to the `tracing` pipeline as breadcrumbs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn capture(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        let data = serde_json::to_string(event)
            .map_err(|e| TelemetryError::Unavailable(e.to_string()))?;
        tracing::info!(target: "shiftguard::telemetry", event = event.name(), %data);
        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl TelemetrySink for MemoryTelemetry {
    fn capture(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenSink;

    impl TelemetrySink for BrokenSink {
        fn capture(&self, _event: &TelemetryEvent) -> Result<(), TelemetryError> {
            Err(TelemetryError::Unavailable("offline".into()))
        }
    }

    #[test]
    fn emit_swallows_sink_failures() {
        emit(&BrokenSink, TelemetryEvent::ShieldBypass { at: Utc::now() });
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = TelemetryEvent::SessionEnded {
            session_id: SessionId::from("sess_1"),
            ended_at: Utc::now(),
            duration_seconds: 60,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session_ended");
        assert_eq!(json["session_id"], "sess_1");
        assert_eq!(json["duration_seconds"], 60);
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemoryTelemetry::new();
        emit(&sink, TelemetryEvent::ShieldBypass { at: Utc::now() });
        emit(
            &sink,
            TelemetryEvent::SessionStarted {
                session_id: SessionId::from("s"),
                started_at: Utc::now(),
            },
        );
        let names: Vec<_> = sink.events().iter().map(|e| e.name()).collect();
        assert_eq!(names, ["shield_bypass", "session_started"]);
    }
}
