//! # Shiftguard Core Library
//!
//! This library provides the core business logic for Shiftguard, a
//! work-session clock with focus metrics and app restriction. All operations
//! are available through the standalone `shiftguard` CLI, which is a thin
//! driver over this crate.
//!
//! ## Architecture
//!
//! - **Session Store**: The clock-in / break / clock-out state machine.
//!   Transitions commit synchronously; shield requests are queued behind them
//! - **Metrics**: Pure functions over completed-session history (streaks,
//!   weekly totals, focus score)
//! - **Shield**: Capability trait over an app-restriction platform, with a
//!   FIFO dispatcher and an event stream
//! - **Usage**: Per-app foreground time attributed to the open session
//! - **Geofence**: Distance checks against configured work locations
//! - **Storage**: SQLite persistence and TOML configuration
//!
//! ## Key Components
//!
//! - [`SessionStore`]: Work-session state machine
//! - [`Database`]: Session, usage and kv persistence
//! - [`Config`]: Application configuration management
//! - [`ShieldAdapter`]: Trait for the app-restriction platform

pub mod clock;
pub mod credentials;
pub mod error;
pub mod events;
pub mod geofence;
pub mod metrics;
pub mod session;
pub mod shield;
pub mod storage;
pub mod telemetry;
pub mod usage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::{AuthContext, CredentialStore, KeyringCredentialStore, MemoryCredentialStore};
pub use error::{
    ConfigError, CoreError, CredentialError, DatabaseError, GeofenceError, SessionError,
    ShieldError, ValidationError,
};
pub use events::Event;
pub use geofence::{check_geofence_status, GeoPoint, GeofenceStatus, WorkLocation};
pub use metrics::{
    compute_focus_metrics, compute_focus_streak, compute_weekly_totals, summarize_session,
    AppClassifier, FocusMetrics, FocusReport, SessionSummary, WeeklyTotals,
};
pub use session::{
    BreakInterval, BreakKind, CompletedSession, MemoryRepository, SessionId, SessionRepository,
    SessionStatus, SessionStore, WorkSession,
};
pub use shield::{
    LocalShield, ShieldAdapter, ShieldDispatcher, ShieldEvent, ShieldEventKind, ShieldTicket,
    ShieldUnavailable, WorkSchedule,
};
pub use storage::{Config, Database};
pub use telemetry::{TelemetryEvent, TelemetrySink};
pub use usage::{AppUsageSample, AppUsageTotal, UsageRepository, UsageTracker};
