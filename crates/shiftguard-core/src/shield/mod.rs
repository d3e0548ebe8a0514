//! App-restriction ("shield") integration.
//!
//! The platform capability is reached only through [`ShieldAdapter`]. Session
//! transitions never call it directly: they queue requests on a
//! [`ShieldDispatcher`], so a slow or failing shield cannot block or roll back
//! a committed transition.

mod dispatcher;
mod events;
mod local;
mod log;
mod schedule;

use std::collections::BTreeSet;

pub use dispatcher::{ShieldDispatcher, ShieldOperation, ShieldTicket, ShieldUnavailable};
pub use events::{
    ShieldEvent, ShieldEventBus, ShieldEventKind, ShieldSubscription, Unsubscribe,
};
pub use local::{DisabledShield, LocalShield, LocalShieldState};
pub use log::{ShieldEventCounts, ShieldEventLog};
pub use schedule::WorkSchedule;

use crate::error::ShieldError;

/// Opaque app or category token produced by the platform picker.
pub type AppToken = String;

/// Capability interface over an OS-level app-restriction mechanism.
///
/// Implementations are stateless from the caller's point of view; whatever
/// consent or selection the platform keeps lives behind the adapter.
pub trait ShieldAdapter: Send + Sync {
    /// Environment/config gate. When false every other call is a no-op
    /// (the dispatcher short-circuits them).
    fn is_enabled(&self) -> bool;

    /// One-time user consent; must succeed before `start_work_limit`.
    fn request_authorization(&self) -> Result<bool, ShieldError>;

    /// User-driven selection of apps/categories to restrict.
    fn pick_applications_and_categories(&self) -> Result<BTreeSet<AppToken>, ShieldError>;

    /// Arm the restriction for the given weekly window.
    fn start_work_limit(&self, schedule: &WorkSchedule) -> Result<(), ShieldError>;

    /// Disarm. Safe to call when never armed.
    fn stop_work_limit(&self) -> Result<(), ShieldError>;

    /// Ask the platform to let the worker through the shield once.
    fn request_bypass(&self) -> Result<(), ShieldError> {
        Err(ShieldError::Unavailable("bypass not supported".into()))
    }

    /// Attempt/bypass event stream.
    fn subscribe(&self) -> ShieldSubscription;
}
