//! Work sessions: the clock-in/break/clock-out lifecycle and its history.

mod model;
mod repository;
mod store;

pub use model::{
    Activity, BreakInterval, BreakKind, CompletedSession, SessionAction, SessionId,
    SessionStatus, WorkSession,
};
pub use repository::{MemoryRepository, SessionRepository};
pub use store::{ClockOut, SessionStore, Transition};
