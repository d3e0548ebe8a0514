//! Core error types for shiftguard-core.
//!
//! This module defines the error hierarchy using thiserror. Transition
//! errors are expected and returned to the caller; shield failures never
//! surface here as session failures (see [`crate::shield::ShieldUnavailable`]).

use std::path::PathBuf;
use thiserror::Error;

use crate::session::{CompletedSession, SessionAction, SessionStatus};
use crate::shield::ShieldTicket;

/// Core error type for shiftguard-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Session state machine errors
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Credential store errors
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Clock-in refused by the work-location gate
    #[error("Geofence error: {0}")]
    Geofence(#[from] GeofenceError),

    /// Shield errors raised by direct (user-driven) adapter calls
    #[error("Shield error: {0}")]
    Shield(#[from] ShieldError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Errors returned by [`crate::session::SessionStore`] transitions.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The requested transition is not legal from the current state.
    ///
    /// Rapid double-taps land here; callers treat it as an expected outcome.
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        from: SessionStatus,
        action: SessionAction,
    },

    /// The session was closed but its record could not be appended to history.
    ///
    /// The record stays queued in the store until
    /// [`crate::session::SessionStore::retry_pending`] succeeds. The disarm
    /// queued by the clock-out still reports through `shield`.
    #[error("session {} ended but was not durably recorded: {source}", record.session_id)]
    PersistenceFailure {
        record: CompletedSession,
        #[source]
        source: DatabaseError,
        shield: ShieldTicket,
    },
}

impl SessionError {
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, SessionError::InvalidTransition { .. })
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The data directory could not be created
    #[error("Data directory unavailable: {0}")]
    DataDir(#[source] std::io::Error),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// A record with the same key already exists
    #[error("Record already exists: {0}")]
    Conflict(String),

    /// A stored value could not be decoded
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Errors from a [`crate::credentials::CredentialStore`] backing.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The OS keyring rejected the operation
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// The database-backed store failed
    #[error("Credential database error: {0}")]
    Database(#[from] DatabaseError),

    /// Any other backing failure
    #[error("Credential backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the shield platform capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShieldError {
    /// `start_work_limit` was called before consent was granted
    #[error("shield authorization has not been granted")]
    NotAuthorized,

    /// The platform capability is absent or the call failed
    #[error("shield platform unavailable: {0}")]
    Unavailable(String),

    /// The dispatcher task stopped before the request completed
    #[error("shield dispatcher stopped before the request completed")]
    DispatcherClosed,
}

/// Reasons the work-location gate refuses a clock-in.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeofenceError {
    /// The gate is on but no position was reported
    #[error("a current location is required to clock in")]
    LocationRequired,

    /// The gate is on but no work location is active
    #[error("no active work location is configured")]
    NoActiveLocations,

    /// The position is outside every active fence
    #[error("outside every work location (closest: {closest}, {distance_meters} m away)")]
    Outside { closest: String, distance_meters: f64 },
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end ({end}) must be after start ({start})")]
    InvalidTimeRange { start: String, end: String },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => match inner.code {
                rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy => {
                    DatabaseError::Locked
                }
                rusqlite::ErrorCode::ConstraintViolation => DatabaseError::Conflict(err.to_string()),
                _ => DatabaseError::QueryFailed(err.to_string()),
            },
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::Corrupt(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Custom(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
