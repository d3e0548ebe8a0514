//! Persistence boundary for session history.
//!
//! [`crate::storage::Database`] is the SQLite implementation; the
//! [`MemoryRepository`] keeps everything in process for tests and previews.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::model::{BreakInterval, CompletedSession, SessionId, WorkSession};
use crate::error::DatabaseError;

/// Append-only store of completed sessions plus the open-session snapshot.
pub trait SessionRepository: Send {
    /// Append a completed session and its breaks. Fails with
    /// [`DatabaseError::Conflict`] if the id was already recorded.
    fn append_completed(
        &self,
        record: &CompletedSession,
        breaks: &[BreakInterval],
    ) -> Result<(), DatabaseError>;

    /// Completed sessions whose `started_at` lies in `[from, to)`, oldest first.
    fn completed_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CompletedSession>, DatabaseError>;

    /// Every completed session, oldest first.
    fn completed_all(&self) -> Result<Vec<CompletedSession>, DatabaseError>;

    fn breaks_for(&self, session_id: &SessionId) -> Result<Vec<BreakInterval>, DatabaseError>;

    /// Persist (or clear, with `None`) the currently open session.
    fn save_open_session(&self, session: Option<&WorkSession>) -> Result<(), DatabaseError>;

    fn load_open_session(&self) -> Result<Option<WorkSession>, DatabaseError>;
}

impl<R: SessionRepository + Sync + ?Sized> SessionRepository for Arc<R> {
    fn append_completed(
        &self,
        record: &CompletedSession,
        breaks: &[BreakInterval],
    ) -> Result<(), DatabaseError> {
        (**self).append_completed(record, breaks)
    }

    fn completed_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CompletedSession>, DatabaseError> {
        (**self).completed_between(from, to)
    }

    fn completed_all(&self) -> Result<Vec<CompletedSession>, DatabaseError> {
        (**self).completed_all()
    }

    fn breaks_for(&self, session_id: &SessionId) -> Result<Vec<BreakInterval>, DatabaseError> {
        (**self).breaks_for(session_id)
    }

    fn save_open_session(&self, session: Option<&WorkSession>) -> Result<(), DatabaseError> {
        (**self).save_open_session(session)
    }

    fn load_open_session(&self) -> Result<Option<WorkSession>, DatabaseError> {
        (**self).load_open_session()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    completed: Vec<CompletedSession>,
    breaks: HashMap<SessionId, Vec<BreakInterval>>,
    open: Option<WorkSession>,
}

/// In-process [`SessionRepository`].
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the repository with already-completed sessions.
    pub fn with_history(history: impl IntoIterator<Item = CompletedSession>) -> Self {
        let repo = Self::new();
        {
            let mut state = repo.lock();
            state.completed.extend(history);
            state.completed.sort_by_key(|s| s.started_at);
        }
        repo
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionRepository for MemoryRepository {
    fn append_completed(
        &self,
        record: &CompletedSession,
        breaks: &[BreakInterval],
    ) -> Result<(), DatabaseError> {
        let mut state = self.lock();
        if state
            .completed
            .iter()
            .any(|s| s.session_id == record.session_id)
        {
            return Err(DatabaseError::Conflict(format!(
                "session {} already recorded",
                record.session_id
            )));
        }
        let pos = state
            .completed
            .partition_point(|s| s.started_at <= record.started_at);
        state.completed.insert(pos, record.clone());
        state
            .breaks
            .insert(record.session_id.clone(), breaks.to_vec());
        Ok(())
    }

    fn completed_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CompletedSession>, DatabaseError> {
        Ok(self
            .lock()
            .completed
            .iter()
            .filter(|s| s.started_at >= from && s.started_at < to)
            .cloned()
            .collect())
    }

    fn completed_all(&self) -> Result<Vec<CompletedSession>, DatabaseError> {
        Ok(self.lock().completed.clone())
    }

    fn breaks_for(&self, session_id: &SessionId) -> Result<Vec<BreakInterval>, DatabaseError> {
        Ok(self
            .lock()
            .breaks
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    fn save_open_session(&self, session: Option<&WorkSession>) -> Result<(), DatabaseError> {
        self.lock().open = session.cloned();
        Ok(())
    }

    fn load_open_session(&self) -> Result<Option<WorkSession>, DatabaseError> {
        Ok(self.lock().open.clone())
    }
}
