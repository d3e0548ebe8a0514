//! SQLite-based session storage.
//!
//! Provides persistent storage for:
//! - Completed work sessions and their breaks
//! - App usage samples
//! - Key-value store for application state (open-session snapshot,
//!   shield state, credentials)

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{data_dir, migrations};
use crate::credentials::CredentialStore;
use crate::error::{CredentialError, DatabaseError};
use crate::session::{BreakInterval, CompletedSession, SessionId, SessionRepository, WorkSession};
use crate::usage::{sort_totals, AppUsageSample, AppUsageTotal, UsageRepository};

/// kv key of the open-session snapshot.
pub const OPEN_SESSION_KEY: &str = "open_session";

/// kv prefix for values written through [`CredentialStore`].
const CREDENTIAL_PREFIX: &str = "credential.";

/// SQLite database for session storage.
pub struct Database {
    conn: Connection,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data dir>/shiftguard.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let path = data_dir().map_err(DatabaseError::DataDir)?.join("shiftguard.db");
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::init(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), DatabaseError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn kv_get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DatabaseError> {
        match self.kv_get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn kv_set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), DatabaseError> {
        self.kv_set(key, &serde_json::to_string(value)?)
    }

    fn query_sessions(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<CompletedSession>, DatabaseError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u64>(3)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, started_at, ended_at, duration_seconds) = row?;
            sessions.push(CompletedSession {
                session_id: SessionId::from(id),
                started_at: parse_ts(&started_at)?,
                ended_at: parse_ts(&ended_at)?,
                duration_seconds,
            });
        }
        Ok(sessions)
    }
}

fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Corrupt(format!("timestamp '{raw}': {e}")))
}

impl SessionRepository for Database {
    fn append_completed(
        &self,
        record: &CompletedSession,
        breaks: &[BreakInterval],
    ) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO sessions (id, started_at, ended_at, duration_seconds)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.session_id.as_str(),
                ts(&record.started_at),
                ts(&record.ended_at),
                record.duration_seconds,
            ],
        )?;
        for (seq, b) in breaks.iter().enumerate() {
            tx.execute(
                "INSERT INTO breaks (session_id, seq, kind, started_at, ended_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.session_id.as_str(),
                    seq as i64,
                    b.kind.as_str(),
                    ts(&b.started_at),
                    b.ended_at.as_ref().map(ts),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn completed_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CompletedSession>, DatabaseError> {
        self.query_sessions(
            "SELECT id, started_at, ended_at, duration_seconds FROM sessions
             WHERE started_at >= ?1 AND started_at < ?2
             ORDER BY started_at, id",
            params![ts(&from), ts(&to)],
        )
    }

    fn completed_all(&self) -> Result<Vec<CompletedSession>, DatabaseError> {
        self.query_sessions(
            "SELECT id, started_at, ended_at, duration_seconds FROM sessions
             ORDER BY started_at, id",
            [],
        )
    }

    fn breaks_for(&self, session_id: &SessionId) -> Result<Vec<BreakInterval>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, started_at, ended_at FROM breaks
             WHERE session_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![session_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut breaks = Vec::new();
        for row in rows {
            let (kind, started_at, ended_at) = row?;
            breaks.push(BreakInterval {
                kind: kind
                    .parse()
                    .map_err(|e| DatabaseError::Corrupt(format!("break kind: {e}")))?,
                started_at: parse_ts(&started_at)?,
                ended_at: ended_at.as_deref().map(parse_ts).transpose()?,
            });
        }
        Ok(breaks)
    }

    fn save_open_session(&self, session: Option<&WorkSession>) -> Result<(), DatabaseError> {
        match session {
            Some(s) => self.kv_set_json(OPEN_SESSION_KEY, s),
            None => self.kv_delete(OPEN_SESSION_KEY),
        }
    }

    fn load_open_session(&self) -> Result<Option<WorkSession>, DatabaseError> {
        self.kv_get_json(OPEN_SESSION_KEY)
    }
}

impl UsageRepository for Database {
    fn append_usage(&self, sample: &AppUsageSample) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO app_usage (session_id, app_identifier, foreground_seconds, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                sample.session_id.as_str(),
                sample.app_identifier,
                sample.foreground_seconds,
                ts(&sample.recorded_at),
            ],
        )?;
        Ok(())
    }

    fn usage_for_session(&self, session_id: &SessionId) -> Result<Vec<AppUsageTotal>, DatabaseError> {
        query_usage(
            &self.conn,
            "SELECT app_identifier, SUM(foreground_seconds) FROM app_usage
             WHERE session_id = ?1 GROUP BY app_identifier",
            params![session_id.as_str()],
        )
    }

    fn usage_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AppUsageTotal>, DatabaseError> {
        query_usage(
            &self.conn,
            "SELECT app_identifier, SUM(foreground_seconds) FROM app_usage
             WHERE recorded_at >= ?1 AND recorded_at < ?2 GROUP BY app_identifier",
            params![ts(&from), ts(&to)],
        )
    }
}

fn query_usage(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<AppUsageTotal>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok(AppUsageTotal {
            app_identifier: row.get(0)?,
            foreground_seconds: row.get::<_, i64>(1)?.max(0) as u64,
        })
    })?;
    let mut totals = rows.collect::<Result<Vec<_>, _>>()?;
    sort_totals(&mut totals);
    Ok(totals)
}

impl CredentialStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.kv_get(&format!("{CREDENTIAL_PREFIX}{key}"))?)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        Ok(self.kv_set(&format!("{CREDENTIAL_PREFIX}{key}"), value)?)
    }

    fn delete(&self, key: &str) -> Result<(), CredentialError> {
        Ok(self.kv_delete(&format!("{CREDENTIAL_PREFIX}{key}"))?)
    }
}
