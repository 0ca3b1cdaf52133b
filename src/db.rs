//! SQLite persistence
//!
//! Sessions are stored as one JSON document per conversation and written
//! with a single upsert, so a save is atomic. The same database carries the
//! durable conversation leases, tickets and aggregate counters.

mod schema;

pub use schema::*;

use crate::escalation::Ticket;
use crate::session::Session;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Database connection lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Session Operations ====================

    /// Load a session. A row that no longer deserializes is reported as
    /// absent so the conversation can start over.
    pub fn get_session(&self, id: &str) -> DbResult<Option<Session>> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row("SELECT data FROM sessions WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(data) = data else {
            return Ok(None);
        };
        match serde_json::from_str::<Session>(&data) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(conv_id = %id, error = %e, "Unreadable session state, starting fresh");
                Ok(None)
            }
        }
    }

    /// Insert or replace the session in one statement
    pub fn upsert_session(&self, session: &Session) -> DbResult<()> {
        let data = serde_json::to_string(session)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (id, stage, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                stage = excluded.stage,
                data = excluded.data,
                updated_at = excluded.updated_at",
            params![
                session.id,
                session.stage().as_str(),
                data,
                session.created_at.to_rfc3339(),
                session.last_activity.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // ==================== Lease Operations ====================

    /// Take the conversation lease if it is free, expired, or already ours
    pub fn try_acquire_lock(
        &self,
        conversation_id: &str,
        owner_id: &str,
        now_ms: i64,
        ttl_ms: i64,
    ) -> DbResult<bool> {
        let conn = self.conn()?;
        let changes = conn.execute(
            "INSERT INTO conversation_locks (conversation_id, owner_id, acquired_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(conversation_id) DO UPDATE SET
                owner_id = excluded.owner_id,
                acquired_at = excluded.acquired_at,
                expires_at = excluded.expires_at
             WHERE conversation_locks.owner_id = excluded.owner_id
                OR conversation_locks.expires_at <= excluded.acquired_at",
            params![conversation_id, owner_id, now_ms, now_ms.saturating_add(ttl_ms)],
        )?;
        Ok(changes > 0)
    }

    pub fn release_lock(&self, conversation_id: &str, owner_id: &str) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM conversation_locks WHERE conversation_id = ?1 AND owner_id = ?2",
            params![conversation_id, owner_id],
        )?;
        Ok(())
    }

    /// Delete every expired lease; returns how many were removed
    pub fn reclaim_stale_locks(&self, now_ms: i64) -> DbResult<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM conversation_locks WHERE expires_at <= ?1",
            params![now_ms],
        )?;
        Ok(removed)
    }

    // ==================== Ticket Operations ====================

    /// Store a ticket unless the conversation already has one.
    ///
    /// Returns the ticket that is on record for the conversation afterwards.
    pub fn insert_ticket(&self, ticket: &Ticket) -> DbResult<Ticket> {
        let data = serde_json::to_string(ticket)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tickets (id, conversation_id, reason, data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(conversation_id) DO NOTHING",
            params![
                ticket.id,
                ticket.conversation_id,
                ticket.reason.as_str(),
                data,
                ticket.created_at.to_rfc3339(),
            ],
        )?;
        let stored: String = conn.query_row(
            "SELECT data FROM tickets WHERE conversation_id = ?1",
            params![ticket.conversation_id],
            |row| row.get(0),
        )?;
        Ok(serde_json::from_str(&stored)?)
    }

    pub fn get_ticket_for_conversation(&self, conversation_id: &str) -> DbResult<Option<Ticket>> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM tickets WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|d| serde_json::from_str(&d))
            .transpose()
            .map_err(DbError::from)
    }

    // ==================== Counter Operations ====================

    /// Atomically add `by` to a counter; returns the new value
    pub fn increment_counter(&self, name: &str, by: i64) -> DbResult<i64> {
        let conn = self.conn()?;
        let value = conn.query_row(
            "INSERT INTO counters (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = counters.value + excluded.value
             RETURNING value",
            params![name, by],
            |row| row.get(0),
        )?;
        Ok(value)
    }

    #[allow(dead_code)] // Read back by operators and tests
    pub fn counter(&self, name: &str) -> DbResult<i64> {
        let conn = self.conn()?;
        let value: Option<i64> = conn
            .query_row("SELECT value FROM counters WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escalation::{build_ticket, EscalationReason};
    use crate::state_machine::Stage;
    use chrono::Utc;

    #[test]
    fn test_session_round_trip_and_upsert() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_session("c1").unwrap().is_none());

        let mut session = Session::new("c1", Stage::LanguageSelect);
        session.context.display_name = Some("Ana".to_string());
        db.upsert_session(&session).unwrap();

        session.context.problem = Some("no internet".to_string());
        db.upsert_session(&session).unwrap();

        let loaded = db.get_session("c1").unwrap().unwrap();
        assert_eq!(loaded.context.display_name.as_deref(), Some("Ana"));
        assert_eq!(loaded.context.problem.as_deref(), Some("no internet"));
    }

    #[test]
    fn test_corrupted_session_is_absent() {
        let db = Database::open_in_memory().unwrap();
        {
            let conn = db.conn().unwrap();
            conn.execute(
                "INSERT INTO sessions (id, stage, data, created_at, updated_at)
                 VALUES ('bad', 'teleport', '{\"stage\":\"teleport\"}', 'x', 'x')",
                [],
            )
            .unwrap();
        }
        assert!(db.get_session("bad").unwrap().is_none());
    }

    #[test]
    fn test_lock_single_owner_and_stale_takeover() {
        let db = Database::open_in_memory().unwrap();
        let now = 1_000_000;

        assert!(db.try_acquire_lock("c1", "owner-a", now, 30_000).unwrap());
        assert!(!db.try_acquire_lock("c1", "owner-b", now + 10, 30_000).unwrap());
        // Re-entrant for the same owner
        assert!(db.try_acquire_lock("c1", "owner-a", now + 20, 30_000).unwrap());
        // Expired lease can be taken over
        assert!(db.try_acquire_lock("c1", "owner-b", now + 40_000, 30_000).unwrap());

        // Releasing with the wrong owner is a no-op
        db.release_lock("c1", "owner-a").unwrap();
        assert!(!db.try_acquire_lock("c1", "owner-c", now + 40_001, 30_000).unwrap());

        db.release_lock("c1", "owner-b").unwrap();
        assert!(db.try_acquire_lock("c1", "owner-c", now + 40_002, 30_000).unwrap());
    }

    #[test]
    fn test_reclaim_stale_locks() {
        let db = Database::open_in_memory().unwrap();
        db.try_acquire_lock("old", "a", 0, 1_000).unwrap();
        db.try_acquire_lock("fresh", "b", 5_000, 30_000).unwrap();
        assert_eq!(db.reclaim_stale_locks(10_000).unwrap(), 1);
        assert!(db.try_acquire_lock("old", "c", 10_000, 1_000).unwrap());
        assert!(!db.try_acquire_lock("fresh", "c", 10_000, 1_000).unwrap());
    }

    #[test]
    fn test_one_ticket_per_conversation() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new("c1", Stage::Escalation);
        let first = build_ticket(&session, EscalationReason::UserRequested, Utc::now());
        let second = build_ticket(&session, EscalationReason::StepCeiling, Utc::now());

        assert_eq!(db.insert_ticket(&first).unwrap(), first);
        assert_eq!(db.insert_ticket(&second).unwrap(), first);
        assert_eq!(db.get_ticket_for_conversation("c1").unwrap(), Some(first));
    }

    #[test]
    fn test_counters_are_cumulative() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.counter(COUNTER_PERSIST_FAILURES).unwrap(), 0);
        assert_eq!(db.increment_counter(COUNTER_PERSIST_FAILURES, 1).unwrap(), 1);
        assert_eq!(db.increment_counter(COUNTER_PERSIST_FAILURES, 2).unwrap(), 3);
        assert_eq!(db.counter(COUNTER_PERSIST_FAILURES).unwrap(), 3);
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("support.db");
        {
            let db = Database::open(&path).unwrap();
            db.upsert_session(&Session::new("c1", Stage::NameCapture)).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_session("c1").unwrap().unwrap().stage(), Stage::NameCapture);
    }
}
