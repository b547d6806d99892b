//! Database module for the quiz tutor
//!
//! Provides persistence for conversations, their turns and tutor state.

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("State serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid turn for user {user_id}: {source}")]
    InvalidRole {
        user_id: String,
        #[source]
        source: InvalidRole,
    },
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
    /// Open or create database at the given path.
    ///
    /// The special path `:memory:` opens a private in-memory database.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Conversation Operations ====================

    /// Get a conversation by user id, `None` if the user has never written
    pub fn find_conversation(&self, user_id: &str) -> DbResult<Option<Conversation>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT user_id, state, created_at, updated_at
                 FROM conversations WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(user_id, state_json, created_at, updated_at)| {
            let state = state_json.and_then(|json| parse_state(&user_id, &json));
            Conversation {
                user_id,
                state,
                created_at: parse_datetime(&created_at),
                updated_at: parse_datetime(&updated_at),
            }
        }))
    }

    /// Get the persisted tutor state, `None` if never recorded
    pub fn get_state(&self, user_id: &str) -> DbResult<Option<TutorState>> {
        Ok(self.find_conversation(user_id)?.and_then(|c| c.state))
    }

    // ==================== Turn Operations ====================

    /// Append a turn, creating the conversation if absent.
    ///
    /// Sequence ids are assigned inside one transaction so concurrent
    /// appends for the same user never share an id.
    pub fn append_turn(
        &self,
        turn_id: &str,
        user_id: &str,
        role: Role,
        content: &str,
    ) -> DbResult<TurnRecord> {
        self.append(turn_id, user_id, role, content, None)
    }

    /// Append a turn and record the tutor state in the same transaction.
    ///
    /// Either both land or neither does, so the stored state never lags
    /// behind the turn it was computed from.
    pub fn append_turn_with_state(
        &self,
        turn_id: &str,
        user_id: &str,
        role: Role,
        content: &str,
        state: &TutorState,
    ) -> DbResult<TurnRecord> {
        let state_json = serde_json::to_string(state)?;
        self.append(turn_id, user_id, role, content, Some(&state_json))
    }

    fn append(
        &self,
        turn_id: &str,
        user_id: &str,
        role: Role,
        content: &str,
        state_json: Option<&str>,
    ) -> DbResult<TurnRecord> {
        let mut conn = self.lock()?;
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO conversations (user_id, state, created_at, updated_at)
             VALUES (?1, NULL, ?2, ?2)
             ON CONFLICT(user_id) DO UPDATE SET updated_at = excluded.updated_at",
            params![user_id, now_str],
        )?;

        let sequence_id: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sequence_id), 0) + 1 FROM turns WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO turns (turn_id, user_id, sequence_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![turn_id, user_id, sequence_id, role.as_str(), content, now_str],
        )?;

        if let Some(state_json) = state_json {
            tx.execute(
                "UPDATE conversations SET state = ?2 WHERE user_id = ?1",
                params![user_id, state_json],
            )?;
        }
        tx.commit()?;

        Ok(TurnRecord {
            turn_id: turn_id.to_string(),
            user_id: user_id.to_string(),
            sequence_id,
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    /// All turns for a user in insertion order; empty for unknown users
    pub fn get_history(&self, user_id: &str) -> DbResult<Vec<TurnRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT turn_id, sequence_id, role, content, created_at
             FROM turns WHERE user_id = ?1 ORDER BY sequence_id ASC",
        )?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(turn_id, sequence_id, role, content, created_at)| {
                let role = role.parse::<Role>().map_err(|source| DbError::InvalidRole {
                    user_id: user_id.to_string(),
                    source,
                })?;
                Ok(TurnRecord {
                    turn_id,
                    user_id: user_id.to_string(),
                    sequence_id,
                    role,
                    content,
                    created_at: parse_datetime(&created_at),
                })
            })
            .collect()
    }
}

fn parse_state(user_id: &str, json: &str) -> Option<TutorState> {
    match serde_json::from_str(json) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Unreadable tutor state, recovering from history");
            None
        }
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
