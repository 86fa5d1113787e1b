use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::Database;
use crate::error::StoreError;
use crate::models::{ExpiredMessage, MessageRow, UserRow};

/// Timestamp format matching SQLite's `datetime('now')` default, so string
/// comparison against `created_at` is chronological comparison.
pub const SQLITE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl Database {
    // -- Users (identity collaborator) --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Messages --

    /// Inserts a message and returns the stored row. The id and `created_at`
    /// are assigned by SQLite atomically with the insert.
    pub fn create_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        body: Option<&str>,
        voice_path: Option<&str>,
    ) -> Result<MessageRow, StoreError> {
        if body.is_none() && voice_path.is_none() {
            return Err(StoreError::validation(
                "message",
                "a message needs a body or a voice attachment",
            ));
        }
        if sender_id == recipient_id {
            return Err(StoreError::validation(
                "recipient",
                "sender and recipient must differ",
            ));
        }

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (sender_id, recipient_id, body, voice_path)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![sender_id, recipient_id, body, voice_path],
            )?;
            let id = conn.last_insert_rowid();
            query_message_by_id(conn, id)
        })
    }

    /// Messages where the user is sender or recipient: the newest `limit`
    /// rows, returned oldest-first for display.
    pub fn list_for_participant(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.sender_id, m.recipient_id, s.username, r.username,
                        m.body, m.voice_path, m.created_at
                 FROM messages m
                 JOIN users s ON m.sender_id = s.id
                 JOIN users r ON m.recipient_id = r.id
                 WHERE m.sender_id = ?1 OR m.recipient_id = ?1
                 ORDER BY m.id DESC
                 LIMIT ?2",
            )?;

            let mut rows = stmt
                .query_map(rusqlite::params![user_id, limit], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            rows.reverse();
            Ok(rows)
        })
    }

    /// One consistent snapshot of every message at or past the expiry
    /// threshold. Taken in a single SELECT under the connection lock, so
    /// messages created after the call can never leak into the result.
    pub fn find_expired_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<ExpiredMessage>, StoreError> {
        let cutoff = threshold.format(SQLITE_DATETIME_FORMAT).to_string();

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, voice_path FROM messages WHERE created_at <= ?1 ORDER BY id",
            )?;

            let rows = stmt
                .query_map([&cutoff], |row| {
                    Ok(ExpiredMessage {
                        id: row.get(0)?,
                        voice_path: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Deletes exactly the given id set in one statement (one implicit
    /// transaction). An empty set never touches SQLite.
    pub fn delete_by_ids(&self, ids: &[i64]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "DELETE FROM messages WHERE id IN ({})",
                placeholders.join(", ")
            );

            let params: Vec<&dyn rusqlite::types::ToSql> =
                ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

            let deleted = conn.execute(&sql, params.as_slice())?;
            Ok(deleted)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>, StoreError> {
    // `column` is one of two compile-time literals, never user input.
    let sql =
        format!("SELECT id, username, password, created_at FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_message_by_id(conn: &Connection, id: i64) -> Result<MessageRow, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.sender_id, m.recipient_id, s.username, r.username,
                m.body, m.voice_path, m.created_at
         FROM messages m
         JOIN users s ON m.sender_id = s.id
         JOIN users r ON m.recipient_id = r.id
         WHERE m.id = ?1",
    )?;

    let row = stmt.query_row([id], message_from_row)?;
    Ok(row)
}

fn message_from_row(row: &rusqlite::Row<'_>) -> Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        sender_username: row.get(3)?,
        recipient_username: row.get(4)?,
        body: row.get(5)?,
        voice_path: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, StoreError>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, StoreError> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
