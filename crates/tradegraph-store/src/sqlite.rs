use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use tradegraph_models::thread::{parse_role, role_str, ChatMessage, Thread, THREAD_TABLES_DDL};
use uuid::Uuid;

use crate::error::StoreError;

/// SQLite-backed thread and message persistence.
///
/// `rusqlite::Connection` is not `Sync`; callers share it behind a mutex.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and ensure the schema exists.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(THREAD_TABLES_DDL)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database. Useful for testing.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(THREAD_TABLES_DDL)?;
        Ok(Self { conn })
    }

    pub fn insert_thread(&self, thread: &Thread) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO threads (id, owner_id, title, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                thread.id.to_string(),
                thread.owner_id,
                thread.title,
                thread.created_at,
                thread.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a thread by id regardless of owner.
    pub fn get_thread(&self, id: Uuid) -> Result<Option<Thread>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, owner_id, title, created_at, updated_at FROM threads WHERE id = ?1",
        )?;

        match stmt.query_row(rusqlite::params![id.to_string()], thread_from_row) {
            Ok(thread) => Ok(Some(thread)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    /// All threads of one owner, most recently active first.
    pub fn list_threads(&self, owner_id: &str) -> Result<Vec<Thread>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, owner_id, title, created_at, updated_at FROM threads \
             WHERE owner_id = ?1 ORDER BY updated_at DESC",
        )?;

        let threads = stmt
            .query_map(rusqlite::params![owner_id], thread_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(threads)
    }

    /// Insert a message and bump the owning thread's `updated_at`.
    pub fn insert_message(&mut self, message: &ChatMessage) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO messages (id, thread_id, role, content, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                message.id.to_string(),
                message.thread_id.to_string(),
                role_str(message.role),
                message.content,
                message.created_at,
            ],
        )?;
        tx.execute(
            "UPDATE threads SET updated_at = ?1 WHERE id = ?2",
            rusqlite::params![message.created_at, message.thread_id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Messages of a thread, oldest first.
    pub fn messages_by_thread(&self, thread_id: Uuid) -> Result<Vec<ChatMessage>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, thread_id, role, content, created_at FROM messages \
             WHERE thread_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;

        let messages = stmt
            .query_map(rusqlite::params![thread_id.to_string()], message_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }
}

fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn thread_from_row(row: &Row<'_>) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: uuid_column(row, 0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        created_at: row.get::<_, DateTime<Utc>>(3)?,
        updated_at: row.get::<_, DateTime<Utc>>(4)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let role_raw: String = row.get(2)?;
    let role = parse_role(&role_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unknown role: {role_raw}").into(),
        )
    })?;

    Ok(ChatMessage {
        id: uuid_column(row, 0)?,
        thread_id: uuid_column(row, 1)?,
        role,
        content: row.get(3)?,
        created_at: row.get::<_, DateTime<Utc>>(4)?,
    })
}
