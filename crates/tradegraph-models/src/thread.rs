use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::request::{ConversationTurn, TurnRole};

/// The SQLite schema the thread store creates on open.
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS threads (
///     id          TEXT PRIMARY KEY,
///     owner_id    TEXT NOT NULL,
///     title       TEXT NOT NULL,
///     created_at  TEXT NOT NULL,
///     updated_at  TEXT NOT NULL
/// );
///
/// CREATE TABLE IF NOT EXISTS messages (
///     id          TEXT PRIMARY KEY,
///     thread_id   TEXT NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
///     role        TEXT NOT NULL,
///     content     TEXT NOT NULL,
///     created_at  TEXT NOT NULL
/// );
/// ```
pub const THREAD_TABLES_DDL: &str = "\
PRAGMA foreign_keys = ON;
CREATE TABLE IF NOT EXISTS threads (
    id          TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL,
    title       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS messages (
    id          TEXT PRIMARY KEY,
    thread_id   TEXT NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
    role        TEXT NOT NULL,
    content     TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_threads_owner ON threads(owner_id);
CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id, created_at);
";

/// A chat thread owned by a single principal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thread {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted message inside a thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(thread_id: Uuid, role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            thread_id,
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// View this message as a conversational turn for an analysis request.
    pub fn to_turn(&self) -> ConversationTurn {
        ConversationTurn {
            id: self.id.to_string(),
            role: self.role,
            text: self.content.clone(),
            timestamp: self.created_at,
        }
    }
}

pub fn role_str(role: TurnRole) -> &'static str {
    match role {
        TurnRole::User => "user",
        TurnRole::Assistant => "assistant",
    }
}

pub fn parse_role(value: &str) -> Option<TurnRole> {
    match value {
        "user" => Some(TurnRole::User),
        "assistant" => Some(TurnRole::Assistant),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_text_roundtrip() {
        for role in [TurnRole::User, TurnRole::Assistant] {
            assert_eq!(parse_role(role_str(role)), Some(role));
        }
        assert_eq!(parse_role("system"), None);
    }

    #[test]
    fn message_to_turn() {
        let thread_id = Uuid::new_v4();
        let msg = ChatMessage::new(thread_id, TurnRole::Assistant, "HOLD");
        let turn = msg.to_turn();
        assert_eq!(turn.id, msg.id.to_string());
        assert_eq!(turn.role, TurnRole::Assistant);
        assert_eq!(turn.text, "HOLD");
        assert_eq!(turn.timestamp, msg.created_at);
    }
}
