use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tradegraph_models::thread::{ChatMessage, Thread};
use tradegraph_models::TurnRole;
use uuid::Uuid;

use crate::error::StoreError;
use crate::memory::ThreadCache;
use crate::sqlite::SqliteStore;

/// Thread and message persistence with a moka hot cache in front of SQLite
/// for thread lookups.
///
/// Ownership is checked on read: [`ThreadStore::get_thread`] returns `None`
/// both for a missing thread and for one owned by someone else, so callers
/// cannot probe for the existence of other principals' threads.
pub struct ThreadStore {
    memory: ThreadCache,
    sqlite: Mutex<SqliteStore>,
}

impl ThreadStore {
    pub fn new(sqlite: SqliteStore, max_capacity: u64, memory_ttl: Duration) -> Self {
        Self {
            memory: ThreadCache::new(max_capacity, memory_ttl),
            sqlite: Mutex::new(sqlite),
        }
    }

    fn sqlite(&self) -> Result<MutexGuard<'_, SqliteStore>, StoreError> {
        self.sqlite
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("SQLite mutex poisoned: {e}")))
    }

    pub async fn create_thread(&self, owner_id: &str, title: &str) -> Result<Thread, StoreError> {
        let now = Utc::now();
        let thread = Thread {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.sqlite()?.insert_thread(&thread)?;
        self.memory.remember(thread.clone()).await;
        tracing::debug!(thread_id = %thread.id, owner = owner_id, "Thread created");
        Ok(thread)
    }

    /// Get a thread if it exists and belongs to `owner_id`.
    /// Checks moka first, then SQLite. Promotes SQLite hits to moka.
    pub async fn get_thread(&self, id: Uuid, owner_id: &str) -> Result<Option<Thread>, StoreError> {
        if let Some(thread) = self.memory.lookup_owned(&id, owner_id).await {
            return Ok(Some(thread));
        }

        let row = self.sqlite()?.get_thread(id)?;
        if let Some(thread) = &row {
            self.memory.remember(thread.clone()).await;
        }
        Ok(row.filter(|t| t.owner_id == owner_id))
    }

    pub fn list_threads(&self, owner_id: &str) -> Result<Vec<Thread>, StoreError> {
        self.sqlite()?.list_threads(owner_id)
    }

    /// Append a message to a thread. Ownership must already have been checked.
    pub async fn save_message(
        &self,
        thread_id: Uuid,
        role: TurnRole,
        content: &str,
    ) -> Result<ChatMessage, StoreError> {
        let message = ChatMessage::new(thread_id, role, content);
        self.sqlite()?.insert_message(&message)?;
        self.memory.touch(&thread_id, message.created_at).await;
        Ok(message)
    }

    pub fn get_messages_by_thread(&self, thread_id: Uuid) -> Result<Vec<ChatMessage>, StoreError> {
        self.sqlite()?.messages_by_thread(thread_id)
    }

    /// Number of threads in the hot cache.
    pub fn hot_cache_size(&self) -> u64 {
        self.memory.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ThreadStore {
        ThreadStore::new(
            SqliteStore::open_in_memory().unwrap(),
            100,
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn owner_can_read_thread() {
        let store = store();
        let thread = store.create_thread("alice", "AAPL").await.unwrap();

        let loaded = store.get_thread(thread.id, "alice").await.unwrap();
        assert_eq!(loaded.unwrap().id, thread.id);
    }

    #[tokio::test]
    async fn other_principal_sees_nothing() {
        let store = store();
        let thread = store.create_thread("alice", "AAPL").await.unwrap();

        assert!(store.get_thread(thread.id, "mallory").await.unwrap().is_none());
        assert!(store
            .get_thread(Uuid::new_v4(), "mallory")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn read_through_sqlite_to_moka() {
        let store = store();
        let thread = store.create_thread("alice", "AAPL").await.unwrap();
        store.memory.forget(&thread.id).await;
        assert!(store.memory.lookup(&thread.id).await.is_none());

        // First read comes from SQLite and is promoted.
        store.get_thread(thread.id, "alice").await.unwrap().unwrap();
        assert!(store.memory.lookup(&thread.id).await.is_some());
    }

    #[tokio::test]
    async fn save_and_list_messages() {
        let store = store();
        let thread = store.create_thread("alice", "AAPL").await.unwrap();

        store
            .save_message(thread.id, TurnRole::User, "Analyze AAPL")
            .await
            .unwrap();
        store
            .save_message(thread.id, TurnRole::Assistant, "BUY")
            .await
            .unwrap();

        let messages = store.get_messages_by_thread(thread.id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, TurnRole::User);
        assert_eq!(messages[1].content, "BUY");

        let cached = store.get_thread(thread.id, "alice").await.unwrap().unwrap();
        assert_eq!(cached.updated_at, messages[1].created_at);

        store.memory.forget(&thread.id).await;
        let persisted = store.get_thread(thread.id, "alice").await.unwrap().unwrap();
        assert_eq!(persisted.updated_at, cached.updated_at);
    }

    #[tokio::test]
    async fn list_threads_for_owner() {
        let store = store();
        store.create_thread("alice", "one").await.unwrap();
        store.create_thread("alice", "two").await.unwrap();
        store.create_thread("bob", "three").await.unwrap();

        assert_eq!(store.list_threads("alice").unwrap().len(), 2);
    }
}
