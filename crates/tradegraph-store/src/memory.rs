use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use tradegraph_models::Thread;
use uuid::Uuid;

/// Recently used threads, keyed by id. Entries expire after the configured
/// TTL; SQLite stays the source of truth.
pub struct ThreadCache {
    threads: Cache<Uuid, Thread>,
}

impl ThreadCache {
    pub fn new(max_threads: u64, ttl: Duration) -> Self {
        Self {
            threads: Cache::builder()
                .max_capacity(max_threads)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn lookup(&self, id: &Uuid) -> Option<Thread> {
        self.threads.get(id).await
    }

    /// A cached thread, only if `owner_id` owns it.
    pub async fn lookup_owned(&self, id: &Uuid, owner_id: &str) -> Option<Thread> {
        self.lookup(id).await.filter(|t| t.owner_id == owner_id)
    }

    pub async fn remember(&self, thread: Thread) {
        self.threads.insert(thread.id, thread).await;
    }

    /// Record new activity on a cached thread. Uncached threads are left
    /// alone; the next read loads them with the persisted timestamp.
    pub async fn touch(&self, id: &Uuid, at: DateTime<Utc>) {
        if let Some(mut thread) = self.threads.get(id).await {
            if at > thread.updated_at {
                thread.updated_at = at;
                self.threads.insert(*id, thread).await;
            }
        }
    }

    pub async fn forget(&self, id: &Uuid) {
        self.threads.invalidate(id).await;
    }

    pub fn len(&self) -> u64 {
        self.threads.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread(owner: &str) -> Thread {
        let now = Utc::now();
        Thread {
            id: Uuid::new_v4(),
            owner_id: owner.to_string(),
            title: "NVDA earnings".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn lookup_is_scoped_to_owner() {
        let cache = ThreadCache::new(100, Duration::from_secs(60));
        let t = thread("alice");
        cache.remember(t.clone()).await;

        assert_eq!(cache.lookup_owned(&t.id, "alice").await, Some(t.clone()));
        assert_eq!(cache.lookup_owned(&t.id, "mallory").await, None);
        assert_eq!(cache.lookup_owned(&Uuid::new_v4(), "alice").await, None);
    }

    #[tokio::test]
    async fn touch_moves_updated_at_forward_only() {
        let cache = ThreadCache::new(100, Duration::from_secs(60));
        let t = thread("alice");
        cache.remember(t.clone()).await;

        let later = t.updated_at + chrono::Duration::seconds(30);
        cache.touch(&t.id, later).await;
        assert_eq!(cache.lookup(&t.id).await.unwrap().updated_at, later);

        cache.touch(&t.id, t.updated_at).await;
        assert_eq!(cache.lookup(&t.id).await.unwrap().updated_at, later);
    }

    #[tokio::test]
    async fn touch_does_not_load_uncached_threads() {
        let cache = ThreadCache::new(100, Duration::from_secs(60));
        let id = Uuid::new_v4();
        cache.touch(&id, Utc::now()).await;
        assert!(cache.lookup(&id).await.is_none());
    }

    #[tokio::test]
    async fn forgotten_threads_are_gone() {
        let cache = ThreadCache::new(100, Duration::from_secs(60));
        let t = thread("alice");
        cache.remember(t.clone()).await;
        cache.forget(&t.id).await;

        assert!(cache.lookup(&t.id).await.is_none());
    }

    #[tokio::test]
    async fn threads_expire_after_ttl() {
        let cache = ThreadCache::new(100, Duration::from_millis(50));
        let t = thread("alice");
        cache.remember(t.clone()).await;
        assert!(cache.lookup(&t.id).await.is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(cache.lookup(&t.id).await.is_none());
    }
}
