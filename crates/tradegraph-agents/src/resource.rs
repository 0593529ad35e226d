use std::ops::Deref;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tracing::{error, info};

use crate::bridge::panic_message;
use crate::error::AgentError;

/// Builds the shared resource. Called at most once per manager generation.
#[async_trait]
pub trait ResourceFactory<T>: Send + Sync {
    async fn build(&self) -> Result<T, AgentError>;
}

/// Construction failure. Sticky until [`ResourceManager::reset`].
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Graph initialization failed: {message}")]
pub struct InitError {
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

impl InitError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            failed_at: Utc::now(),
        }
    }
}

/// Shared handle to the constructed resource.
pub struct GraphHandle<T> {
    resource: Arc<T>,
    pub constructed_at: DateTime<Utc>,
}

impl<T> GraphHandle<T> {
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.resource, &other.resource)
    }

    pub fn resource(&self) -> Arc<T> {
        Arc::clone(&self.resource)
    }
}

impl<T> Clone for GraphHandle<T> {
    fn clone(&self) -> Self {
        Self {
            resource: Arc::clone(&self.resource),
            constructed_at: self.constructed_at,
        }
    }
}

impl<T> Deref for GraphHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.resource
    }
}

impl<T> std::fmt::Debug for GraphHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphHandle")
            .field("constructed_at", &self.constructed_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphStatus {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

type Pending<T> = Shared<BoxFuture<'static, Result<GraphHandle<T>, InitError>>>;

enum Slot<T> {
    Uninitialized,
    Initializing(Pending<T>),
    Ready(GraphHandle<T>),
    Failed(InitError),
}

/// Lazily builds one shared resource, at most once, under concurrent
/// first access.
///
/// The build runs on its own task and settles the slot itself, so a caller
/// that goes away mid-build does not abandon it. Callers arriving during the
/// build await the same pending result. The slot lock is only held for reads
/// and swaps, never across the build or any use of the resource.
pub struct ResourceManager<T> {
    factory: Arc<dyn ResourceFactory<T>>,
    slot: Arc<RwLock<Slot<T>>>,
}

impl<T: Send + Sync + 'static> ResourceManager<T> {
    pub fn new(factory: Arc<dyn ResourceFactory<T>>) -> Self {
        Self {
            factory,
            slot: Arc::new(RwLock::new(Slot::Uninitialized)),
        }
    }

    /// Return the shared handle, building it on first use.
    pub async fn get_resource(&self) -> Result<GraphHandle<T>, InitError> {
        if let Some(settled) = self.settled() {
            return settled;
        }

        let pending = {
            let mut slot = write_slot(&self.slot);
            // Another caller may have settled or started the build meanwhile.
            match &*slot {
                Slot::Ready(handle) => return Ok(handle.clone()),
                Slot::Failed(e) => return Err(e.clone()),
                Slot::Initializing(pending) => pending.clone(),
                Slot::Uninitialized => {
                    let pending = self.start_build();
                    *slot = Slot::Initializing(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    fn start_build(&self) -> Pending<T> {
        let factory = Arc::clone(&self.factory);
        let slot = Arc::clone(&self.slot);

        let task = tokio::spawn(async move {
            info!("Constructing shared analysis graph");
            let started = Instant::now();

            let built = AssertUnwindSafe(factory.build()).catch_unwind().await;
            let result = match built {
                Ok(Ok(resource)) => Ok(GraphHandle {
                    resource: Arc::new(resource),
                    constructed_at: Utc::now(),
                }),
                Ok(Err(e)) => Err(InitError::new(e.to_string())),
                Err(payload) => Err(InitError::new(format!(
                    "construction panicked: {}",
                    panic_message(payload.as_ref())
                ))),
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            *write_slot(&slot) = match &result {
                Ok(handle) => {
                    info!(elapsed_ms, "Shared analysis graph ready");
                    Slot::Ready(handle.clone())
                }
                Err(e) => {
                    error!(elapsed_ms, error = %e.message, "Shared analysis graph construction failed");
                    Slot::Failed(e.clone())
                }
            };
            result
        });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(InitError::new(format!("construction task failed: {e}")))
            })
        }
        .boxed()
        .shared()
    }

    pub fn status(&self) -> GraphStatus {
        match &*read_slot(&self.slot) {
            Slot::Uninitialized => GraphStatus::Uninitialized,
            Slot::Initializing(_) => GraphStatus::Initializing,
            Slot::Ready(_) => GraphStatus::Ready,
            Slot::Failed(_) => GraphStatus::Failed,
        }
    }

    /// The cached construction error, if the manager is in the failed state.
    pub fn last_error(&self) -> Option<InitError> {
        match &*read_slot(&self.slot) {
            Slot::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }

    /// Forget any cached handle or error. Waits for an in-flight build to
    /// finish first. Requests holding a handle keep it alive.
    pub async fn reset(&self) {
        let in_flight = match &*read_slot(&self.slot) {
            Slot::Initializing(pending) => Some(pending.clone()),
            _ => None,
        };
        if let Some(pending) = in_flight {
            let _ = pending.await;
        }
        *write_slot(&self.slot) = Slot::Uninitialized;
        info!("Shared analysis graph reset");
    }

    fn settled(&self) -> Option<Result<GraphHandle<T>, InitError>> {
        match &*read_slot(&self.slot) {
            Slot::Ready(handle) => Some(Ok(handle.clone())),
            Slot::Failed(e) => Some(Err(e.clone())),
            Slot::Uninitialized | Slot::Initializing(_) => None,
        }
    }
}

fn read_slot<T>(slot: &RwLock<Slot<T>>) -> RwLockReadGuard<'_, Slot<T>> {
    slot.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_slot<T>(slot: &RwLock<Slot<T>>) -> RwLockWriteGuard<'_, Slot<T>> {
    slot.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingFactory {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ResourceFactory<String> for CountingFactory {
        async fn build(&self) -> Result<String, AgentError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                Err(AgentError::Config(format!("attempt {n} failed")))
            } else {
                Ok(format!("graph #{n}"))
            }
        }
    }

    fn manager(fail: bool) -> (Arc<CountingFactory>, ResourceManager<String>) {
        let factory = Arc::new(CountingFactory {
            calls: AtomicUsize::new(0),
            fail,
        });
        (factory.clone(), ResourceManager::new(factory))
    }

    #[tokio::test]
    async fn builds_once_and_caches() {
        let (factory, manager) = manager(false);
        assert_eq!(manager.status(), GraphStatus::Uninitialized);

        let first = manager.get_resource().await.unwrap();
        let second = manager.get_resource().await.unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(&*first, "graph #1");
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.status(), GraphStatus::Ready);
    }

    #[tokio::test]
    async fn failure_is_sticky_until_reset() {
        let (factory, manager) = manager(true);

        let first = manager.get_resource().await.unwrap_err();
        let second = manager.get_resource().await.unwrap_err();
        assert_eq!(first, second);
        assert!(first.message.contains("attempt 1 failed"));
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.status(), GraphStatus::Failed);
        assert_eq!(manager.last_error(), Some(first));

        manager.reset().await;
        assert_eq!(manager.status(), GraphStatus::Uninitialized);
        let third = manager.get_resource().await.unwrap_err();
        assert!(third.message.contains("attempt 2 failed"));
    }

    #[tokio::test]
    async fn reset_rebuilds_a_new_handle() {
        let (_, manager) = manager(false);
        let old = manager.get_resource().await.unwrap();
        manager.reset().await;
        let new = manager.get_resource().await.unwrap();

        assert!(!old.ptr_eq(&new));
        assert_eq!(&*old, "graph #1");
        assert_eq!(&*new, "graph #2");
    }

    #[tokio::test]
    async fn panicking_factory_becomes_init_error() {
        struct Exploding;

        #[async_trait]
        impl ResourceFactory<String> for Exploding {
            async fn build(&self) -> Result<String, AgentError> {
                panic!("no graph for you");
            }
        }

        let manager = ResourceManager::new(Arc::new(Exploding));
        let err = manager.get_resource().await.unwrap_err();
        assert!(err.message.contains("no graph for you"));
        assert_eq!(manager.status(), GraphStatus::Failed);
    }

    #[tokio::test]
    async fn build_settles_after_its_caller_is_dropped() {
        let (factory, manager) = manager(false);
        let manager = Arc::new(manager);

        let caller = tokio::spawn({
            let manager = manager.clone();
            async move { manager.get_resource().await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(manager.status(), GraphStatus::Initializing);
        caller.abort();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.status(), GraphStatus::Ready);
        assert_eq!(&*manager.get_resource().await.unwrap(), "graph #1");
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
    }
}
