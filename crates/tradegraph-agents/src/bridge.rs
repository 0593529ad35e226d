//! Run async work inside an isolated, single-use execution context.
//!
//! Each call spawns a dedicated OS thread that owns a fresh current-thread
//! Tokio runtime. The caller waits for the result with a wall-clock deadline.
//! When the deadline passes (or the caller's future is dropped) the context
//! is told to cancel: its runtime drops the work future and shuts down.

use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, RecvTimeoutError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Grace period for tasks spawned by the work to wind down.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

static NEXT_CONTEXT: AtomicUsize = AtomicUsize::new(1);

#[derive(Error, Debug)]
pub enum BridgeError<E> {
    #[error("Isolated execution timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("{0}")]
    Failed(E),

    #[error("Isolated execution panicked: {0}")]
    Panicked(String),

    #[error("Failed to start isolated context: {0}")]
    Spawn(String),
}

enum Outcome<O, E> {
    Done(Result<O, E>),
    Panicked(String),
    Cancelled,
    Unavailable(String),
}

impl<O, E> Outcome<O, E> {
    fn into_result(self) -> Result<O, BridgeError<E>> {
        match self {
            Outcome::Done(result) => result.map_err(BridgeError::Failed),
            Outcome::Panicked(message) => Err(BridgeError::Panicked(message)),
            Outcome::Unavailable(message) => Err(BridgeError::Spawn(message)),
            Outcome::Cancelled => Err(BridgeError::Panicked(
                "isolated context cancelled before completion".to_string(),
            )),
        }
    }
}

/// Run `work(input)` on a fresh thread and runtime, waiting at most `timeout`.
///
/// For use from async request handlers: the caller's runtime thread is never
/// blocked.
pub async fn run_isolated<I, O, E, W, Fut>(
    work: W,
    input: I,
    timeout: Duration,
) -> Result<O, BridgeError<E>>
where
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
    W: FnOnce(I) -> Fut + Send + 'static,
    Fut: Future<Output = Result<O, E>> + 'static,
{
    let started = Instant::now();
    let (result_tx, result_rx) = oneshot::channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();

    spawn_context(work, input, cancel_rx, move |outcome| {
        let _ = result_tx.send(outcome);
    })?;

    match tokio::time::timeout(timeout, result_rx).await {
        Ok(Ok(outcome)) => outcome.into_result(),
        Ok(Err(_)) => Err(BridgeError::Panicked(
            "isolated context exited without a result".to_string(),
        )),
        Err(_) => {
            let _ = cancel_tx.send(());
            let elapsed = started.elapsed();
            warn!(elapsed_ms = elapsed.as_millis() as u64, "Isolated execution timed out");
            Err(BridgeError::Timeout { elapsed })
        }
    }
}

/// Blocking form of [`run_isolated`] for synchronous callers.
///
/// Do not call from inside an async runtime worker; it parks the calling
/// thread until the result or the deadline.
pub fn run_isolated_blocking<I, O, E, W, Fut>(
    work: W,
    input: I,
    timeout: Duration,
) -> Result<O, BridgeError<E>>
where
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
    W: FnOnce(I) -> Fut + Send + 'static,
    Fut: Future<Output = Result<O, E>> + 'static,
{
    let started = Instant::now();
    let (result_tx, result_rx) = sync_channel(1);
    let (cancel_tx, cancel_rx) = oneshot::channel();

    spawn_context(work, input, cancel_rx, move |outcome| {
        let _ = result_tx.send(outcome);
    })?;

    match result_rx.recv_timeout(timeout) {
        Ok(outcome) => outcome.into_result(),
        Err(RecvTimeoutError::Disconnected) => Err(BridgeError::Panicked(
            "isolated context exited without a result".to_string(),
        )),
        Err(RecvTimeoutError::Timeout) => {
            let _ = cancel_tx.send(());
            let elapsed = started.elapsed();
            warn!(elapsed_ms = elapsed.as_millis() as u64, "Isolated execution timed out");
            Err(BridgeError::Timeout { elapsed })
        }
    }
}

/// Start the dedicated thread. `deliver` is called exactly once with the outcome.
fn spawn_context<I, O, E, W, Fut, D>(
    work: W,
    input: I,
    cancel_rx: oneshot::Receiver<()>,
    deliver: D,
) -> Result<(), BridgeError<E>>
where
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
    W: FnOnce(I) -> Fut + Send + 'static,
    Fut: Future<Output = Result<O, E>> + 'static,
    D: FnOnce(Outcome<O, E>) + Send + 'static,
{
    let name = format!("isolated-{}", NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed));

    std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    deliver(Outcome::Unavailable(format!("runtime build failed: {e}")));
                    return;
                }
            };
            debug!(context = %name, "Isolated context started");

            let outcome = catch_unwind(AssertUnwindSafe(|| {
                runtime.block_on(async move {
                    // A dropped sender also cancels: the caller went away.
                    tokio::select! {
                        _ = cancel_rx => None,
                        result = work(input) => Some(result),
                    }
                })
            }));

            runtime.shutdown_timeout(SHUTDOWN_GRACE);

            let outcome = match outcome {
                Ok(Some(result)) => Outcome::Done(result),
                Ok(None) => Outcome::Cancelled,
                Err(payload) => Outcome::Panicked(panic_message(payload.as_ref())),
            };
            debug!(context = %name, "Isolated context finished");
            deliver(outcome);
        })
        .map(|_| ())
        .map_err(|e| BridgeError::Spawn(e.to_string()))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn returns_value_unchanged() {
        let out = run_isolated(
            |n: u32| async move { Ok::<_, AgentError>(vec![n, n + 1]) },
            41,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(out, vec![41, 42]);
    }

    #[tokio::test]
    async fn failure_preserves_original_error() {
        let err = run_isolated(
            |_: ()| async { Err::<(), _>(AgentError::Upstream("claude exited 1".to_string())) },
            (),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

        match err {
            BridgeError::Failed(cause) => {
                assert!(cause.is_upstream());
                assert!(cause.to_string().contains("claude exited 1"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_work_times_out() {
        let timeout = Duration::from_millis(50);
        let err = run_isolated(
            |_: ()| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, AgentError>(())
            },
            (),
            timeout,
        )
        .await
        .unwrap_err();

        match err {
            BridgeError::Timeout { elapsed } => assert!(elapsed >= timeout),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_drops_the_work_future() {
        let dropped = Arc::new(AtomicBool::new(false));
        let guard = DropFlag(dropped.clone());

        let result = run_isolated(
            move |_: ()| async move {
                let _guard = guard;
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, AgentError>(())
            },
            (),
            Duration::from_millis(20),
        )
        .await;
        assert!(matches!(result, Err(BridgeError::Timeout { .. })));

        for _ in 0..100 {
            if dropped.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("work future was not dropped after timeout");
    }

    #[tokio::test]
    async fn panic_is_reported() {
        let err = run_isolated(
            |_: ()| async {
                if true {
                    panic!("graph exploded");
                }
                Ok::<(), AgentError>(())
            },
            (),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

        match err {
            BridgeError::Panicked(message) => assert!(message.contains("graph exploded")),
            other => panic!("expected Panicked, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn each_call_gets_its_own_thread() {
        let caller = std::thread::current().id();
        let (name, id) = run_isolated(
            |_: ()| async {
                let current = std::thread::current();
                Ok::<_, AgentError>((current.name().map(str::to_string), current.id()))
            },
            (),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_ne!(id, caller);
        assert!(name.unwrap().starts_with("isolated-"));
    }

    #[tokio::test]
    async fn concurrent_callers_are_independent() {
        let runs = (0..8u64).map(|i| {
            run_isolated(
                move |n: u64| async move {
                    tokio::time::sleep(Duration::from_millis(10 * (8 - n))).await;
                    Ok::<_, AgentError>(n * 10)
                },
                i,
                Duration::from_secs(5),
            )
        });

        let results = futures::future::join_all(runs).await;
        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap(), i as u64 * 10);
        }
    }

    #[test]
    fn blocking_form_returns_value() {
        let out = run_isolated_blocking(
            |s: String| async move { Ok::<_, AgentError>(s.to_uppercase()) },
            "aapl".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(out, "AAPL");
    }

    #[test]
    fn blocking_form_times_out() {
        let err = run_isolated_blocking(
            |_: ()| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, AgentError>(())
            },
            (),
            Duration::from_millis(50),
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::Timeout { .. }));
    }

    #[test]
    fn blocking_form_preserves_failure() {
        let err = run_isolated_blocking(
            |_: ()| async { Err::<(), _>(AgentError::Parse("bad json".to_string())) },
            (),
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Agent response parse error: bad json");
    }
}
