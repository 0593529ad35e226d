use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tradegraph_models::{EventKind, StreamEvent};

use crate::error::AgentError;

/// Producer side of one request's event stream.
///
/// Stamps sequence numbers (starting at 1) and timestamps. Sends wait when
/// the bounded channel is full, so a slow consumer only stalls its own run.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
    next_sequence: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<StreamEvent>, cancel: CancellationToken) -> Self {
        Self {
            tx,
            next_sequence: Arc::new(AtomicU64::new(1)),
            cancel,
        }
    }

    /// Create a sink and its receiving end.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx, CancellationToken::new()), rx)
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Emit one event. Fails with [`AgentError::Cancelled`] once the consumer
    /// has gone away.
    pub async fn emit(&self, kind: EventKind, payload: serde_json::Value) -> Result<(), AgentError> {
        if self.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let event = StreamEvent {
            kind,
            sequence_number: self.next_sequence.fetch_add(1, Ordering::SeqCst),
            timestamp: Utc::now(),
            payload,
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Err(AgentError::Cancelled),
            sent = self.tx.send(event) => sent.map_err(|_| {
                self.cancel.cancel();
                AgentError::Cancelled
            }),
        }
    }
}
