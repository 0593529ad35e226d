//! Per-request SSE dispatcher.
//!
//! Events from the graph are encoded into wire frames and written to a
//! bounded outbound channel, with keep-alive comments interleaved while the
//! stream is idle. When the client goes away the request's cancellation
//! token fires and production stops.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tradegraph_models::wire::{keep_alive, serialize};
use tradegraph_models::{EventKind, StreamEvent, WireFrame};

const KEEP_ALIVE_TEXT: &str = "keep-alive";

/// Forward `events` as frames into `frames` until a terminal event, the end
/// of the event channel, or client disconnect.
pub async fn dispatch(
    mut events: mpsc::Receiver<StreamEvent>,
    frames: mpsc::Sender<WireFrame>,
    cancel: CancellationToken,
    keep_alive_every: Duration,
) {
    let period = keep_alive_every.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sent = 0u64;

    loop {
        let (frame, terminal) = tokio::select! {
            _ = frames.closed() => {
                debug!(frames_sent = sent, "Client disconnected");
                cancel.cancel();
                return;
            }
            event = events.recv() => match event {
                Some(event) => {
                    let terminal = matches!(event.kind, EventKind::Final | EventKind::Error);
                    (serialize(&event), terminal)
                }
                None => return,
            },
            _ = ticker.tick() => (keep_alive(KEEP_ALIVE_TEXT), false),
        };

        if frames.send(frame).await.is_err() {
            cancel.cancel();
            return;
        }
        sent += 1;

        if terminal {
            return;
        }
    }
}

/// Start a dispatcher for `events` and wrap its output as a
/// `text/event-stream` response.
pub fn event_stream(
    events: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
    keep_alive_every: Duration,
    buffer: usize,
) -> Response {
    let (frames_tx, frames_rx) = mpsc::channel(buffer.max(1));
    tokio::spawn(dispatch(events, frames_tx, cancel, keep_alive_every));

    let body = ReceiverStream::new(frames_rx).map(|frame| Ok::<_, Infallible>(frame.into_string()));

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}
