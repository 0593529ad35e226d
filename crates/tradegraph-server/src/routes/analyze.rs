//! Analysis endpoints.
//!
//! - `POST /analyze` runs the shared graph and answers with the outcome.
//! - `POST /analyze/stream` answers with a live SSE feed of graph events.

use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde_json::json;
use tracing::{info, warn};
use tradegraph_agents::{run_analysis, EventSink, GraphOutcome};
use tradegraph_models::{AnalysisRequest, EventKind};

use crate::dto::{AnalyzeBody, AnalyzeResponse};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::stream::event_stream;

pub async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeBody>, JsonRejection>,
) -> AppResult<Json<AnalyzeResponse>> {
    let Json(body) = body?;
    let request = body.into_request()?;
    let outcome = run_graph(&state, request).await?;
    Ok(Json(outcome.into()))
}

/// Build (or reuse) the shared graph and run one isolated analysis.
pub(crate) async fn run_graph(state: &AppState, request: AnalysisRequest) -> AppResult<GraphOutcome> {
    let started = Instant::now();
    let company = request.company.clone();
    let graph = state.graph.get_resource().await?;

    let outcome = run_analysis(
        graph.resource(),
        request,
        None,
        state.settings.analysis_timeout,
    )
    .await?;

    info!(
        company = %company,
        decision = %outcome.decision,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Analysis served"
    );
    Ok(outcome)
}

pub async fn analyze_stream(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeBody>, JsonRejection>,
) -> AppResult<Response> {
    let Json(body) = body?;
    let request = body.into_request()?;
    let graph = state.graph.get_resource().await?;

    let (sink, events) = EventSink::channel(state.settings.event_buffer);
    let cancel = sink.cancellation();
    let timeout = state.settings.analysis_timeout;
    let company = request.company.clone();

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let run = run_analysis(graph.resource(), request, Some(sink.clone()), timeout);
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(company = %company, "Stream closed by client; analysis cancelled");
                }
                result = run => {
                    if let Err(e) = result {
                        let error = AppError::from(e);
                        warn!(company = %company, error = %error, "Streamed analysis failed");
                        let _ = sink
                            .emit(
                                EventKind::Error,
                                json!({
                                    "message": error.to_string(),
                                    "status": error.status().as_u16(),
                                }),
                            )
                            .await;
                    }
                }
            }
        }
    });

    Ok(event_stream(
        events,
        cancel,
        state.settings.keep_alive,
        state.settings.event_buffer,
    ))
}
