//! Chat thread endpoints. Every route is scoped to the calling principal;
//! a thread owned by someone else is indistinguishable from a missing one.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;
use tradegraph_models::{ChatMessage, Thread, TurnRole};
use uuid::Uuid;

use crate::dto::{
    validate, AnalyzeResponse, CreateThreadBody, ThreadAnalyzeBody, ThreadAnalyzeResponse,
};
use crate::error::{AppError, AppResult};
use crate::principal::Principal;
use crate::routes::analyze::run_graph;
use crate::state::AppState;

const DEFAULT_TITLE: &str = "New analysis";

pub async fn create_thread(
    State(state): State<AppState>,
    principal: Principal,
    body: Result<Json<CreateThreadBody>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Thread>)> {
    let Json(body) = body?;
    let title = match body.title.trim() {
        "" => DEFAULT_TITLE,
        title => title,
    };
    let thread = state.threads.create_thread(principal.id(), title).await?;
    Ok((StatusCode::CREATED, Json(thread)))
}

pub async fn list_threads(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<Vec<Thread>>> {
    Ok(Json(state.threads.list_threads(principal.id())?))
}

pub async fn get_thread(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> AppResult<Json<Thread>> {
    Ok(Json(owned_thread(&state, &principal, &id).await?))
}

pub async fn get_messages(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<ChatMessage>>> {
    let thread = owned_thread(&state, &principal, &id).await?;
    Ok(Json(state.threads.get_messages_by_thread(thread.id)?))
}

/// Run an analysis with the thread's history as conversation context, and
/// record the prompt and the decision as new messages.
pub async fn analyze_in_thread(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    body: Result<Json<ThreadAnalyzeBody>, JsonRejection>,
) -> AppResult<Json<ThreadAnalyzeResponse>> {
    let thread = owned_thread(&state, &principal, &id).await?;
    let Json(body) = body?;
    let request = validate(&body.company_name, &body.trade_date)?;

    let history: Vec<_> = state
        .threads
        .get_messages_by_thread(thread.id)?
        .iter()
        .map(ChatMessage::to_turn)
        .collect();

    let prompt = body.prompt.unwrap_or_else(|| {
        format!(
            "Analyze {} for trading on {}",
            request.company, request.trade_date
        )
    });
    state
        .threads
        .save_message(thread.id, TurnRole::User, &prompt)
        .await?;

    let outcome = run_graph(&state, request.with_conversation(history)).await?;

    state
        .threads
        .save_message(
            thread.id,
            TurnRole::Assistant,
            &format!("{}: {}", outcome.company, outcome.decision),
        )
        .await?;
    info!(thread_id = %thread.id, decision = %outcome.decision, "Thread analysis saved");

    let response = AnalyzeResponse::from(outcome);
    Ok(Json(ThreadAnalyzeResponse {
        thread_id: thread.id,
        company: response.company,
        decision: response.decision,
        state: response.state,
    }))
}

async fn owned_thread(state: &AppState, principal: &Principal, id: &str) -> AppResult<Thread> {
    let not_found = || AppError::NotFound(format!("thread {id}"));
    let id = Uuid::parse_str(id).map_err(|_| not_found())?;
    state
        .threads
        .get_thread(id, principal.id())
        .await?
        .ok_or_else(not_found)
}
