//! `GET /health`
//!
//! Always answers 200. The first call triggers construction of the shared
//! graph; a construction failure is reported in the body, not propagated.

use axum::extract::State;
use axum::Json;

use crate::dto::HealthResponse;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let service = state.settings.service_name.clone();

    Json(match state.graph.get_resource().await {
        Ok(_) => HealthResponse {
            status: "ok",
            service,
            graph_initialized: true,
            error: None,
        },
        Err(e) => HealthResponse {
            status: "error",
            service,
            graph_initialized: false,
            error: Some(e.message),
        },
    })
}
