use axum::extract::State;
use axum::Json;
use tracing::info;

use crate::dto::ResetResponse;
use crate::principal::Principal;
use crate::state::AppState;

/// `POST /admin/graph/reset`: forget the cached graph or construction error.
/// The next request rebuilds it.
pub async fn reset_graph(State(state): State<AppState>, principal: Principal) -> Json<ResetResponse> {
    state.graph.reset().await;
    info!(principal = %principal.id(), "Graph reset by administrator");

    Json(ResetResponse {
        status: "reset",
        graph_initialized: false,
    })
}
