//! Axum application builder.
//!
//! Routes:
//! - `GET /health`
//! - `POST /analyze`, `POST /analyze/stream`
//! - `POST /threads`, `GET /threads`, `GET /threads/{id}`,
//!   `GET /threads/{id}/messages`, `POST /threads/{id}/analyze`
//! - `POST /admin/graph/reset`

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::{admin, analyze, health, threads};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health::health))
        .route("/analyze", post(analyze::analyze))
        .route("/analyze/stream", post(analyze::analyze_stream))
        .route(
            "/threads",
            post(threads::create_thread).get(threads::list_threads),
        )
        .route("/threads/{id}", get(threads::get_thread))
        .route("/threads/{id}/messages", get(threads::get_messages))
        .route("/threads/{id}/analyze", post(threads::analyze_in_thread))
        .route("/admin/graph/reset", post(admin::reset_graph))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
