//! HTTP and SSE surface for the tradegraph analysis service.
//!
//! Handlers share one lazily built analysis graph (through
//! [`tradegraph_agents::GraphManager`]) and one thread store. Each analysis
//! runs in its own isolated execution context; streamed runs get their own
//! bounded event channel and dispatcher.

pub mod app;
pub mod dto;
pub mod error;
pub mod principal;
pub mod routes;
pub mod state;
pub mod stream;

pub use app::create_app;
pub use error::{AppError, AppResult};
pub use principal::{Principal, PRINCIPAL_HEADER};
pub use state::{AppState, ServerSettings};
