//! tradegraph: a multi-agent trading analysis service.
//!
//! A shared analysis graph is built lazily on first use and then serves every
//! request. Analyses run in isolated execution contexts with a wall-clock
//! deadline, and their progress can be streamed to clients as Server-Sent
//! Events.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use tradegraph::models::TradegraphConfig;
//! use tradegraph::server::create_app;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = TradegraphConfig::default();
//! let app = create_app(tradegraph::build_state(&config)?);
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

pub use tradegraph_agents as agents;
pub use tradegraph_models as models;
pub use tradegraph_server as server;
pub use tradegraph_store as store;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tradegraph_agents::{GraphFactory, GraphManager};
use tradegraph_models::TradegraphConfig;
use tradegraph_server::{AppState, ServerSettings};
use tradegraph_store::{SqliteStore, ThreadStore};

/// Build the shared application state from configuration.
///
/// The analysis graph is not constructed here; that happens on first use.
pub fn build_state(config: &TradegraphConfig) -> anyhow::Result<AppState> {
    let sqlite_path = &config.store.sqlite_path;
    if let Some(parent) = Path::new(sqlite_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let sqlite = SqliteStore::open(sqlite_path)
        .with_context(|| format!("Failed to open thread store: {sqlite_path}"))?;
    let threads = ThreadStore::new(
        sqlite,
        config.store.memory_max_capacity,
        Duration::from_secs(config.store.memory_ttl_seconds),
    );

    let graph = GraphManager::new(Arc::new(GraphFactory::with_claude_cli(config.graph.clone())));
    let settings = ServerSettings::from_config(&config.server, &config.graph);

    Ok(AppState::new(graph, threads, settings))
}

/// Parse a TOML configuration document.
pub fn parse_config(text: &str) -> anyhow::Result<TradegraphConfig> {
    toml::from_str(text).context("Failed to parse config")
}
