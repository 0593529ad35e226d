use std::sync::Arc;
use std::time::Duration;

use tradegraph_agents::GraphManager;
use tradegraph_models::{GraphConfig, ServerConfig};
use tradegraph_store::ThreadStore;

/// Handler-facing settings derived from configuration.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub service_name: String,
    /// Ceiling on one isolated analysis run.
    pub analysis_timeout: Duration,
    pub keep_alive: Duration,
    pub event_buffer: usize,
}

impl ServerSettings {
    pub fn from_config(server: &ServerConfig, graph: &GraphConfig) -> Self {
        Self {
            service_name: server.service_name.clone(),
            analysis_timeout: Duration::from_secs(graph.timeout_seconds),
            keep_alive: Duration::from_secs(server.keep_alive_seconds),
            event_buffer: server.event_buffer,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default(), &GraphConfig::default())
    }
}

/// Shared state cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub graph: Arc<GraphManager>,
    pub threads: Arc<ThreadStore>,
    pub settings: Arc<ServerSettings>,
}

impl AppState {
    pub fn new(graph: GraphManager, threads: ThreadStore, settings: ServerSettings) -> Self {
        Self {
            graph: Arc::new(graph),
            threads: Arc::new(threads),
            settings: Arc::new(settings),
        }
    }
}
