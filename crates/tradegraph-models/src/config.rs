use serde::{Deserialize, Serialize};

/// Top-level configuration for tradegraph.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TradegraphConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Configuration for the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Name reported by the health endpoint.
    pub service_name: String,
    /// Interval between keep-alive comments on an idle event stream.
    pub keep_alive_seconds: u64,
    /// Events buffered per stream before the producer is made to wait.
    pub event_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            service_name: "tradegraph".to_string(),
            keep_alive_seconds: 15,
            event_buffer: 64,
        }
    }
}

/// Configuration for the shared analysis graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphConfig {
    /// Hard ceiling on one isolated graph run, in seconds.
    pub timeout_seconds: u64,
    /// Per-agent invocation timeout in seconds.
    pub agent_timeout_seconds: u64,
    /// Model for judging nodes (research manager, risk manager).
    pub deep_think_model: String,
    /// Default model for every other node.
    pub quick_think_model: String,
    /// Program used for agent calls; a bare name is looked up on PATH.
    pub cli_path: String,
    /// Fail graph construction when `cli_path` is not runnable.
    pub require_cli: bool,
    /// Pipeline nodes, in execution order.
    pub nodes: Vec<NodeConfig>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        let node = |name: &str| NodeConfig {
            name: name.to_string(),
            role: name.to_string(),
            model: None,
            enabled: true,
        };

        Self {
            timeout_seconds: 300,
            agent_timeout_seconds: 120,
            deep_think_model: "claude-sonnet-4-5-20250929".to_string(),
            quick_think_model: "claude-3-5-haiku-latest".to_string(),
            cli_path: "claude".to_string(),
            require_cli: true,
            nodes: vec![
                node("market_analyst"),
                node("social_analyst"),
                node("news_analyst"),
                node("fundamentals_analyst"),
                node("bull_researcher"),
                node("bear_researcher"),
                node("research_manager"),
                node("trader"),
                node("risk_manager"),
            ],
        }
    }
}

/// Configuration for a single graph node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    pub name: String,
    /// Which agent role this node plays (selects its system prompt).
    pub role: String,
    /// Override model for this node.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Configuration for the thread/message store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub sqlite_path: String,
    /// Maximum number of threads kept in the in-memory moka cache.
    pub memory_max_capacity: u64,
    /// TTL in seconds for cached thread lookups.
    pub memory_ttl_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/tradegraph.db".to_string(),
            memory_max_capacity: 10_000,
            memory_ttl_seconds: 60,
        }
    }
}
