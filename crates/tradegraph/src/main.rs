use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tradegraph_models::TradegraphConfig;

const DEFAULT_CONFIG: &str = "config/tradegraph.toml";

#[derive(Parser, Debug)]
#[command(name = "tradegraph", about = "Multi-agent trading analysis server")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: String,

    /// Override the configured bind address (host:port)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG wins; default to info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }

    let state = tradegraph::build_state(&config).context("Failed to build application state")?;
    let app = tradegraph_server::create_app(state);

    let listener = TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(
        addr = %config.server.bind_addr,
        nodes = config.graph.nodes.iter().filter(|n| n.enabled).count(),
        "tradegraph listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("tradegraph stopped");
    Ok(())
}

fn load_config(path: &str) -> Result<TradegraphConfig> {
    match std::fs::read_to_string(path) {
        Ok(text) => tradegraph::parse_config(&text).with_context(|| format!("Invalid config: {path}")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && path == DEFAULT_CONFIG => {
            warn!(path, "Config file not found; using defaults");
            Ok(TradegraphConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read config: {path}")),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
