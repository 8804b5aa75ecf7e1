//! Chat node entry point
//!
//! Run with:
//! ```bash
//! cargo run -p chat-node
//! ```
//!
//! Configuration is loaded from environment variables (and `.env`).

use anyhow::Context;
use chat_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %format!("{e:#}"), "Chat node failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;

    if let Err(e) = try_init_tracing_with_config(&TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.app.env,
        node = %config.node.name,
        port = config.node.port,
        peer_port = config.node.peer_port,
        peers = config.peers.nodes.len(),
        "Configuration loaded"
    );

    chat_node::run(config).await.context("node stopped with an error")?;
    Ok(())
}
