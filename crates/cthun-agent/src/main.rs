//! Cthun Agent Binary
//!
//! Reads inbound messages as JSON lines on stdin and writes responses as
//! JSON lines on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cthun_agent::{modules, AgentConfig, AgentLoop, JobStore, RequestProcessor, StreamConnector};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AgentConfig::load().context("Failed to load agent configuration")?;

    // Initialize tracing
    let filter = match &config.log_filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Cthun agent with spool {:?}", config.spool_dir);

    let store = Arc::new(
        JobStore::open(&config.spool_dir)
            .await
            .with_context(|| format!("Failed to open spool directory {:?}", config.spool_dir))?,
    );
    let registry = modules::build_registry(&config, Arc::clone(&store))
        .await
        .context("Failed to register modules")?;

    let connector = Arc::new(StreamConnector::new(tokio::io::stdout()));
    let processor = Arc::new(RequestProcessor::new(connector, Arc::new(registry), store));

    let mut agent = AgentLoop::new(tokio::io::stdin(), processor);
    if let Err(e) = agent.run().await {
        error!("Agent error: {:#}", e);
        std::process::exit(1);
    }

    info!("Agent shutting down");
    Ok(())
}
