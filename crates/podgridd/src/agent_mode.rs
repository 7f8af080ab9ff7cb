//! Agent mode — heartbeats for one node until Ctrl-C.
//!
//! This is what the process and docker launchers run for each node.

use std::time::Duration;

use podgrid_cluster::{AgentConfig, NodeAgent};
use tokio::sync::watch;
use tracing::{error, info};

/// Run the heartbeat agent for `node_id`.
pub async fn run_agent(node_id: String, server: String, interval: Duration) -> anyhow::Result<()> {
    info!(%node_id, %server, "podgrid agent starting");

    let mut config = AgentConfig::new(node_id, server);
    config.interval = interval;
    let agent = NodeAgent::new(config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let heartbeat_handle = tokio::spawn(async move {
        agent.run(shutdown_rx).await;
    });

    // ── Wait for shutdown ────────────────────────────────────────
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = heartbeat_handle.await;
    info!("agent stopped");
    Ok(())
}
