//! Serve mode — runs the cluster manager, failure detector and REST API.
//!
//! In this mode, the daemon:
//! 1. Opens the redb state store under the data directory
//! 2. Builds the configured agent launcher
//! 3. Runs the failure detector loop in the background
//! 4. Serves the REST API and dashboard until Ctrl-C

use std::sync::Arc;

use podgrid_cluster::{AgentLauncher, ClusterManager, DockerLauncher, NoopLauncher, ProcessLauncher};
use podgrid_dashboard::{DashboardState, dashboard_router};
use podgrid_health::FailureDetector;
use podgrid_state::{StateStore, SystemClock};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::{LauncherKind, ServeSettings};

/// Run the control plane until shutdown.
pub async fn run_control_plane(settings: ServeSettings) -> anyhow::Result<()> {
    info!("podgrid daemon starting");
    std::fs::create_dir_all(&settings.data_dir)?;

    // ── State store ──────────────────────────────────────────────
    let db_path = settings.data_dir.join("podgrid.redb");
    let state = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    // ── Cluster manager ──────────────────────────────────────────
    let launcher = build_launcher(&settings)?;
    info!(launcher = launcher.name(), callback_url = %settings.callback_url, "agent launcher ready");
    let clock = Arc::new(SystemClock);
    let cluster = Arc::new(
        ClusterManager::new(state.clone(), launcher, settings.callback_url.clone())
            .with_clock(clock.clone()),
    );

    // ── Background tasks ─────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let detector = FailureDetector::new(state.clone(), clock)
        .with_stale_threshold(settings.stale_threshold)
        .with_interval(settings.sweep_interval);
    let detector_handle = tokio::spawn(async move {
        detector.run(shutdown_rx).await;
    });

    // ── REST API + dashboard ─────────────────────────────────────
    let router = podgrid_api::build_router(Arc::clone(&cluster))
        .merge(dashboard_router(DashboardState { store: state }));
    info!(addr = %settings.addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(settings.addr).await?;

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
        if shutdown_tx.send(true).is_err() {
            warn!("failure detector already stopped");
        }
    });

    server.await?;

    if let Err(e) = detector_handle.await {
        error!(error = %e, "failure detector task ended abnormally");
    }

    info!("podgrid daemon stopped");
    Ok(())
}

fn build_launcher(settings: &ServeSettings) -> anyhow::Result<Arc<dyn AgentLauncher>> {
    let launcher: Arc<dyn AgentLauncher> = match settings.launcher {
        LauncherKind::None => Arc::new(NoopLauncher),
        LauncherKind::Process => Arc::new(ProcessLauncher::current_exe(settings.heartbeat_interval)?),
        LauncherKind::Docker => Arc::new(
            DockerLauncher::new(settings.docker_image.clone())
                .with_binary(settings.docker_binary.clone())
                .with_timeout(settings.launch_timeout),
        ),
    };
    Ok(launcher)
}
