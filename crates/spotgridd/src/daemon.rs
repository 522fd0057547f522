//! Daemon mode: one control loop task plus the read-only API.
//!
//! The `ControlPlane` is moved into a single tokio task, so `reconcile`
//! and `tick` never interleave. The API only sees snapshots published on
//! a `watch` channel after each cycle.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use spotgrid_autoscale::ControlPlane;
use spotgrid_core::FleetConfig;
use spotgrid_state::SystemClock;

pub async fn run_daemon(config: FleetConfig, port: u16) -> anyhow::Result<()> {
    info!("SpotGrid daemon starting");

    let pools = config.pools.clone();
    let plane = ControlPlane::new(config, Arc::new(SystemClock))?;

    // ── Shutdown + snapshot channels ───────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (snapshot_tx, snapshot_rx) = watch::channel(plane.snapshot());

    // ── Control loop ───────────────────────────────────────────

    let control_handle = tokio::spawn(plane.run(snapshot_tx, shutdown_rx));

    // ── API server ─────────────────────────────────────────────

    let router = spotgrid_api::build_router(snapshot_rx, pools);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    let plane = control_handle.await?;
    let snapshot = plane.snapshot();
    info!(
        nodes = snapshot.nodes.len(),
        pods = snapshot.pods.len(),
        "SpotGrid daemon stopped"
    );
    Ok(())
}
