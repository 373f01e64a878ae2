//! Supervisor module
//!
//! Owns the process-level lifecycle: PID guard, initial config load,
//! spawning the transport accepter and one health checker per pool,
//! SIGTERM/SIGINT handling, and a timeout-bounded graceful shutdown.
//! There is no SIGHUP/reload path — configuration is immutable after
//! startup — and no fork/daemonize; the process always runs in the
//! foreground under whatever supervises it (systemd, a shell, etc.).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;
use tokio::time::timeout;

use crate::config::Config;
use crate::constants::GRACEFUL_SHUTDOWN_TIMEOUT_SECS;
use crate::health::HealthChecker;
use crate::process::PidFileGuard;
use crate::state::AppState;
use crate::transport::TransportAccepter;

pub async fn run_foreground(cli_config_path: Option<&Path>) -> Result<()> {
    let _pid_guard = PidFileGuard::new().context("failed to create PID file - check if already running")?;

    info!("bifrost starting (PID: {})", std::process::id());

    let config_path = Config::resolve_config_path(cli_config_path)?;
    let config = Config::load_from_file(&config_path)
        .await
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    info!("configuration loaded: {}", config_path.display());
    info!("  - listen: {}", config.listen);
    info!("  - l4 backends: {}", config.l4.len());
    info!("  - l7 static backends: {}", config.l7.r#static.len());
    info!("  - l7 dynamic backends: {}", config.l7.dynamic.len());

    let (shutdown_tx, _) = broadcast::channel(16);
    let state = Arc::new(AppState::new(config, shutdown_tx)?);

    let mut sigterm = signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;

    info!("signal handlers registered (SIGTERM, SIGINT)");

    let transport_state = Arc::clone(&state);
    let transport_handle = tokio::spawn(async move {
        let accepter = TransportAccepter::new(transport_state.clone());
        if let Err(e) = accepter.run(transport_state.subscribe_shutdown()).await {
            error!("transport accepter error: {}", e);
        }
    });

    let mut health_handles = Vec::new();
    {
        let checker = HealthChecker::new("l4", state.l4_pool_arc());
        let shutdown_rx = state.subscribe_shutdown();
        health_handles.push(tokio::spawn(async move {
            checker.run(shutdown_rx).await;
        }));
    }
    for (name, pool) in state.l7_pools().iter() {
        let checker = HealthChecker::new(*name, Arc::clone(pool));
        let shutdown_rx = state.subscribe_shutdown();
        health_handles.push(tokio::spawn(async move {
            checker.run(shutdown_rx).await;
        }));
    }

    info!("all service tasks started");

    tokio::select! {
        _ = sigterm.recv() => {
            info!("SIGTERM received - starting graceful shutdown");
        }
        _ = sigint.recv() => {
            info!("SIGINT received - starting graceful shutdown");
        }
    }

    graceful_shutdown(state, transport_handle, health_handles).await?;

    info!("bifrost shutdown complete");
    Ok(())
}

async fn graceful_shutdown(
    state: Arc<AppState>,
    transport_handle: tokio::task::JoinHandle<()>,
    health_handles: Vec<tokio::task::JoinHandle<()>>,
) -> Result<()> {
    info!("sending shutdown signal to all services");
    state.trigger_shutdown();

    let active = state.total_active_connections().await;
    if active > 0 {
        info!("waiting for {} active connections...", active);
    }

    let shutdown_result = timeout(Duration::from_secs(GRACEFUL_SHUTDOWN_TIMEOUT_SECS), async {
        if let Err(e) = transport_handle.await {
            error!("transport task termination error: {}", e);
        }
        for handle in health_handles {
            if let Err(e) = handle.await {
                error!("health checker task termination error: {}", e);
            }
        }

        loop {
            let active = state.total_active_connections().await;
            if active == 0 {
                break;
            }
            debug!("{} active connections remaining...", active);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await;

    match shutdown_result {
        Ok(()) => info!("all connections closed successfully"),
        Err(_) => warn!(
            "graceful shutdown timeout ({} seconds); forcing stop",
            GRACEFUL_SHUTDOWN_TIMEOUT_SECS
        ),
    }

    Ok(())
}
