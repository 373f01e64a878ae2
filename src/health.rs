//! Health check module
//!
//! Runs one background task per pool, forever. Each sweep takes the pool's
//! write lock, dials every server in insertion order with a short connect
//! timeout, and flips Alive accordingly. The write lock is held for the
//! whole sweep — acceptable because a selection only ever needs the read
//! lock for O(servers) work, and the sweep period dominates cold-start
//! latency only.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::constants::{HEALTH_CHECK_CONNECT_TIMEOUT_SECS, HEALTH_CHECK_SWEEP_INTERVAL_SECS};
use crate::pool::ServerPool;

/// Drives the Alive attribute of one pool's servers.
pub struct HealthChecker {
    pool_name: &'static str,
    pool: Arc<ServerPool>,
}

impl HealthChecker {
    pub fn new(pool_name: &'static str, pool: Arc<ServerPool>) -> Self {
        Self { pool_name, pool }
    }

    /// Runs forever until `shutdown` fires. Probe failures are logged but
    /// never propagate: the checker cannot exit on a routine error.
    pub async fn run(&self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            "health checker started for pool \"{}\" ({}s interval, {}s connect timeout)",
            self.pool_name, HEALTH_CHECK_SWEEP_INTERVAL_SECS, HEALTH_CHECK_CONNECT_TIMEOUT_SECS
        );

        let mut ticker = tokio::time::interval(Duration::from_secs(HEALTH_CHECK_SWEEP_INTERVAL_SECS));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                _ = shutdown.recv() => {
                    info!("health checker for pool \"{}\" received shutdown signal", self.pool_name);
                    break;
                }
            }
        }
    }

    /// One full pass over the pool under the write lock.
    async fn sweep(&self) {
        let servers = self.pool.write_lock().await;
        for server in servers.iter() {
            let addr = server.address();
            let probe = timeout(
                Duration::from_secs(HEALTH_CHECK_CONNECT_TIMEOUT_SECS),
                TcpStream::connect(&addr),
            )
            .await;

            let now_ms = now_millis();
            match probe {
                Ok(Ok(_stream)) => {
                    if !server.is_alive() {
                        info!("backend {} in pool \"{}\" is back up", addr, self.pool_name);
                    }
                    server.set_alive(true, now_ms);
                }
                Ok(Err(e)) => {
                    if server.is_alive() {
                        warn!("backend {} in pool \"{}\" failed health check: {}", addr, self.pool_name, e);
                    } else {
                        debug!("backend {} in pool \"{}\" still down: {}", addr, self.pool_name, e);
                    }
                    server.set_alive(false, now_ms);
                }
                Err(_elapsed) => {
                    if server.is_alive() {
                        warn!(
                            "backend {} in pool \"{}\" health check timed out after {}s",
                            addr, self.pool_name, HEALTH_CHECK_CONNECT_TIMEOUT_SECS
                        );
                    }
                    server.set_alive(false, now_ms);
                }
            }
        }
    }
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            error!("system clock is before the unix epoch: {}", e);
            0
        })
}
