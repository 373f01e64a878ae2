//! Application state
//!
//! Holds everything the transport accepter, health checkers, and
//! connection pipeline share for the life of the process. Configuration
//! is loaded once at startup and never swapped, so this holds a plain
//! `Arc<Config>` rather than an atomically swappable cell.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::pool::{PoolRegistry, ServerPool};
use crate::strategy::StrategyEngine;

pub struct AppState {
    config: Arc<Config>,
    listen_addr: SocketAddr,
    l4_pool: Arc<ServerPool>,
    l7_pools: Arc<PoolRegistry>,
    strategy: StrategyEngine,
    shutdown: tokio::sync::broadcast::Sender<()>,
}

impl AppState {
    pub fn new(config: Config, shutdown: tokio::sync::broadcast::Sender<()>) -> Result<Self> {
        let listen_addr = config.listen_addr().context("resolving listen address")?;
        let l4_pool = Arc::new(ServerPool::new(config.l4.clone()));
        let l7_pools = Arc::new(PoolRegistry::new(config.l7.r#static.clone(), config.l7.dynamic.clone()));

        Ok(Self {
            config: Arc::new(config),
            listen_addr,
            l4_pool,
            l7_pools,
            strategy: StrategyEngine::new(),
            shutdown,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn l4_pool(&self) -> &ServerPool {
        &self.l4_pool
    }

    pub fn l4_pool_arc(&self) -> Arc<ServerPool> {
        Arc::clone(&self.l4_pool)
    }

    pub fn l7_pools(&self) -> &PoolRegistry {
        &self.l7_pools
    }

    pub fn strategy(&self) -> &StrategyEngine {
        &self.strategy
    }

    pub fn subscribe_shutdown(&self) -> tokio::sync::broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Sum of ActiveCount across every server in every pool. Used only to
    /// log graceful-shutdown progress; not on any selection hot path.
    pub async fn total_active_connections(&self) -> usize {
        let mut total = 0usize;
        for server in self.l4_pool.snapshot().await {
            total += server.active_count();
        }
        for (_, pool) in self.l7_pools.iter() {
            for server in pool.snapshot().await {
                total += server.active_count();
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ServerConfig;

    fn config_with_backends() -> Config {
        let mut config = Config::new();
        config.l4 = vec![ServerConfig {
            host: "127.0.0.1".into(),
            port: 9000,
            weight: 1,
        }];
        config
    }

    #[test]
    fn new_resolves_listen_addr_and_builds_pools() {
        let (tx, _rx) = tokio::sync::broadcast::channel(4);
        let state = AppState::new(config_with_backends(), tx).unwrap();
        assert_eq!(state.listen_addr().port(), 3000);
    }

    #[test]
    fn trigger_shutdown_wakes_subscribers() {
        let (tx, _rx) = tokio::sync::broadcast::channel(4);
        let state = AppState::new(config_with_backends(), tx).unwrap();
        let mut sub = state.subscribe_shutdown();
        state.trigger_shutdown();
        assert!(sub.try_recv().is_ok());
    }
}
