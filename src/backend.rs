//! Backend server model
//!
//! A `Server` represents one backend target, shared by the L4 pool and
//! every named L7 pool. State that changes while the proxy runs
//! (ActiveCount, Alive, LastChecked) lives in atomics so the strategy
//! engine's predicates and the connection pipeline's accounting never
//! need an uncontended per-server lock — only the pool's membership list
//! is guarded by a lock (see `pool.rs`).

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

/// Immutable identity and weight of a backend, as loaded from config.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn to_socket_addr(&self) -> Result<SocketAddr> {
        let addr_str = self.address();
        addr_str
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid backend address: {}", addr_str))
    }
}

/// One backend target.
///
/// `weight` and `address` are immutable after construction. `active_count`,
/// `alive` and `last_checked_ms` are mutated concurrently by the health
/// checker and the connection pipeline and so are atomics.
#[derive(Debug)]
pub struct Server {
    pub config: ServerConfig,
    active_count: AtomicUsize,
    alive: AtomicBool,
    last_checked_ms: AtomicU64,
    /// Reserved for future affinity use. None of the current
    /// algorithms read or write this set.
    sticky_clients: Mutex<HashSet<String>>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            active_count: AtomicUsize::new(0),
            // Considered alive until the first health sweep says otherwise.
            alive: AtomicBool::new(true),
            last_checked_ms: AtomicU64::new(0),
            sticky_clients: Mutex::new(HashSet::new()),
        }
    }

    pub fn weight(&self) -> u32 {
        self.config.weight.max(1)
    }

    pub fn address(&self) -> String {
        self.config.address()
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.active_count.load(Ordering::Acquire)
    }

    /// Increments the active-connection count. Must be paired with
    /// exactly one `decrement_active` per selection.
    #[inline]
    pub fn increment_active(&self) {
        self.active_count.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub fn decrement_active(&self) {
        let prev = self.active_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "ActiveCount underflow for {}", self.address());
        if prev == 0 {
            // Defensive: never let the counter go negative even if a caller
            // violates the increment/decrement pairing invariant.
            self.active_count.store(0, Ordering::Release);
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_alive(&self, alive: bool, now_ms: u64) {
        self.alive.store(alive, Ordering::Release);
        self.last_checked_ms.store(now_ms, Ordering::Release);
    }

    pub fn last_checked_ms(&self) -> u64 {
        self.last_checked_ms.load(Ordering::Acquire)
    }

    pub fn sticky_clients(&self) -> &Mutex<HashSet<String>> {
        &self.sticky_clients
    }
}

/// RAII guard incrementing the active-connection count on creation and
/// decrementing it on drop, so every early-return exit path in the
/// connection pipeline still decrements exactly once.
pub struct ConnectionGuard {
    server: Arc<Server>,
}

impl ConnectionGuard {
    pub fn new(server: Arc<Server>) -> Self {
        server.increment_active();
        Self { server }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.server.decrement_active();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(host: &str, port: u16, weight: u32) -> ServerConfig {
        ServerConfig {
            host: host.to_string(),
            port,
            weight,
        }
    }

    #[test]
    fn starts_alive_with_zero_active_count() {
        let server = Server::new(cfg("127.0.0.1", 9000, 1));
        assert!(server.is_alive());
        assert_eq!(server.active_count(), 0);
    }

    #[test]
    fn connection_guard_increments_and_decrements_exactly_once() {
        let server = Arc::new(Server::new(cfg("127.0.0.1", 9000, 1)));
        {
            let _guard = ConnectionGuard::new(Arc::clone(&server));
            assert_eq!(server.active_count(), 1);
            {
                let _guard2 = ConnectionGuard::new(Arc::clone(&server));
                assert_eq!(server.active_count(), 2);
            }
            assert_eq!(server.active_count(), 1);
        }
        assert_eq!(server.active_count(), 0);
    }

    #[test]
    fn set_alive_updates_last_checked() {
        let server = Server::new(cfg("127.0.0.1", 9000, 1));
        server.set_alive(false, 42);
        assert!(!server.is_alive());
        assert_eq!(server.last_checked_ms(), 42);
    }

    #[test]
    fn weight_floors_to_one() {
        let server = Server::new(cfg("127.0.0.1", 9000, 0));
        assert_eq!(server.weight(), 1);
    }
}
