//! Backend pool: an ordered set of servers plus the cursors the round-robin
//! and weighted-round-robin algorithms need to share across selections.
//!
//! The server list itself is guarded by a `tokio::sync::RwLock`: the health
//! checker takes the write lock once per sweep (it never holds two pool
//! locks at once, and a sweep never blocks on a backend dial — see
//! `health.rs`), while every algorithm selection takes only a read lock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::backend::{Server, ServerConfig};

/// A named collection of backends sharing one set of selection cursors.
pub struct ServerPool {
    servers: RwLock<Vec<Arc<Server>>>,
    round_robin_index: AtomicUsize,
    weighted_round_robin_counter: AtomicUsize,
}

impl ServerPool {
    pub fn new(configs: Vec<ServerConfig>) -> Self {
        let servers = configs.into_iter().map(|c| Arc::new(Server::new(c))).collect();
        Self {
            servers: RwLock::new(servers),
            round_robin_index: AtomicUsize::new(0),
            weighted_round_robin_counter: AtomicUsize::new(0),
        }
    }

    pub async fn snapshot(&self) -> Vec<Arc<Server>> {
        self.servers.read().await.clone()
    }

    pub async fn alive_servers(&self) -> Vec<Arc<Server>> {
        self.servers
            .read()
            .await
            .iter()
            .filter(|s| s.is_alive())
            .cloned()
            .collect()
    }

    /// Exposed for the health checker's full-sweep pass; it is the only
    /// actor that takes the pool's write lock.
    pub async fn write_lock(&self) -> tokio::sync::RwLockWriteGuard<'_, Vec<Arc<Server>>> {
        self.servers.write().await
    }

    pub async fn read_lock(&self) -> tokio::sync::RwLockReadGuard<'_, Vec<Arc<Server>>> {
        self.servers.read().await
    }

    pub async fn len(&self) -> usize {
        self.servers.read().await.len()
    }

    /// Current round-robin cursor position, wrapped to `modulus` (the
    /// pool's total length). Does not advance the cursor by itself — the
    /// caller scans from this position for the first Alive server at
    /// position `p` and then reports that choice back via
    /// `set_round_robin_index(p + 1, modulus)`, per spec.md 4.2.1's rule
    /// that the cursor becomes `(p+1) mod len`, not a fixed `+1` per call.
    pub fn round_robin_cursor(&self, modulus: usize) -> usize {
        if modulus == 0 {
            return 0;
        }
        self.round_robin_index.load(Ordering::Acquire) % modulus
    }

    /// Sets the round-robin cursor to `index mod modulus`, so the next
    /// selection starts there.
    pub fn set_round_robin_index(&self, index: usize, modulus: usize) {
        if modulus == 0 {
            return;
        }
        self.round_robin_index.store(index % modulus, Ordering::Release);
    }

    pub fn next_weighted_round_robin_tick(&self) -> usize {
        self.weighted_round_robin_counter.fetch_add(1, Ordering::AcqRel)
    }
}

/// Registry of named L7 pools. Spec 2/6 fixes the set of names to
/// `"static"` and `"dynamic"`; this stays a `HashMap` rather than a fixed
/// struct so a future URL classifier could register more pools without
/// touching callers that look pools up by name.
pub struct PoolRegistry {
    pools: std::collections::HashMap<&'static str, Arc<ServerPool>>,
}

impl PoolRegistry {
    pub fn new(static_backends: Vec<ServerConfig>, dynamic_backends: Vec<ServerConfig>) -> Self {
        let mut pools = std::collections::HashMap::new();
        pools.insert("static", Arc::new(ServerPool::new(static_backends)));
        pools.insert("dynamic", Arc::new(ServerPool::new(dynamic_backends)));
        Self { pools }
    }

    pub fn get(&self, name: &str) -> Option<Arc<ServerPool>> {
        self.pools.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&&'static str, &Arc<ServerPool>)> {
        self.pools.iter()
    }
}
