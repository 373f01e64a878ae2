//! Strategy engine: algorithm registry, selection policy, and the four
//! balancing algorithms themselves.
//!
//! `SelectAlgorithm` decides *which* algorithm a given pool/layer should
//! use right now; `ApplyAlgorithm` runs that algorithm against the pool.
//! Callers invoke them back to back — between the two calls the pool may
//! change, which is fine, since both read only Alive and ActiveCount.

use std::sync::Arc;

use crate::backend::Server;
use crate::constants::LOAD_IMBALANCE_THRESHOLD;
use crate::pool::ServerPool;

/// Which side of the dual-layer proxy a selection is being made for. L4
/// ignores load imbalance when picking an algorithm; L7 honors it. This
/// asymmetry is intentional (see DESIGN.md open question a).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    L4,
    L7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmName {
    RoundRobin,
    WeightedRoundRobin,
    LeastConnection,
    WeightedLeastConnection,
}

impl AlgorithmName {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmName::RoundRobin => "round_robin",
            AlgorithmName::WeightedRoundRobin => "weighted_round_robin",
            AlgorithmName::LeastConnection => "least_connection",
            AlgorithmName::WeightedLeastConnection => "weighted_least_connection",
        }
    }

    fn from_str(name: &str) -> Option<Self> {
        match name {
            "round_robin" => Some(AlgorithmName::RoundRobin),
            "weighted_round_robin" => Some(AlgorithmName::WeightedRoundRobin),
            "least_connection" => Some(AlgorithmName::LeastConnection),
            "weighted_least_connection" => Some(AlgorithmName::WeightedLeastConnection),
            _ => None,
        }
    }
}

/// Owns the process-level pieces of the engine that must not be
/// reconstructed per call: right now that is nothing stateful (the
/// weighted-round-robin counter and round-robin cursor both live on
/// `ServerPool`), but keeping an explicit engine object is what the
/// strategy-engine design note asks for, and gives future stateful
/// algorithms somewhere to live.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrategyEngine;

impl StrategyEngine {
    pub fn new() -> Self {
        Self
    }

    /// Pure function of pool state. Takes the pool read lock for the
    /// duration of both predicates.
    pub async fn select_algorithm(&self, pool: &ServerPool, layer: Layer) -> AlgorithmName {
        let servers = pool.read_lock().await;
        let uneven = has_uneven_weights(&servers);
        match layer {
            Layer::L4 => {
                if uneven {
                    AlgorithmName::WeightedLeastConnection
                } else {
                    AlgorithmName::LeastConnection
                }
            }
            Layer::L7 => {
                let imbalanced = has_load_imbalance(&servers);
                match (imbalanced, uneven) {
                    (true, true) => AlgorithmName::WeightedLeastConnection,
                    (true, false) => AlgorithmName::LeastConnection,
                    (false, true) => AlgorithmName::WeightedRoundRobin,
                    (false, false) => AlgorithmName::RoundRobin,
                }
            }
        }
    }

    /// Looks `name` up in the algorithm registry and runs it. An unknown
    /// name (never produced by `select_algorithm`, but reachable if a
    /// caller passes one in directly) logs and returns `None`, which the
    /// caller treats the same as "no healthy server".
    pub async fn apply_algorithm(&self, pool: &ServerPool, name: AlgorithmName) -> Option<Arc<Server>> {
        match name {
            AlgorithmName::RoundRobin => round_robin(pool).await,
            AlgorithmName::WeightedRoundRobin => weighted_round_robin(pool).await,
            AlgorithmName::LeastConnection => least_connection(pool).await,
            AlgorithmName::WeightedLeastConnection => weighted_least_connection(pool).await,
        }
    }

    /// Applies an algorithm named by raw string, for callers (e.g. the
    /// `check` CLI) that want to name an algorithm without going through
    /// `select_algorithm`.
    pub async fn apply_algorithm_named(&self, pool: &ServerPool, name: &str) -> Option<Arc<Server>> {
        match AlgorithmName::from_str(name) {
            Some(algo) => self.apply_algorithm(pool, algo).await,
            None => {
                log::warn!("unknown balancing algorithm requested: {}", name);
                None
            }
        }
    }
}

/// ∃ i>0 such that Weight[i] ≠ Weight[0]. Empty or single-server pool → false.
fn has_uneven_weights(servers: &[Arc<Server>]) -> bool {
    match servers.first() {
        None => false,
        Some(first) => servers.iter().any(|s| s.weight() != first.weight()),
    }
}

/// max(ActiveCount) − min(ActiveCount) ≥ threshold, over all servers.
/// Pool with <2 servers → false.
fn has_load_imbalance(servers: &[Arc<Server>]) -> bool {
    if servers.len() < 2 {
        return false;
    }
    let mut min = usize::MAX;
    let mut max = 0usize;
    for s in servers {
        let active = s.active_count();
        min = min.min(active);
        max = max.max(active);
    }
    max.saturating_sub(min) >= LOAD_IMBALANCE_THRESHOLD
}

/// Starting at the pool's Index cursor, scan at most len(pool) positions
/// with wraparound; the first Alive server at position p is returned and
/// the cursor advances to (p+1) mod len.
async fn round_robin(pool: &ServerPool) -> Option<Arc<Server>> {
    let servers = pool.read_lock().await;
    let len = servers.len();
    if len == 0 {
        return None;
    }
    let start = pool.round_robin_cursor(len);
    for offset in 0..len {
        let idx = (start + offset) % len;
        if servers[idx].is_alive() {
            pool.set_round_robin_index(idx + 1, len);
            return Some(Arc::clone(&servers[idx]));
        }
    }
    None
}

/// Stateful via the pool's internal counter c. T = sum of Weight over
/// Alive servers; if T=0, NONE. c advances by one (mod T) per call, then
/// the pool is scanned in insertion order accumulating weight until the
/// running sum exceeds c.
async fn weighted_round_robin(pool: &ServerPool) -> Option<Arc<Server>> {
    let servers = pool.read_lock().await;
    let total: u32 = servers.iter().filter(|s| s.is_alive()).map(|s| s.weight()).sum();
    if total == 0 {
        return None;
    }
    let tick = pool.next_weighted_round_robin_tick();
    let c = (tick as u64 % total as u64) as u32;
    let mut acc: u32 = 0;
    for server in servers.iter() {
        if !server.is_alive() {
            continue;
        }
        acc += server.weight();
        if c < acc {
            return Some(Arc::clone(server));
        }
    }
    None
}

/// Smallest ActiveCount wins; ties resolve to the earlier-listed server.
async fn least_connection(pool: &ServerPool) -> Option<Arc<Server>> {
    let servers = pool.read_lock().await;
    let mut best: Option<&Arc<Server>> = None;
    let mut best_count = usize::MAX;
    for server in servers.iter() {
        if !server.is_alive() {
            continue;
        }
        let count = server.active_count();
        if count < best_count {
            best_count = count;
            best = Some(server);
        }
    }
    best.cloned()
}

/// Same scan as least_connection, but the comparison key is
/// floor(ActiveCount / Weight). Tie-break: earlier-listed wins.
async fn weighted_least_connection(pool: &ServerPool) -> Option<Arc<Server>> {
    let servers = pool.read_lock().await;
    let mut best: Option<&Arc<Server>> = None;
    let mut best_score = u64::MAX;
    for server in servers.iter() {
        if !server.is_alive() {
            continue;
        }
        let score = server.active_count() as u64 / server.weight() as u64;
        if score < best_score {
            best_score = score;
            best = Some(server);
        }
    }
    best.cloned()
}

/// 32-bit FNV-1a over the host bytes of a "host:port" identifier.
/// Auxiliary helper: does not consult Alive, not part of the default
/// selection pipeline.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
    const FNV_PRIME: u32 = 0x01000193;
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Splits `client_id` ("host:port") on the last colon, hashes the host
/// part, and returns `pool[hash mod len]` regardless of Alive.
pub async fn select_by_ip_hash(pool: &ServerPool, client_id: &str) -> Option<Arc<Server>> {
    let servers = pool.read_lock().await;
    if servers.is_empty() {
        return None;
    }
    let host = client_id.rsplit_once(':').map(|(h, _)| h).unwrap_or(client_id);
    let hash = fnv1a_32(host.as_bytes());
    let idx = (hash as usize) % servers.len();
    Some(Arc::clone(&servers[idx]))
}
