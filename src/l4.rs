//! L4 forwarder: raw TCP splice, no byte interpretation.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{self, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::backend::ConnectionGuard;
use crate::constants::BACKEND_DIAL_TIMEOUT_SECS;
use crate::pool::ServerPool;
use crate::strategy::{Layer, StrategyEngine};

/// Selects an L4 backend, dials it, and splices `client` bidirectionally
/// with it. `client` already carries any peeked-but-unconsumed bytes;
/// this function treats it as an opaque duplex stream.
pub async fn handle(
    mut client: BufReader<TcpStream>,
    client_addr: SocketAddr,
    pool: &ServerPool,
    strategy: &StrategyEngine,
) {
    let algorithm = strategy.select_algorithm(pool, Layer::L4).await;
    let server = match strategy.apply_algorithm(pool, algorithm).await {
        Some(server) => server,
        None => {
            warn!("no healthy L4 backend available for {}", client_addr);
            return;
        }
    };

    let _guard = ConnectionGuard::new(Arc::clone(&server));

    let backend_addr = server.address();
    let mut backend = match timeout(
        Duration::from_secs(BACKEND_DIAL_TIMEOUT_SECS),
        TcpStream::connect(&backend_addr),
    )
    .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            warn!("L4 dial to {} failed for {}: {}", backend_addr, client_addr, e);
            return;
        }
        Err(_elapsed) => {
            warn!(
                "L4 dial to {} timed out after {}s for {}",
                backend_addr, BACKEND_DIAL_TIMEOUT_SECS, client_addr
            );
            return;
        }
    };

    info!("L4 connection established: {} <-> {}", client_addr, backend_addr);

    match io::copy_bidirectional(&mut client, &mut backend).await {
        Ok((to_backend, to_client)) => {
            debug!(
                "L4 connection closed: {}. client->backend {} bytes, backend->client {} bytes",
                client_addr, to_backend, to_client
            );
        }
        Err(e) => {
            debug!("L4 copy error for {}: {}", client_addr, e);
        }
    }
}
