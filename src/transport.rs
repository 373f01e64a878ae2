//! Transport accepter (C4): binds the listener, runs the perpetual accept
//! loop, and dispatches each connection to the L4 or L7 path after peeking
//! its first bytes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};

use crate::classify::{classify, Protocol};
use crate::constants::CLASSIFY_PEEK_BYTES;
use crate::state::AppState;
use crate::{l4, l7};

/// Bound on how long `peek_prefix` will wait for a slow sender to fill
/// out the classification prefix before giving up and routing on
/// whatever arrived.
const PEEK_STABLE_POLL_MS: u64 = 5;

pub struct TransportAccepter {
    state: Arc<AppState>,
}

impl TransportAccepter {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Binds the listener and accepts forever. A single failed accept is
    /// logged and does not bring the loop down; only a bind failure is
    /// fatal (spec 7, cases 1/2).
    pub async fn run(&self, mut shutdown: tokio::sync::broadcast::Receiver<()>) -> Result<()> {
        let addr = self.state.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind listener on {}", addr))?;

        info!("listening on {}", addr);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, client_addr)) => {
                            let state = Arc::clone(&self.state);
                            tokio::spawn(async move {
                                handle_connection(stream, client_addr, state).await;
                            });
                        }
                        Err(e) => {
                            error!("accept failed: {}", e);
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("transport accepter received shutdown signal; no longer accepting");
                    break;
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection(stream: TcpStream, client_addr: SocketAddr, state: Arc<AppState>) {
    let peeked = match peek_prefix(&stream).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("peek failed for {}: {}", client_addr, e);
            return;
        }
    };

    // The peek above uses MSG_PEEK, so nothing has actually been drained
    // from the socket; wrapping it now hands the chosen path a reader
    // that still contains the peeked bytes (spec 4.3 step 3).
    let reader = BufReader::new(stream);

    match classify(&peeked) {
        Protocol::Http => {
            l7::handle(reader, client_addr, state.l7_pools(), state.strategy()).await;
        }
        Protocol::Tcp => {
            l4::handle(reader, client_addr, state.l4_pool(), state.strategy()).await;
        }
    }
}

/// Peeks at most `CLASSIFY_PEEK_BYTES` off `stream` without consuming them.
/// Keeps re-peeking while more bytes keep arriving; stops once the prefix
/// is full or two consecutive peeks return the same byte count (the peer
/// closed, or is not sending any more right now): peeks exactly 16 bytes,
/// or fewer if the peer closes first.
async fn peek_prefix(stream: &TcpStream) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; CLASSIFY_PEEK_BYTES];
    let mut previous: Option<usize> = None;
    loop {
        let n = stream.peek(&mut buf).await?;
        if n >= CLASSIFY_PEEK_BYTES || previous == Some(n) {
            buf.truncate(n);
            return Ok(buf);
        }
        previous = Some(n);
        tokio::time::sleep(Duration::from_millis(PEEK_STABLE_POLL_MS)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn peek_prefix_returns_up_to_limit_without_consuming() {
        let data = b"GET /a HTTP/1.1\r\nHost: x\r\n\r\n".to_vec();
        let stream = tokio_test_stream(data.clone()).await;
        let peeked = peek_prefix(&stream).await.unwrap();
        assert_eq!(peeked.len(), CLASSIFY_PEEK_BYTES);
        assert_eq!(&peeked, &data[..CLASSIFY_PEEK_BYTES]);

        // Bytes remain available for a subsequent full read.
        let mut reader = BufReader::new(stream);
        let mut rest = Vec::new();
        use tokio::io::AsyncReadExt;
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, data);
    }

    #[tokio::test]
    async fn peek_prefix_handles_short_connection() {
        let data = b"HI".to_vec();
        let stream = tokio_test_stream(data.clone()).await;
        let peeked = peek_prefix(&stream).await.unwrap();
        assert_eq!(peeked, data);
    }

    async fn tokio_test_stream(data: Vec<u8>) -> TcpStream {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let writer = tokio::spawn(async move {
            let mut client = TcpStream::connect(addr).await.unwrap();
            client.write_all(&data).await.unwrap();
            client.shutdown().await.unwrap();
            // Keep the task alive briefly so the peer sees EOF only after
            // the reader has had a chance to peek the sent bytes.
            tokio::time::sleep(Duration::from_millis(20)).await;
        });
        let (accepted, _) = listener.accept().await.unwrap();
        writer.await.unwrap();
        accepted
    }
}
