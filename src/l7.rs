//! L7 forwarder: parses enough of an HTTP/1.x request to classify its
//! URL, picks a pool by that classification, and splices the connection
//! through to the chosen backend.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{self, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::backend::ConnectionGuard;
use crate::constants::BACKEND_DIAL_TIMEOUT_SECS;
use crate::http_parse::parse_request;
use crate::pool::PoolRegistry;
use crate::strategy::{Layer, StrategyEngine};

const STATIC_SUFFIXES: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".css", ".js", ".ico", ".html"];

/// "static" if `path`'s suffix case-sensitively matches a known static
/// extension, "dynamic" otherwise (including an empty path).
pub fn classify_url(path: &str) -> &'static str {
    let path_only = path.split(['?', '#']).next().unwrap_or(path);
    if STATIC_SUFFIXES.iter().any(|suffix| path_only.ends_with(suffix)) {
        "static"
    } else {
        "dynamic"
    }
}

pub async fn handle(
    mut client: BufReader<TcpStream>,
    client_addr: SocketAddr,
    pools: &PoolRegistry,
    strategy: &StrategyEngine,
) {
    let request = match parse_request(&mut client).await {
        Ok(request) => request,
        Err(e) => {
            debug!("L7 request parse failed for {}: {}", client_addr, e);
            return;
        }
    };

    let tag = classify_url(&request.path);
    let pool = match pools.get(tag) {
        Some(pool) => pool,
        None => {
            warn!("L7 pool tag \"{}\" is not registered; closing {}", tag, client_addr);
            return;
        }
    };

    debug!(
        "L7 request {} {} from {} (host={:?}, ua={:?}) classified \"{}\"",
        request.method,
        request.path,
        client_addr,
        request.host(),
        request.user_agent(),
        tag
    );

    let algorithm = strategy.select_algorithm(&pool, Layer::L7).await;
    let server = match strategy.apply_algorithm(&pool, algorithm).await {
        Some(server) => server,
        None => {
            warn!("no healthy L7 backend in pool \"{}\" for {}", tag, client_addr);
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
            warn!("L7 dial to {} failed for {}: {}", backend_addr, client_addr, e);
            return;
        }
        Err(_elapsed) => {
            warn!(
                "L7 dial to {} timed out after {}s for {}",
                backend_addr, BACKEND_DIAL_TIMEOUT_SECS, client_addr
            );
            return;
        }
    };

    // Parsing already consumed the request line and headers from the
    // reader; re-emit those exact bytes first so the backend sees the
    // original request in full and in order.
    if let Err(e) = backend.write_all(&request.raw_bytes).await {
        warn!("failed to forward buffered request headers to {}: {}", backend_addr, e);
        return;
    }

    info!(
        "L7 connection established: {} <-> {} (pool \"{}\")",
        client_addr, backend_addr, tag
    );

    match io::copy_bidirectional(&mut client, &mut backend).await {
        Ok((to_backend, to_client)) => {
            debug!(
                "L7 connection closed: {}. client->backend {} bytes, backend->client {} bytes",
                client_addr, to_backend, to_client
            );
        }
        Err(e) => {
            debug!("L7 copy error for {}: {}", client_addr, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_suffixes_classify_as_static() {
        for suffix in STATIC_SUFFIXES {
            let path = format!("/asset{}", suffix);
            assert_eq!(classify_url(&path), "static", "path {}", path);
        }
    }

    #[test]
    fn api_path_classifies_as_dynamic() {
        assert_eq!(classify_url("/api/users"), "dynamic");
    }

    #[test]
    fn empty_path_classifies_as_dynamic() {
        assert_eq!(classify_url(""), "dynamic");
    }

    #[test]
    fn classification_is_case_sensitive() {
        assert_eq!(classify_url("/image.PNG"), "dynamic");
        assert_eq!(classify_url("/image.png"), "static");
    }

    #[test]
    fn query_string_does_not_defeat_suffix_match() {
        assert_eq!(classify_url("/style.css?v=2"), "static");
    }
}
