//! End-to-end scenarios exercising the classifier, both forwarders, and
//! the health checker against real TCP sockets.

use std::time::Duration;

use bifrost::backend::ServerConfig;
use bifrost::classify::{classify, Protocol};
use bifrost::health::HealthChecker;
use bifrost::l4;
use bifrost::l7;
use bifrost::pool::{PoolRegistry, ServerPool};
use bifrost::strategy::StrategyEngine;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

async fn spawn_echo_backend() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut sock, _)) = listener.accept().await {
            let (mut rd, mut wr) = sock.split();
            let _ = tokio::io::copy(&mut rd, &mut wr).await;
        }
    });
    addr
}

/// S5: a client that sends bytes with no HTTP method prefix is classified
/// as L4 and its bytes are relayed to the backend, with the reply spliced
/// back unchanged.
#[tokio::test]
async fn scenario_s5_raw_tcp_is_forwarded_through_l4() {
    let backend_addr = spawn_echo_backend().await;
    let pool = ServerPool::new(vec![ServerConfig {
        host: backend_addr.ip().to_string(),
        port: backend_addr.port(),
        weight: 1,
    }]);
    let strategy = StrategyEngine::new();

    let proxy_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = proxy_listener.local_addr().unwrap();

    let client_task = tokio::spawn(async move {
        let mut client = TcpStream::connect(proxy_addr).await.unwrap();
        client.write_all(b"HELLO\n").await.unwrap();
        let mut buf = vec![0u8; 6];
        client.read_exact(&mut buf).await.unwrap();
        buf
    });

    let (accepted, peer_addr) = proxy_listener.accept().await.unwrap();
    let mut buf = vec![0u8; 16];
    let n = accepted.peek(&mut buf).await.unwrap();
    buf.truncate(n);
    assert_eq!(classify(&buf), Protocol::Tcp);

    l4::handle(BufReader::new(accepted), peer_addr, &pool, &strategy).await;

    let reply = client_task.await.unwrap();
    assert_eq!(&reply, b"HELLO\n");
}

/// S6: an HTTP GET for a static asset is classified, routed to the
/// "static" pool, and the backend receives the exact original request
/// bytes (peeked prefix included) exactly once and in order.
#[tokio::test]
async fn scenario_s6_http_static_request_forwarded_in_order() {
    let backend_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_addr = backend_listener.local_addr().unwrap();
    let received = tokio::spawn(async move {
        let (mut sock, _) = backend_listener.accept().await.unwrap();
        let mut buf = Vec::new();
        sock.read_to_end(&mut buf).await.unwrap();
        buf
    });

    let pools = PoolRegistry::new(
        vec![ServerConfig {
            host: backend_addr.ip().to_string(),
            port: backend_addr.port(),
            weight: 1,
        }],
        vec![],
    );
    let strategy = StrategyEngine::new();

    let proxy_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = proxy_listener.local_addr().unwrap();

    let request = b"GET /style.css HTTP/1.1\r\nHost: x\r\n\r\n".to_vec();
    let request_for_client = request.clone();
    let client_task = tokio::spawn(async move {
        let mut client = TcpStream::connect(proxy_addr).await.unwrap();
        client.write_all(&request_for_client).await.unwrap();
        client.shutdown().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
    });

    let (accepted, peer_addr) = proxy_listener.accept().await.unwrap();
    let mut buf = vec![0u8; 16];
    let n = accepted.peek(&mut buf).await.unwrap();
    buf.truncate(n);
    assert_eq!(classify(&buf), Protocol::Http);

    l7::handle(BufReader::new(accepted), peer_addr, &pools, &strategy).await;
    client_task.await.unwrap();

    let backend_saw = received.await.unwrap();
    assert_eq!(backend_saw, request);
}

/// The health checker flips a reachable backend to alive and an
/// unreachable one to dead within one sweep.
#[tokio::test]
async fn health_checker_sweep_updates_alive_state() {
    let up_addr = spawn_echo_backend().await;

    let down_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let down_addr = down_listener.local_addr().unwrap();
    drop(down_listener);

    let pool = std::sync::Arc::new(ServerPool::new(vec![
        ServerConfig {
            host: up_addr.ip().to_string(),
            port: up_addr.port(),
            weight: 1,
        },
        ServerConfig {
            host: down_addr.ip().to_string(),
            port: down_addr.port(),
            weight: 1,
        },
    ]));

    let checker = HealthChecker::new("l4", std::sync::Arc::clone(&pool));
    let (_tx, rx) = tokio::sync::broadcast::channel(1);
    let run_handle = tokio::spawn(async move {
        checker.run(rx).await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    run_handle.abort();

    let servers = pool.snapshot().await;
    assert!(servers[0].is_alive());
    assert!(!servers[1].is_alive());
}
