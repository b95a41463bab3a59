//! Tests for the bidirectional tunnel engine

use siphon::config::TunnelOptions;
use siphon::pipeline::LineStream;
use siphon::proxy::Tunnel;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

async fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (connected, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    (connected.unwrap(), accepted.unwrap().0)
}

fn options(keep_alive_ms: u64) -> TunnelOptions {
    TunnelOptions {
        keep_alive_timeout_ms: keep_alive_ms,
    }
}

/// Spawns a tunnel between the far ends of two TCP pairs and returns the
/// near ends plus the tunnel task handle.
async fn spawn_tunnel(
    keep_alive_ms: u64,
) -> (TcpStream, TcpStream, tokio::task::JoinHandle<()>) {
    let (client_side, local) = tcp_pair().await;
    let (remote, server_side) = tcp_pair().await;

    let handle = tokio::spawn(async move {
        let mut local = LineStream::new(local);
        let mut remote = LineStream::new(remote);
        let cancel = CancellationToken::new();

        Tunnel::new(options(keep_alive_ms))
            .run(&mut local, &mut remote, &cancel)
            .await
            .unwrap();
    });

    (client_side, server_side, handle)
}

#[tokio::test]
async fn test_tunnel_relays_both_directions() {
    let (mut client_side, mut server_side, handle) = spawn_tunnel(2_000).await;

    client_side.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    server_side.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");

    server_side.write_all(b"pong").await.unwrap();
    client_side.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"pong");

    // closing one side ends the whole tunnel
    drop(client_side);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_tunnel_replays_peeked_bytes() {
    let (mut client_side, local) = tcp_pair().await;
    let (remote, mut server_side) = tcp_pair().await;

    client_side
        .write_all(b"GET http://example.com/ HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    let handle = tokio::spawn(async move {
        let mut local = LineStream::new(local);
        let mut remote = LineStream::new(remote);
        let cancel = CancellationToken::new();

        // peek the request line first, as the request handler does
        local.peek_line(&cancel).await.unwrap().unwrap();

        Tunnel::new(options(2_000))
            .run(&mut local, &mut remote, &cancel)
            .await
            .unwrap();
    });

    // the peeked line must come through the tunnel verbatim
    let mut buf = vec![0u8; b"GET http://example.com/ HTTP/1.1\r\n\r\n".len()];
    server_side.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf[..], b"GET http://example.com/ HTTP/1.1\r\n\r\n");

    drop(client_side);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_tunnel_idle_timeout_fires_after_last_byte() {
    let (mut client_side, mut server_side, handle) = spawn_tunnel(400).await;

    client_side.write_all(b"x").await.unwrap();
    let mut buf = [0u8; 1];
    server_side.read_exact(&mut buf).await.unwrap();

    // both sides go silent; the watchdog must tear the tunnel down around
    // the configured window, not before
    let start = Instant::now();
    handle.await.unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(250), "ended too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "ended too late: {elapsed:?}");
}

#[tokio::test]
async fn test_tunnel_outlives_idle_timeout_while_active() {
    let (mut client_side, mut server_side, handle) = spawn_tunnel(400).await;

    let start = Instant::now();

    // keep producing slower than the check period but faster than the idle
    // window for well past the nominal timeout
    let producer = tokio::spawn(async move {
        for _ in 0..10 {
            client_side.write_all(b"y").await.unwrap();
            tokio::time::sleep(Duration::from_millis(120)).await;
        }
        client_side
    });

    let mut sink = [0u8; 1];
    for _ in 0..10 {
        server_side.read_exact(&mut sink).await.unwrap();
    }

    let client_side = producer.await.unwrap();
    drop(client_side);
    handle.await.unwrap();

    assert!(
        start.elapsed() >= Duration::from_millis(1_000),
        "tunnel died while activity continued"
    );
}
