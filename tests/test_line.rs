//! Tests for the line protocol layer

use siphon::error::ProxyError;
use siphon::pipeline::LineStream;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// A LineStream whose read side already holds `data` and is closed after it.
async fn stream_with(data: &[u8]) -> LineStream<tokio::io::DuplexStream> {
    let (mut tx, rx) = tokio::io::duplex(4096);
    tx.write_all(data).await.unwrap();
    drop(tx);
    LineStream::new(rx)
}

#[tokio::test]
async fn test_peek_line_does_not_consume() {
    let cancel = CancellationToken::new();
    let mut stream = stream_with(b"GET / HTTP/1.1\r\nHost: example.com\r\n").await;

    let first = stream.peek_line(&cancel).await.unwrap().unwrap();
    let second = stream.peek_line(&cancel).await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(&first[..], b"GET / HTTP/1.1");
}

#[tokio::test]
async fn test_read_after_peek_returns_same_line_then_advances() {
    let cancel = CancellationToken::new();
    let mut stream = stream_with(b"first\r\nsecond\r\n").await;

    let peeked = stream.peek_line(&cancel).await.unwrap().unwrap();
    let read = stream.read_line(&cancel).await.unwrap().unwrap();
    assert_eq!(peeked, read);
    assert_eq!(&read[..], b"first");

    let next = stream.read_line(&cancel).await.unwrap().unwrap();
    assert_eq!(&next[..], b"second");
}

#[tokio::test]
async fn test_lone_lf_is_a_valid_terminator() {
    let cancel = CancellationToken::new();
    let mut stream = stream_with(b"abc\ndef\r\n").await;

    let first = stream.read_line(&cancel).await.unwrap().unwrap();
    assert_eq!(&first[..], b"abc");

    let second = stream.read_line(&cancel).await.unwrap().unwrap();
    assert_eq!(&second[..], b"def");
}

#[tokio::test]
async fn test_only_single_trailing_cr_is_stripped() {
    let cancel = CancellationToken::new();
    let mut stream = stream_with(b"abc\r\r\n").await;

    let line = stream.read_line(&cancel).await.unwrap().unwrap();
    assert_eq!(&line[..], b"abc\r");
}

#[tokio::test]
async fn test_interior_cr_preserved() {
    let cancel = CancellationToken::new();
    let mut stream = stream_with(b"a\rb\rc\r\n").await;

    let line = stream.read_line(&cancel).await.unwrap().unwrap();
    assert_eq!(&line[..], b"a\rb\rc");
}

#[tokio::test]
async fn test_end_of_stream_without_terminator_is_not_found() {
    let cancel = CancellationToken::new();
    let mut stream = stream_with(b"partial line with no terminator").await;

    assert!(stream.peek_line(&cancel).await.unwrap().is_none());
    assert!(stream.read_line(&cancel).await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_stream_is_not_found() {
    let cancel = CancellationToken::new();
    let mut stream = stream_with(b"").await;

    assert!(stream.read_line(&cancel).await.unwrap().is_none());
}

#[tokio::test]
async fn test_write_line_appends_crlf_and_flushes() {
    let cancel = CancellationToken::new();
    let (tx, mut rx) = tokio::io::duplex(4096);
    let mut stream = LineStream::new(tx);

    stream.write_line(b"abc", &cancel).await.unwrap();
    drop(stream);

    let mut sink = Vec::new();
    rx.read_to_end(&mut sink).await.unwrap();
    assert_eq!(sink, b"abc\r\n");
}

#[tokio::test]
async fn test_write_then_read_round_trip() {
    let cancel = CancellationToken::new();
    let payload: Vec<u8> = (0u8..=255).filter(|&b| b != b'\n').collect();

    let (tx, rx) = tokio::io::duplex(4096);
    let mut writer = LineStream::new(tx);
    writer.write_line(&payload, &cancel).await.unwrap();
    drop(writer);

    let mut reader = LineStream::new(rx);
    let line = reader.read_line(&cancel).await.unwrap().unwrap();
    assert_eq!(&line[..], &payload[..]);
    assert_eq!(line.len(), payload.len());
}

#[tokio::test]
async fn test_canceled_peek_consumes_nothing() {
    let (mut tx, rx) = tokio::io::duplex(4096);
    tx.write_all(b"incomplete").await.unwrap();

    let mut stream = LineStream::new(rx);

    let canceled = CancellationToken::new();
    canceled.cancel();
    let err = stream.peek_line(&canceled).await.unwrap_err();
    assert!(matches!(err, ProxyError::Canceled));

    // the stream is still usable and nothing was lost
    tx.write_all(b" line\r\n").await.unwrap();
    drop(tx);

    let cancel = CancellationToken::new();
    let line = stream.read_line(&cancel).await.unwrap().unwrap();
    assert_eq!(&line[..], b"incomplete line");
}

#[tokio::test]
async fn test_pending_holds_peeked_bytes() {
    let cancel = CancellationToken::new();
    let mut stream = stream_with(b"GET / HTTP/1.1\r\n\r\n").await;

    stream.peek_line(&cancel).await.unwrap().unwrap();
    assert!(stream.pending().starts_with(b"GET / HTTP/1.1\r\n"));

    stream.read_line(&cancel).await.unwrap().unwrap();
    assert!(!stream.pending().starts_with(b"GET"));
}
