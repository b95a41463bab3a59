use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::error::ProxyError;
use crate::http::parser::{RequestHead, parse_request_head};
use crate::pipeline::LineStream;

/// The only protocol token accepted on inbound request lines.
pub const SUPPORTED_PROTOCOL: &str = "HTTP/1.1";

const CONNECTION_OK: &[u8] = b"HTTP/1.1 200 Connection Established";
const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request";
const BAD_GATEWAY: &[u8] = b"HTTP/1.1 502 Bad Gateway";
const CONNECTION_CLOSE: &[u8] = b"Connection: close";
const EMPTY: &[u8] = b"";

/// Peeks the request line and parses it, leaving the bytes unconsumed for
/// the tunnel to replay. End-of-stream with no line and an unsupported
/// protocol token are both bad requests.
pub async fn peek_request_head<S>(
    stream: &mut LineStream<S>,
    cancel: &CancellationToken,
) -> Result<RequestHead, ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let line = stream
        .peek_line(cancel)
        .await?
        .ok_or_else(|| ProxyError::BadRequest("no data".to_string()))?;

    let line = std::str::from_utf8(&line)
        .map_err(|_| ProxyError::BadRequest("request line is not valid ascii".to_string()))?;

    let head = parse_request_head(line)?;

    if head.protocol != SUPPORTED_PROTOCOL {
        return Err(ProxyError::BadRequest(format!(
            "unknown protocol: {}",
            head.protocol
        )));
    }

    Ok(head)
}

/// Consumes lines up to and including the empty line that ends the request
/// headers, or to end-of-stream.
pub async fn skip_to_end<S>(
    stream: &mut LineStream<S>,
    cancel: &CancellationToken,
) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        match stream.read_line(cancel).await? {
            Some(line) if !line.is_empty() => continue,
            _ => return Ok(()),
        }
    }
}

/// `HTTP/1.1 200 Connection Established` + blank line.
pub async fn write_connection_ok<S>(
    stream: &mut LineStream<S>,
    cancel: &CancellationToken,
) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_line(CONNECTION_OK, cancel).await?;
    stream.write_line(EMPTY, cancel).await
}

/// `HTTP/1.1 400 Bad Request` + `Connection: close` + blank line.
pub async fn write_bad_request<S>(
    stream: &mut LineStream<S>,
    cancel: &CancellationToken,
) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_line(BAD_REQUEST, cancel).await?;
    stream.write_line(CONNECTION_CLOSE, cancel).await?;
    stream.write_line(EMPTY, cancel).await
}

/// `HTTP/1.1 502 Bad Gateway` + `Connection: close` + blank line.
pub async fn write_bad_gateway<S>(
    stream: &mut LineStream<S>,
    cancel: &CancellationToken,
) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_line(BAD_GATEWAY, cancel).await?;
    stream.write_line(CONNECTION_CLOSE, cancel).await?;
    stream.write_line(EMPTY, cancel).await
}
