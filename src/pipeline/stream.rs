use bytes::{Buf, Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{ReadHalf, WriteHalf};
use tokio_util::sync::CancellationToken;

use crate::error::ProxyError;

const INITIAL_BUFFER_CAPACITY: usize = 4096;

const BYTE_CR: u8 = b'\r';
const BYTE_LF: u8 = b'\n';

/// A duplex byte stream framed into lines.
///
/// Owns the stream plus a read buffer holding bytes received but not yet
/// consumed. Peeked lines stay in the buffer; consumed lines are removed
/// together with their terminator.
pub struct LineStream<S> {
    stream: S,
    buf: BytesMut,
}

impl<S: AsyncRead + AsyncWrite + Unpin> LineStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Returns the next line without consuming it.
    ///
    /// Blocks for more data while no terminator is buffered yet. Returns
    /// `None` when the stream ends before a terminator arrives. On
    /// cancellation nothing is consumed and the call fails with `Canceled`.
    pub async fn peek_line(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Bytes>, ProxyError> {
        loop {
            if let Some((len, _)) = scan_line(&self.buf) {
                return Ok(Some(Bytes::copy_from_slice(&self.buf[..len])));
            }

            if self.fill(cancel).await? == 0 {
                return Ok(None);
            }
        }
    }

    /// Returns the next line and advances past it and its terminator.
    pub async fn read_line(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Bytes>, ProxyError> {
        loop {
            if let Some((len, consumed)) = scan_line(&self.buf) {
                let line = Bytes::copy_from_slice(&self.buf[..len]);
                self.buf.advance(consumed);
                return Ok(Some(line));
            }

            if self.fill(cancel).await? == 0 {
                return Ok(None);
            }
        }
    }

    /// Appends `line` followed by CRLF and flushes.
    ///
    /// A closed sink is reported as `NotConnected`; cancellation abandons
    /// the flush with `Canceled`.
    pub async fn write_line(
        &mut self,
        line: &[u8],
        cancel: &CancellationToken,
    ) -> Result<(), ProxyError> {
        let stream = &mut self.stream;

        let write = async {
            stream.write_all(line).await?;
            stream.write_all(b"\r\n").await?;
            stream.flush().await?;
            Ok::<_, io::Error>(())
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProxyError::Canceled),
            res = write => res.map_err(map_write_error),
        }
    }

    /// Bytes received but not yet consumed (peeked lines included).
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    async fn fill(&mut self, cancel: &CancellationToken) -> Result<usize, ProxyError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProxyError::Canceled),
            res = self.stream.read_buf(&mut self.buf) => Ok(res?),
        }
    }
}

impl LineStream<TcpStream> {
    /// Splits into the unconsumed buffered bytes plus independent read and
    /// write halves, for use by the tunnel. The buffered bytes must be
    /// forwarded before anything read from the half, so a peeked request
    /// line is replayed verbatim.
    pub fn split_parts(&mut self) -> (Bytes, ReadHalf<'_>, WriteHalf<'_>) {
        let pending = self.buf.split().freeze();
        let (read_half, write_half) = self.stream.split();
        (pending, read_half, write_half)
    }
}

/// Finds the first LF in `buf`. Returns `(line_len, consumed_len)` where
/// `line_len` excludes the terminator and a single CR directly before it.
fn scan_line(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.iter().position(|&b| b == BYTE_LF)?;

    let mut len = lf;
    if len > 0 && buf[len - 1] == BYTE_CR {
        len -= 1;
    }

    Some((len, lf + 1))
}

fn map_write_error(e: io::Error) -> ProxyError {
    match e.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::WriteZero => ProxyError::NotConnected,
        _ => ProxyError::Socket(e),
    }
}

#[cfg(test)]
mod tests {
    use super::scan_line;

    #[test]
    fn scan_strips_single_trailing_cr() {
        assert_eq!(scan_line(b"abc\r\n"), Some((3, 5)));
        assert_eq!(scan_line(b"abc\n"), Some((3, 4)));
        assert_eq!(scan_line(b"abc\r\r\n"), Some((4, 6)));
    }

    #[test]
    fn scan_requires_terminator() {
        assert_eq!(scan_line(b"abc\r"), None);
        assert_eq!(scan_line(b""), None);
    }

    #[test]
    fn scan_empty_line() {
        assert_eq!(scan_line(b"\r\n"), Some((0, 2)));
        assert_eq!(scan_line(b"\n"), Some((0, 1)));
    }
}
