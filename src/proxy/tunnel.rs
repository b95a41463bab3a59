use bytes::Bytes;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{ReadHalf, WriteHalf};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::TunnelOptions;
use crate::error::ProxyError;
use crate::pipeline::LineStream;

const IDLE_CHECK_PERIOD: Duration = Duration::from_millis(100);
const COPY_BUFFER_SIZE: usize = 8192;

/// Opaque bidirectional relay between two transports.
///
/// Runs two directional pumps plus an idle watchdog, all sharing one
/// cancellation signal derived from the caller's token. Either pump ending,
/// the watchdog firing, or the caller canceling stops the whole tunnel;
/// `run` returns only once all three have finished.
pub struct Tunnel {
    options: TunnelOptions,
}

impl Tunnel {
    pub fn new(options: TunnelOptions) -> Self {
        Self { options }
    }

    pub async fn run(
        &self,
        local: &mut LineStream<TcpStream>,
        remote: &mut LineStream<TcpStream>,
        cancel: &CancellationToken,
    ) -> Result<(), ProxyError> {
        let tunnel_cancel = cancel.child_token();
        let fired = AtomicBool::new(false);

        let (local_pending, local_read, local_write) = local.split_parts();
        let (remote_pending, remote_read, remote_write) = remote.split_parts();

        let (outbound, inbound, ()) = tokio::join!(
            pump(local_pending, local_read, remote_write, &tunnel_cancel, &fired),
            pump(remote_pending, remote_read, local_write, &tunnel_cancel, &fired),
            watchdog(self.options.keep_alive_timeout(), &tunnel_cancel, &fired),
        );

        outbound.and(inbound)
    }
}

/// One direction: forward any still-buffered bytes, then copy chunks until
/// the source ends or the tunnel is canceled. Whatever the outcome, the
/// opposite direction is stopped too.
async fn pump(
    pending: Bytes,
    mut reader: ReadHalf<'_>,
    mut writer: WriteHalf<'_>,
    cancel: &CancellationToken,
    fired: &AtomicBool,
) -> Result<(), ProxyError> {
    let result = copy_bytes(pending, &mut reader, &mut writer, cancel, fired).await;

    cancel.cancel();

    match result {
        // RST is an immediate drop of the connection, a normal tunnel end
        Err(ProxyError::Socket(e)) if e.kind() == io::ErrorKind::ConnectionReset => Ok(()),
        Err(ProxyError::Canceled) => Ok(()),
        other => other,
    }
}

async fn copy_bytes(
    pending: Bytes,
    reader: &mut ReadHalf<'_>,
    writer: &mut WriteHalf<'_>,
    cancel: &CancellationToken,
    fired: &AtomicBool,
) -> Result<(), ProxyError> {
    if !pending.is_empty() {
        write_all(writer, &pending, cancel).await?;
        fired.store(true, Ordering::Relaxed);
    }

    let mut buf = vec![0u8; COPY_BUFFER_SIZE];

    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProxyError::Canceled),
            res = reader.read(&mut buf) => res?,
        };

        if read == 0 {
            return Ok(());
        }

        write_all(writer, &buf[..read], cancel).await?;
        fired.store(true, Ordering::Relaxed);
    }
}

async fn write_all(
    writer: &mut WriteHalf<'_>,
    chunk: &[u8],
    cancel: &CancellationToken,
) -> Result<(), ProxyError> {
    let write = async {
        writer.write_all(chunk).await?;
        writer.flush().await
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProxyError::Canceled),
        res = write => Ok(res?),
    }
}

/// Cancels the tunnel once the configured window elapses with no pump
/// reporting activity. The window restarts whenever bytes moved. A zero
/// timeout means no idle limit at all.
async fn watchdog(keep_alive: Duration, cancel: &CancellationToken, fired: &AtomicBool) {
    if keep_alive.is_zero() {
        cancel.cancelled().await;
        return;
    }

    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(IDLE_CHECK_PERIOD) => {}
        }

        if fired.swap(false, Ordering::Relaxed) {
            last_activity = Instant::now();
        }

        if last_activity.elapsed() >= keep_alive {
            cancel.cancel();
            return;
        }
    }
}
