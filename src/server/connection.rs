use std::io;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::config::SocketOptions;
use crate::error::ProxyError;
use crate::http::endpoint::Endpoint;
use crate::pipeline::LineStream;

/// One TCP socket wrapped as a duplex line-framed transport.
///
/// The transport is created when the socket connects and torn down on
/// disconnect. Disconnecting does not destroy the `Connection` itself — the
/// same object can be reconnected later, which is how the outbound slot of a
/// client handler gets reused across sessions. Dropping disposes for good.
pub struct Connection {
    options: SocketOptions,
    transport: Option<LineStream<TcpStream>>,
    peer: Option<SocketAddr>,
}

impl Connection {
    /// A not-yet-connected connection, typically an outbound slot.
    pub fn new(options: SocketOptions) -> Self {
        Self {
            options,
            transport: None,
            peer: None,
        }
    }

    /// Wraps a socket handed over by the listener.
    pub fn accepted(stream: TcpStream, options: SocketOptions) -> Self {
        let _ = stream.set_nodelay(true);
        let peer = stream.peer_addr().ok();

        Self {
            options,
            transport: Some(LineStream::new(stream)),
            peer,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Connects to `endpoint`, racing DNS resolution plus the TCP connect
    /// against the configured connect timeout. A timeout surfaces as an
    /// abort-class socket error; hostnames that yield no IPv4 address fail
    /// with `HostNotFound`.
    pub async fn connect(
        &mut self,
        endpoint: &Endpoint,
        cancel: &CancellationToken,
    ) -> Result<(), ProxyError> {
        let connect = async {
            let addr = resolve(endpoint).await?;
            TcpStream::connect(addr).await.map_err(ProxyError::from)
        };

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProxyError::Canceled),
            res = tokio::time::timeout(self.options.connect_timeout(), connect) => match res {
                Ok(stream) => stream?,
                Err(_) => {
                    return Err(ProxyError::Socket(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connect to {endpoint} timed out"),
                    )));
                }
            },
        };

        let _ = stream.set_nodelay(true);
        self.peer = stream.peer_addr().ok();
        self.transport = Some(LineStream::new(stream));

        Ok(())
    }

    /// The cached line-framed transport. Fails when not connected.
    pub fn transport(&mut self) -> Result<&mut LineStream<TcpStream>, ProxyError> {
        self.transport.as_mut().ok_or(ProxyError::NotConnected)
    }

    /// Shuts the socket down and drops the transport. A socket that already
    /// went away mid-shutdown is a benign race; calling this while not
    /// connected is a no-op either way.
    pub async fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.get_mut().shutdown().await;
        }
    }
}

async fn resolve(endpoint: &Endpoint) -> Result<SocketAddr, ProxyError> {
    match endpoint {
        Endpoint::Ip(addr) => Ok(*addr),
        Endpoint::Dns { host, port } => {
            let mut addrs = tokio::net::lookup_host((host.as_str(), *port))
                .await
                .map_err(|_| ProxyError::HostNotFound(host.clone()))?;

            // hostnames are tagged IPv4-resolvable by the parser; only A
            // records count here
            addrs
                .find(|a| a.is_ipv4())
                .ok_or_else(|| ProxyError::HostNotFound(host.clone()))
        }
    }
}
