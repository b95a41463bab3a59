use std::io;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::config::Config;
use crate::error::ProxyError;
use crate::http::protocol;
use crate::proxy::client::ClientHandler;
use crate::proxy::tunnel::Tunnel;

const CONNECT_METHOD: &str = "CONNECT";

/// Per-request state machine:
/// peek header → connect upstream → (forward | CONNECT handshake) → tunnel
/// → teardown, with the error branches owned here. This is the single place
/// where an error kind is turned into response bytes.
pub struct RequestProcessor {
    tunnel: Tunnel,
    receive_timeout: Duration,
}

impl RequestProcessor {
    pub fn new(config: &Config) -> Self {
        Self {
            tunnel: Tunnel::new(config.tunnel.clone()),
            receive_timeout: config.socket.receive_timeout(),
        }
    }

    /// Processes one session on the handler's bound client. Never panics
    /// the session task; every failure is classified and either answered or
    /// swallowed per its kind.
    pub async fn process(&self, handler: &mut ClientHandler, cancel: &CancellationToken) {
        let result = self.run_session(handler, cancel).await;

        match result {
            Ok(()) => {}
            Err(ProxyError::BadRequest(reason)) => {
                self.handle_bad_request(handler, &reason, cancel).await;
            }
            Err(ProxyError::Canceled) => {
                // benign shutdown
            }
            Err(err @ (ProxyError::HostNotFound(_) | ProxyError::Socket(_))) => {
                self.handle_socket_error(handler, &err, cancel).await;
            }
            Err(err) => {
                handler.set_error();
                error!(
                    client = ?handler.context().client_info,
                    error = %err,
                    "client communication failed"
                );
            }
        }

        // the pool disposes errored handlers whole; only a healthy session
        // hands its outbound socket back for reuse
        if !handler.has_error() {
            handler.remote().disconnect().await;
        }
    }

    async fn run_session(
        &self,
        handler: &mut ClientHandler,
        cancel: &CancellationToken,
    ) -> Result<(), ProxyError> {
        let client_info = handler.context().client_info.clone();

        let head = {
            let transport = handler.client()?.transport()?;

            // the receive timeout bounds the header wait so an idle client
            // cannot hold a session open indefinitely
            match tokio::time::timeout(
                self.receive_timeout,
                protocol::peek_request_head(transport, cancel),
            )
            .await
            {
                Ok(res) => res?,
                Err(_) => {
                    return Err(ProxyError::Socket(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "request header timed out",
                    )));
                }
            }
        };

        info!(
            client = ?client_info,
            method = %head.method,
            url = %head.target,
            protocol = %head.protocol,
            "request"
        );

        let context = handler.context_mut();
        context.request_url = Some(head.target.clone());
        context.endpoint = Some(head.endpoint.to_string());

        handler.remote().connect(&head.endpoint, cancel).await?;

        if head.method == CONNECT_METHOD {
            // TLS passthrough: drain the rest of the handshake request,
            // acknowledge it, then go opaque
            let transport = handler.client()?.transport()?;
            protocol::skip_to_end(transport, cancel).await?;
            protocol::write_connection_ok(transport, cancel).await?;
        }
        // for plain requests the peeked request line is still unconsumed
        // and is replayed through the tunnel as-is

        let (client, remote) = handler.transports()?;
        self.tunnel
            .run(client.transport()?, remote.transport()?, cancel)
            .await
    }

    async fn handle_bad_request(
        &self,
        handler: &mut ClientHandler,
        reason: &str,
        cancel: &CancellationToken,
    ) {
        info!(
            client = ?handler.context().client_info,
            reason,
            "bad request, session ended"
        );

        let result = async {
            if handler.client_connected() {
                let transport = handler.client()?.transport()?;
                protocol::skip_to_end(transport, cancel).await?;
                protocol::write_bad_request(transport, cancel).await?;
            }
            Ok::<_, ProxyError>(())
        }
        .await;

        match result {
            Ok(()) | Err(ProxyError::Canceled) => {}
            Err(ProxyError::NotConnected) => handler.set_error(),
            Err(err) => {
                handler.set_error();
                error!(error = %err, "bad request response failed");
            }
        }
    }

    async fn handle_socket_error(
        &self,
        handler: &mut ClientHandler,
        err: &ProxyError,
        cancel: &CancellationToken,
    ) {
        let url = handler.context().request_url.clone();
        let endpoint = handler.context().endpoint.clone();

        trace!(error = %err, url = ?url, endpoint = ?endpoint, "socket error");

        if err.is_aborted() {
            // the socket was torn down mid-operation, nothing to report
            return;
        }

        if !err.is_gateway_error() {
            warn!(error = %err, url = ?url, endpoint = ?endpoint, "unclassified socket error");
            handler.set_error();
            return;
        }

        let result = async {
            if handler.client_connected() {
                let transport = handler.client()?.transport()?;
                protocol::skip_to_end(transport, cancel).await?;
                protocol::write_bad_gateway(transport, cancel).await?;
            }
            Ok::<_, ProxyError>(())
        }
        .await;

        match result {
            Err(ProxyError::Canceled) => {}
            Ok(()) | Err(ProxyError::NotConnected) => handler.set_error(),
            Err(err) => {
                handler.set_error();
                error!(error = %err, "bad gateway response failed");
            }
        }
    }
}
