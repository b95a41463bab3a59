use crate::config::SocketOptions;
use crate::error::ProxyError;
use crate::server::Connection;

/// Diagnostic bag for one session. Reset every time a client is bound.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub client_info: Option<String>,
    pub request_url: Option<String>,
    pub endpoint: Option<String>,
}

impl RequestContext {
    pub fn reset(&mut self) {
        *self = RequestContext::default();
    }
}

/// Per-session aggregate owned by exactly one in-flight task at a time.
///
/// The inbound connection is bound once per accepted client and released by
/// [`clean`](Self::clean). The outbound connection is created lazily on
/// first access and survives `clean` so its slot can be reused by the
/// handler's next session; it is destroyed only when the handler itself is
/// dropped (pool eviction or shutdown).
pub struct ClientHandler {
    options: SocketOptions,
    client: Option<Connection>,
    remote: Option<Connection>,
    context: RequestContext,
    has_error: bool,
}

impl ClientHandler {
    pub fn new(options: SocketOptions) -> Self {
        Self {
            options,
            client: None,
            remote: None,
            context: RequestContext::default(),
            has_error: false,
        }
    }

    /// Binds the inbound connection for a new session and resets the
    /// request context.
    pub fn bind_client(&mut self, connection: Connection) {
        self.context.reset();
        self.context.client_info = connection.peer_addr().map(|a| a.to_string());
        self.client = Some(connection);
    }

    pub fn client(&mut self) -> Result<&mut Connection, ProxyError> {
        self.client.as_mut().ok_or(ProxyError::NotConnected)
    }

    pub fn client_connected(&self) -> bool {
        self.client.as_ref().is_some_and(|c| c.is_connected())
    }

    /// The outbound connection slot, created on first access.
    pub fn remote(&mut self) -> &mut Connection {
        self.remote
            .get_or_insert_with(|| Connection::new(self.options.clone()))
    }

    /// Both connections at once, for the tunnel. Fails unless the inbound
    /// connection is bound and the outbound slot exists.
    pub fn transports(&mut self) -> Result<(&mut Connection, &mut Connection), ProxyError> {
        match (self.client.as_mut(), self.remote.as_mut()) {
            (Some(client), Some(remote)) => Ok((client, remote)),
            _ => Err(ProxyError::NotConnected),
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RequestContext {
        &mut self.context
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }

    /// Marks the handler non-reusable; the pool will dispose it instead of
    /// keeping it.
    pub fn set_error(&mut self) {
        self.has_error = true;
    }

    /// Releases the inbound connection and clears session state for return
    /// to the pool. The outbound connection slot is preserved. Safe to call
    /// more than once.
    pub fn clean(&mut self) {
        self.client = None;
        self.context.reset();
        self.has_error = false;
    }
}
