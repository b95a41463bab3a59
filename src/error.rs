use std::io;

use thiserror::Error;

/// Errors produced while serving a single proxied request.
///
/// The variants map directly onto the proxy's wire behavior: `BadRequest`
/// earns the client a 400, gateway-class errors a 502, and everything else
/// tears the session down silently.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The request line could not be parsed into a supported request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// DNS resolution yielded no usable IPv4 address for the target.
    #[error("host not found: {0}")]
    HostNotFound(String),

    /// An underlying socket operation failed.
    #[error("socket error: {0}")]
    Socket(#[from] io::Error),

    /// The operation was canceled by shutdown or the idle watchdog.
    #[error("operation canceled")]
    Canceled,

    /// A transport was used before connect or after disconnect.
    #[error("connection is not established")]
    NotConnected,
}

impl ProxyError {
    /// Errors that mean the upstream target is unreachable and should be
    /// reported to the client as 502 Bad Gateway.
    pub fn is_gateway_error(&self) -> bool {
        match self {
            ProxyError::HostNotFound(_) => true,
            ProxyError::Socket(e) => matches!(
                e.kind(),
                io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable
            ),
            _ => false,
        }
    }

    /// Errors that reflect a deliberately ended operation rather than a
    /// fault, such as cancellation or a timed-out wait.
    pub fn is_aborted(&self) -> bool {
        match self {
            ProxyError::Canceled => true,
            ProxyError::Socket(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}
