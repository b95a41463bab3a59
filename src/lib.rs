//! Siphon - forward HTTP/HTTPS proxy.
//!
//! Accepts client connections, reads a single request line, and either
//! relays the request verbatim to the target (plain HTTP) or establishes an
//! opaque bidirectional tunnel after a CONNECT handshake (TLS passthrough).
//! Payloads are never inspected.

pub mod config;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod proxy;
pub mod server;
