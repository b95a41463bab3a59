//! Listener and connection primitives.

pub mod connection;
pub mod listener;

pub use connection::Connection;
pub use listener::ProxyServer;
