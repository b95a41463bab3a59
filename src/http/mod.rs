//! Minimal HTTP surface of the proxy.
//!
//! The proxy never parses past the request line; everything after it is
//! opaque payload. This module covers the three things it does understand:
//!
//! - **`parser`**: splits `<METHOD> <TARGET> <PROTOCOL>` into a
//!   [`parser::RequestHead`]
//! - **`endpoint`**: resolves a target string (`scheme://host[:port][/path]`,
//!   `host:port` or `ip:port`) into a connectable [`endpoint::Endpoint`]
//! - **`protocol`**: the handful of fixed wire responses the proxy itself
//!   produces (`200 Connection Established`, `400`, `502`) plus the
//!   peek-header and drain helpers built on the line layer

pub mod endpoint;
pub mod parser;
pub mod protocol;

pub use endpoint::{Endpoint, resolve_endpoint};
pub use parser::{RequestHead, parse_request_head};
