//! Line-oriented framing over a duplex byte stream.
//!
//! HTTP start-lines and headers are CRLF-terminated, but per the message
//! parsing robustness rule a lone LF is also accepted as a terminator and a
//! CR immediately before it is ignored. This layer frames a raw stream into
//! such lines with three operations:
//!
//! - **peek**: return the next line without consuming it — the following
//!   reader sees the same bytes again
//! - **read**: return the next line and advance past it and its terminator
//! - **write**: append a line plus CRLF and flush
//!
//! The peek/consume split is what lets the proxy inspect a request line and
//! still replay the raw bytes verbatim to the upstream in the plain-HTTP
//! path.

pub mod stream;

pub use stream::LineStream;
