//! Proxy session handling.
//!
//! A session is one accepted client connection processed end to end:
//!
//! ```text
//! PeekHeader ──► Connect ──► Forward ───────────► Tunnel ──► Teardown
//!     │             │    └─► ConnectHandshake ──►   ▲
//!     └─────────────┴──────────► Error branches ────┘
//! ```
//!
//! - **`client`**: the per-session handler bundling inbound and outbound
//!   connections plus diagnostic context
//! - **`pool`**: reuse pool for handlers with a discard-on-error policy
//! - **`handler`**: the request-processing state machine above
//! - **`tunnel`**: the bidirectional byte relay with its idle watchdog

pub mod client;
pub mod handler;
pub mod pool;
pub mod tunnel;

pub use client::{ClientHandler, RequestContext};
pub use handler::RequestProcessor;
pub use pool::HandlerPool;
pub use tunnel::Tunnel;
