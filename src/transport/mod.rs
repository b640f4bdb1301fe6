//! Transport layer: wire format, stream transports and the network link.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     Session protocol / liveness         │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   packets, acks, link state machine     │
//! ├─────────────────────────────────────────┤
//! │       Radio + TCP stream                │
//! └─────────────────────────────────────────┘
//! ```

mod connection;
mod error;
mod packet;
mod radio;
mod socket;

pub use connection::{ConnectionState, NetworkLink};
pub use error::*;
pub use packet::*;
pub use radio::HostRadio;
pub use socket::{TcpConnector, TcpTransport, read_exact_within};
