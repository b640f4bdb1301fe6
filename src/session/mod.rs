//! Session layer: sequenced stop-and-wait delivery and liveness.
//!
//! Both halves run on the caller's task and borrow the transport for the
//! duration of one exchange, so an audio packet and a heartbeat are never in
//! flight together.

mod liveness;
mod protocol;

pub use liveness::{Heartbeat, LivenessMonitor};
pub use protocol::SessionProtocol;
