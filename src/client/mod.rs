//! Device client.
//!
//! The [`Orchestrator`] wires capture, the voice gate, the network link, the
//! session protocol and the liveness monitor into one sequential loop.

mod orchestrator;

pub use orchestrator::*;
