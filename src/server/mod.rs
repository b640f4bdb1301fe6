//! Ingestion endpoint.
//!
//! The receiving side of the device protocol: accepts device connections,
//! acknowledges in-order audio once an [`AudioSink`] has taken it, and
//! answers heartbeats.

mod ingest;
mod session;
mod sink;

pub use ingest::*;
pub use session::*;
pub use sink::*;
