//! # Voxlink
//!
//! Client for unattended voice capture devices. A device captures PCM audio,
//! gates out silence, and streams voice frames to an ingestion endpoint over
//! one TCP connection using a sequenced stop-and-wait protocol:
//!
//! - **Reliability**: every audio packet carries a sequence number and is
//!   retransmitted byte-for-byte until the endpoint echoes it in an ack
//! - **Durability**: the next sequence survives restarts in a small state blob
//! - **Liveness**: rate-limited heartbeats detect a dead connection
//! - **Recovery**: any failure tears the connection down and reconnects,
//!   forever; the process never exits on a network error
//!
//! ## Wire format (big-endian)
//!
//! ```text
//! Handshake  DEADBEEF | sequence | 00000000
//! Audio      AABBCCDD | sequence | length | timestamp | PCM[length]
//! Heartbeat  FFEEDDCC | sequence | timestamp
//! Ack        magic    | sequence
//! ```
//!
//! ## Feature Flags
//!
//! - `server` (default): the ingestion endpoint in [`server`]
//!
//! ## Example Usage
//!
//! ```no_run
//! use voxlink::prelude::*;
//!
//! # async fn run() -> Result<(), ClientError> {
//! let config = ClientConfigBuilder::new().server("10.0.0.2", 3000).build();
//! let source = PcmReader::new(tokio::io::stdin(), config.audio.frame_bytes());
//! let connector = TcpConnector::new(config.server_addr());
//! let store = FileStore::new(&config.storage.state_file);
//!
//! let mut client = Orchestrator::new(&config, source, HostRadio::new(), connector, store).await?;
//! client.run().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod audio;
pub mod client;
pub mod config;
pub mod core;
pub mod logging;
pub mod session;
pub mod storage;
pub mod transport;

#[cfg(feature = "server")]
#[cfg_attr(docsrs, doc(cfg(feature = "server")))]
pub mod server;

#[cfg(test)]
mod testing;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::audio::{NoiseEstimate, PcmReader, VoiceActivityGate};
    pub use crate::client::{ClientStats, FrameOutcome, Orchestrator, StepOutcome};
    pub use crate::config::{ClientConfig, ClientConfigBuilder, NoiseConfig, Timings};
    pub use crate::core::*;
    pub use crate::session::{Heartbeat, LivenessMonitor, SessionProtocol};
    pub use crate::storage::{FileStore, MemoryStore, PersistedState, PersistentCursor};
    pub use crate::transport::{
        Ack, ConnectionState, HostRadio, NetworkLink, Packet, PacketKind, TcpConnector,
        TcpTransport, TransportError, TransportResult,
    };

    #[cfg(feature = "server")]
    pub use crate::server::{AudioChunk, AudioSink, ChannelSink, DirectorySink, IngestServer};
}

pub use crate::client::Orchestrator;
pub use crate::config::ClientConfig;
pub use crate::core::ClientError;
pub use crate::transport::{ConnectionState, Packet, PacketKind};
