//! Protocol constants and default tuning values.
//!
//! Magic numbers, field widths and byte order are fixed by the ingestion
//! endpoint and MUST NOT be changed. The timing and audio values are only
//! defaults; every component reads them through [`crate::config::ClientConfig`].

use std::time::Duration;

// =============================================================================
// MAGIC NUMBERS
// =============================================================================

/// Handshake (connection confirmation) packet magic.
pub const HANDSHAKE_MAGIC: u32 = 0xDEAD_BEEF;

/// Audio data packet magic.
pub const AUDIO_MAGIC: u32 = 0xAABB_CCDD;

/// Heartbeat packet magic.
pub const HEARTBEAT_MAGIC: u32 = 0xFFEE_DDCC;

// =============================================================================
// WIRE SIZES
// =============================================================================

/// Handshake packet size (magic + sequence + reserved).
pub const HANDSHAKE_SIZE: usize = 12;

/// Audio packet header size (magic + sequence + length + timestamp).
pub const AUDIO_HEADER_SIZE: usize = 16;

/// Heartbeat packet size (magic + sequence + timestamp).
pub const HEARTBEAT_SIZE: usize = 12;

/// Acknowledgment size (echoed magic + echoed sequence).
pub const ACK_SIZE: usize = 8;

/// Minimum handshake reply the device accepts.
pub const HANDSHAKE_REPLY_SIZE: usize = 4;

/// Smallest packet the decoder needs before it can classify one.
pub const MIN_PACKET_SIZE: usize = 12;

/// Largest audio payload the ingestion endpoint accepts (1 MiB).
pub const MAX_PACKET_SIZE: usize = 1024 * 1024;

// =============================================================================
// AUDIO DEFAULTS
// =============================================================================

/// Capture sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Samples per captured frame.
pub const DEFAULT_FRAME_SAMPLES: usize = 1024;

/// Bytes per signed 16-bit PCM sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Base mean-amplitude threshold for the voice gate.
pub const DEFAULT_VAD_THRESHOLD: f32 = 1000.0;

/// Fixed background noise estimate.
pub const DEFAULT_NOISE_LEVEL: f32 = 0.1;

/// Upper clamp for an adaptive noise estimate.
pub const MAX_NOISE_LEVEL: f32 = 10.0;

// =============================================================================
// RELIABILITY DEFAULTS
// =============================================================================

/// Attempts per bounded operation (association, handshake, audio send) and
/// the consecutive heartbeat failures tolerated.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Minimum spacing between successful heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Bound on a single association or socket connect attempt.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on every blocking read from the transport socket.
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between connection attempts and reconnect rounds.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Pause between retransmissions of an unacknowledged packet.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

// =============================================================================
// ENDPOINT / STORAGE DEFAULTS
// =============================================================================

/// Default ingestion endpoint host.
pub const DEFAULT_SERVER_HOST: &str = "192.168.1.100";

/// Default ingestion endpoint port.
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Default persisted state file.
pub const DEFAULT_STATE_FILE: &str = "device_state.json";

// =============================================================================
// INGESTION ENDPOINT
// =============================================================================

/// Silence after which the endpoint drops a device connection.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(35);

/// Default endpoint listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
