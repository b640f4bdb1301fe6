//! Packet encoding and decoding for the voxlink wire protocol.
//!
//! All integers are fixed-width big-endian:
//!
//! ```text
//! Handshake  | magic 0xDEADBEEF | sequence | reserved (0)           |  12 bytes
//! Audio      | magic 0xAABBCCDD | sequence | length    | timestamp  |  16 bytes + length
//! Heartbeat  | magic 0xFFEEDDCC | sequence | timestamp              |  12 bytes
//! Ack        | echoed magic     | echoed sequence                   |   8 bytes
//! ```

use thiserror::Error;

use crate::core::constants::{
    ACK_SIZE, AUDIO_HEADER_SIZE, AUDIO_MAGIC, HANDSHAKE_MAGIC, HANDSHAKE_SIZE, HEARTBEAT_MAGIC,
    HEARTBEAT_SIZE, MAX_PACKET_SIZE, MIN_PACKET_SIZE,
};

/// Packet kinds that carry a sequence number from device to endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Connection confirmation sent once per transport connection.
    Handshake,
    /// One voiced PCM frame.
    Audio,
    /// Liveness probe.
    Heartbeat,
}

impl PacketKind {
    /// The magic number that opens packets of this kind (and their acks).
    pub fn magic(self) -> u32 {
        match self {
            Self::Handshake => HANDSHAKE_MAGIC,
            Self::Audio => AUDIO_MAGIC,
            Self::Heartbeat => HEARTBEAT_MAGIC,
        }
    }

    /// Classify a magic number.
    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            HANDSHAKE_MAGIC => Some(Self::Handshake),
            AUDIO_MAGIC => Some(Self::Audio),
            HEARTBEAT_MAGIC => Some(Self::Heartbeat),
            _ => None,
        }
    }
}

/// A device-to-endpoint packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Connection confirmation carrying the device's current sequence.
    Handshake {
        /// Next sequence the device will send.
        sequence: u32,
    },
    /// Voiced PCM frame.
    Audio {
        /// Sequence number of this frame.
        sequence: u32,
        /// Capture time in whole seconds since the Unix epoch.
        timestamp: u32,
        /// Raw little-endian signed 16-bit PCM bytes.
        payload: Vec<u8>,
    },
    /// Liveness probe.
    Heartbeat {
        /// Device's current sequence (not consumed by the heartbeat).
        sequence: u32,
        /// Send time in whole seconds since the Unix epoch.
        timestamp: u32,
    },
}

impl Packet {
    /// Get the packet kind.
    pub fn kind(&self) -> PacketKind {
        match self {
            Self::Handshake { .. } => PacketKind::Handshake,
            Self::Audio { .. } => PacketKind::Audio,
            Self::Heartbeat { .. } => PacketKind::Heartbeat,
        }
    }

    /// Get the sequence number carried by the packet.
    pub fn sequence(&self) -> u32 {
        match self {
            Self::Handshake { sequence }
            | Self::Audio { sequence, .. }
            | Self::Heartbeat { sequence, .. } => *sequence,
        }
    }

    /// Size of the packet on the wire.
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Handshake { .. } => HANDSHAKE_SIZE,
            Self::Audio { payload, .. } => AUDIO_HEADER_SIZE + payload.len(),
            Self::Heartbeat { .. } => HEARTBEAT_SIZE,
        }
    }

    /// Serialize to wire bytes.
    ///
    /// Audio payloads longer than [`MAX_PACKET_SIZE`] are rejected so the
    /// length field always fits and the endpoint never drops the connection
    /// over an oversized frame.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&self.kind().magic().to_be_bytes());
        buf.extend_from_slice(&self.sequence().to_be_bytes());

        match self {
            Self::Handshake { .. } => {
                buf.extend_from_slice(&0u32.to_be_bytes());
            }
            Self::Audio {
                timestamp, payload, ..
            } => {
                if payload.len() > MAX_PACKET_SIZE {
                    return Err(FrameError::PayloadTooLarge(payload.len()));
                }
                buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
                buf.extend_from_slice(&timestamp.to_be_bytes());
                buf.extend_from_slice(payload);
            }
            Self::Heartbeat { timestamp, .. } => {
                buf.extend_from_slice(&timestamp.to_be_bytes());
            }
        }

        Ok(buf)
    }
}

/// Endpoint acknowledgment echoing the magic and sequence of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Echoed packet magic.
    pub magic: u32,
    /// Echoed packet sequence.
    pub sequence: u32,
}

impl Ack {
    /// Create an ack for a packet kind and sequence.
    pub fn new(kind: PacketKind, sequence: u32) -> Self {
        Self {
            magic: kind.magic(),
            sequence,
        }
    }

    /// Serialize ack to bytes (8 bytes).
    pub fn to_bytes(&self) -> [u8; ACK_SIZE] {
        let mut buf = [0u8; ACK_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_be_bytes());
        buf[4..8].copy_from_slice(&self.sequence.to_be_bytes());
        buf
    }

    /// Parse an ack from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < ACK_SIZE {
            return Err(FrameError::TooShort {
                expected: ACK_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            magic: read_u32(bytes, 0),
            sequence: read_u32(bytes, 4),
        })
    }

    /// Whether this ack confirms exactly the given packet.
    pub fn acknowledges(&self, kind: PacketKind, sequence: u32) -> bool {
        self.magic == kind.magic() && self.sequence == sequence
    }
}

/// Errors produced while encoding or decoding packets.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer is too short.
    #[error("packet too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum expected size.
        expected: usize,
        /// Actual size available.
        actual: usize,
    },

    /// Audio payload exceeds the endpoint limit.
    #[error("audio payload too large: {0} bytes")]
    PayloadTooLarge(usize),
}

/// Incremental decoder for the device-to-endpoint byte stream.
///
/// Bytes are appended with [`feed`](Self::feed); complete packets are drained
/// with [`next_packet`](Self::next_packet). Unknown magic numbers are skipped
/// four bytes at a time so the stream can resynchronize.
#[derive(Debug, Default)]
pub struct PacketDecoder {
    buffer: Vec<u8>,
    skipped: usize,
}

impl PacketDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Total bytes discarded because of unknown magic numbers.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Extract the next complete packet, if one is buffered.
    ///
    /// Returns `Err(PayloadTooLarge)` when an audio header announces a
    /// payload above [`MAX_PACKET_SIZE`]; the stream cannot be trusted after
    /// that and the caller should drop the connection.
    pub fn next_packet(&mut self) -> Result<Option<Packet>, FrameError> {
        loop {
            if self.buffer.len() < MIN_PACKET_SIZE {
                return Ok(None);
            }

            let magic = read_u32(&self.buffer, 0);
            let sequence = read_u32(&self.buffer, 4);

            let (packet, consumed) = match PacketKind::from_magic(magic) {
                Some(PacketKind::Handshake) => (Packet::Handshake { sequence }, HANDSHAKE_SIZE),
                Some(PacketKind::Heartbeat) => (
                    Packet::Heartbeat {
                        sequence,
                        timestamp: read_u32(&self.buffer, 8),
                    },
                    HEARTBEAT_SIZE,
                ),
                Some(PacketKind::Audio) => {
                    if self.buffer.len() < AUDIO_HEADER_SIZE {
                        return Ok(None);
                    }
                    let length = read_u32(&self.buffer, 8) as usize;
                    if length > MAX_PACKET_SIZE {
                        return Err(FrameError::PayloadTooLarge(length));
                    }
                    let total = AUDIO_HEADER_SIZE + length;
                    if self.buffer.len() < total {
                        return Ok(None);
                    }
                    (
                        Packet::Audio {
                            sequence,
                            timestamp: read_u32(&self.buffer, 12),
                            payload: self.buffer[AUDIO_HEADER_SIZE..total].to_vec(),
                        },
                        total,
                    )
                }
                None => {
                    self.buffer.drain(..4);
                    self.skipped += 4;
                    continue;
                }
            };

            self.buffer.drain(..consumed);
            return Ok(Some(packet));
        }
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
