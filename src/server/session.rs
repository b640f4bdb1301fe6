//! Per-connection receive state, independent of sockets.

use tracing::{debug, info, warn};

use super::sink::AudioChunk;
use crate::core::constants::HANDSHAKE_MAGIC;
use crate::transport::{Ack, FrameError, Packet, PacketDecoder, PacketKind};

/// Why a packet was dropped without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Audio arrived before the handshake.
    Unauthenticated,
    /// Handshake repeated on an authenticated connection.
    RepeatedHandshake,
    /// Audio sequence already delivered.
    Stale {
        /// Sequence the session expects next.
        expected: u32,
    },
    /// Audio sequence ahead of the expected one.
    OutOfOrder {
        /// Sequence the session expects next.
        expected: u32,
    },
}

/// What the connection task should do with a decoded packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write these bytes back to the device.
    Reply(Vec<u8>),
    /// Hand the chunk to the sink, then call
    /// [`IngestSession::delivered`] to obtain the ack.
    Deliver(AudioChunk),
    /// Ignore the packet.
    Drop(DropReason),
}

/// Receive-side protocol state for one device connection.
#[derive(Debug)]
pub struct IngestSession {
    peer: String,
    decoder: PacketDecoder,
    authenticated: bool,
    expected: u32,
    delivered: u64,
}

impl IngestSession {
    /// Create a session for a connection from `peer`.
    pub fn new(peer: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            decoder: PacketDecoder::new(),
            authenticated: false,
            expected: 0,
            delivered: 0,
        }
    }

    /// Remote address.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Whether a handshake has been received.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Sequence expected next.
    pub fn expected(&self) -> u32 {
        self.expected
    }

    /// Chunks delivered on this connection.
    pub fn delivered_count(&self) -> u64 {
        self.delivered
    }

    /// Buffer received bytes.
    pub fn feed(&mut self, data: &[u8]) {
        self.decoder.feed(data);
    }

    /// Next complete packet. An error means the stream is unusable.
    pub fn next_packet(&mut self) -> Result<Option<Packet>, FrameError> {
        self.decoder.next_packet()
    }

    /// Decide how to handle a packet.
    pub fn on_packet(&mut self, packet: Packet) -> Action {
        match packet {
            Packet::Handshake { sequence } => {
                if self.authenticated {
                    return Action::Drop(DropReason::RepeatedHandshake);
                }
                self.authenticated = true;
                self.expected = sequence;
                info!(peer = %self.peer, sequence, "device authenticated");
                Action::Reply(HANDSHAKE_MAGIC.to_be_bytes().to_vec())
            }
            Packet::Heartbeat { sequence, .. } => {
                debug!(peer = %self.peer, sequence, "heartbeat");
                Action::Reply(Ack::new(PacketKind::Heartbeat, sequence).to_bytes().to_vec())
            }
            Packet::Audio {
                sequence,
                timestamp,
                payload,
            } => {
                if !self.authenticated {
                    warn!(peer = %self.peer, sequence, "audio before handshake");
                    return Action::Drop(DropReason::Unauthenticated);
                }
                let expected = self.expected;
                if sequence != expected {
                    // Wrapping distance keeps the comparison valid across u32 wraparound.
                    let behind = (sequence.wrapping_sub(expected) as i32) < 0;
                    let reason = if behind {
                        DropReason::Stale { expected }
                    } else {
                        DropReason::OutOfOrder { expected }
                    };
                    warn!(peer = %self.peer, sequence, expected, ?reason, "audio dropped");
                    return Action::Drop(reason);
                }
                Action::Deliver(AudioChunk {
                    peer: self.peer.clone(),
                    sequence,
                    timestamp,
                    payload,
                })
            }
        }
    }

    /// Record a delivered chunk and return its ack.
    pub fn delivered(&mut self, sequence: u32) -> [u8; 8] {
        self.expected = sequence.wrapping_add(1);
        self.delivered += 1;
        Ack::new(PacketKind::Audio, sequence).to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(sequence: u32) -> Packet {
        Packet::Audio {
            sequence,
            timestamp: 1,
            payload: vec![0; 4],
        }
    }

    #[test]
    fn test_handshake_adopts_sequence() {
        let mut session = IngestSession::new("dev");
        let action = session.on_packet(Packet::Handshake { sequence: 10 });
        assert_eq!(action, Action::Reply(hex::decode("deadbeef").unwrap()));
        assert!(session.is_authenticated());
        assert_eq!(session.expected(), 10);

        assert_eq!(
            session.on_packet(Packet::Handshake { sequence: 99 }),
            Action::Drop(DropReason::RepeatedHandshake)
        );
        assert_eq!(session.expected(), 10);
    }

    #[test]
    fn test_audio_ordering() {
        let mut session = IngestSession::new("dev");
        assert_eq!(
            session.on_packet(audio(0)),
            Action::Drop(DropReason::Unauthenticated)
        );

        session.on_packet(Packet::Handshake { sequence: 5 });
        assert_eq!(
            session.on_packet(audio(4)),
            Action::Drop(DropReason::Stale { expected: 5 })
        );
        assert_eq!(
            session.on_packet(audio(6)),
            Action::Drop(DropReason::OutOfOrder { expected: 5 })
        );

        let Action::Deliver(chunk) = session.on_packet(audio(5)) else {
            panic!("expected delivery");
        };
        assert_eq!(chunk.sequence, 5);
        assert_eq!(hex::encode(session.delivered(5)), "aabbccdd00000005");
        assert_eq!(session.expected(), 6);
        assert_eq!(session.delivered_count(), 1);
    }

    #[test]
    fn test_ordering_across_wraparound() {
        let mut session = IngestSession::new("dev");
        session.on_packet(Packet::Handshake { sequence: u32::MAX });
        assert!(matches!(session.on_packet(audio(u32::MAX)), Action::Deliver(_)));
        session.delivered(u32::MAX);
        assert_eq!(session.expected(), 0);

        assert_eq!(
            session.on_packet(audio(u32::MAX)),
            Action::Drop(DropReason::Stale { expected: 0 })
        );
        assert!(matches!(session.on_packet(audio(0)), Action::Deliver(_)));
    }

    #[test]
    fn test_heartbeat_echo() {
        let mut session = IngestSession::new("dev");
        let action = session.on_packet(Packet::Heartbeat {
            sequence: 12,
            timestamp: 0,
        });
        assert_eq!(
            action,
            Action::Reply(hex::decode("ffeeddcc0000000c").unwrap())
        );
    }

    #[test]
    fn test_feed_split_packets() {
        let mut session = IngestSession::new("dev");
        let bytes = Packet::Handshake { sequence: 1 }.encode().unwrap();
        session.feed(&bytes[..5]);
        assert_eq!(session.next_packet().unwrap(), None);
        session.feed(&bytes[5..]);
        assert_eq!(
            session.next_packet().unwrap(),
            Some(Packet::Handshake { sequence: 1 })
        );
    }
}
