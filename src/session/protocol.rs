//! Sequenced stop-and-wait ARQ over a [`Transport`].
//!
//! Exactly one packet is outstanding at a time. The endpoint acknowledges a
//! packet by echoing its magic and sequence in an 8-byte ack. An audio packet
//! that is not acknowledged within the socket timeout is retransmitted
//! byte-for-byte, up to the retry bound; the sequence only advances on an
//! acknowledgment.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::config::Timings;
use crate::core::constants::ACK_SIZE;
use crate::core::{BlobStore, SessionError, Transport, unix_timestamp};
use crate::storage::PersistentCursor;
use crate::transport::{
    Ack, ConnectionState, Packet, PacketKind, TransportError, TransportResult, read_exact_within,
};

/// Sender half of the session protocol.
///
/// Owns the sequence counter and persists it through the cursor after every
/// acknowledged audio packet.
#[derive(Debug)]
pub struct SessionProtocol<S: BlobStore> {
    sequence: u32,
    cursor: PersistentCursor<S>,
    max_retries: u32,
    socket_timeout: Duration,
    retry_delay: Duration,
    retransmissions: u64,
}

impl<S: BlobStore> SessionProtocol<S> {
    /// Create a protocol starting at `sequence`.
    pub fn new(sequence: u32, cursor: PersistentCursor<S>, timings: Timings) -> Self {
        Self {
            sequence,
            cursor,
            max_retries: timings.max_retries,
            socket_timeout: timings.socket_timeout,
            retry_delay: timings.retry_delay,
            retransmissions: 0,
        }
    }

    /// Sequence number of the next audio packet.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Total retransmissions since creation.
    pub fn retransmissions(&self) -> u64 {
        self.retransmissions
    }

    /// Persist the current sequence with the given connection state.
    pub async fn persist(&self, state: ConnectionState) {
        self.cursor.save(self.sequence, state).await;
    }

    /// Send one audio frame and wait for its acknowledgment.
    ///
    /// Returns the acknowledged sequence. On failure the sequence is left
    /// unchanged so the frame's successor reuses it.
    pub async fn send_audio<T: Transport>(
        &mut self,
        transport: &mut T,
        frame: &[u8],
    ) -> Result<u32, SessionError> {
        let sequence = self.sequence;
        let packet = Packet::Audio {
            sequence,
            timestamp: unix_timestamp(),
            payload: frame.to_vec(),
        }
        .encode()
        .map_err(TransportError::from)?;

        let mut last = TransportError::NotConnected;
        for attempt in 1..=self.max_retries {
            if attempt > 1 {
                self.retransmissions += 1;
                sleep(self.retry_delay).await;
            }
            match self
                .exchange(transport, &packet, PacketKind::Audio, sequence)
                .await
            {
                Ok(()) => {
                    debug!(sequence, attempt, len = frame.len(), "audio acknowledged");
                    self.advance();
                    self.persist(ConnectionState::Connected).await;
                    return Ok(sequence);
                }
                Err(e) => {
                    warn!(
                        sequence,
                        attempt,
                        connection_lost = e.is_connection_lost(),
                        error = %e,
                        "audio not acknowledged"
                    );
                    last = e;
                }
            }
        }

        Err(SessionError::RetriesExhausted {
            sequence,
            attempts: self.max_retries,
            last,
        })
    }

    /// Send one heartbeat carrying the current sequence and wait for its
    /// acknowledgment. Never retries.
    pub async fn send_heartbeat<T: Transport>(
        &mut self,
        transport: &mut T,
    ) -> Result<(), SessionError> {
        let sequence = self.sequence;
        let packet = Packet::Heartbeat {
            sequence,
            timestamp: unix_timestamp(),
        }
        .encode()
        .map_err(TransportError::from)?;

        self.exchange(transport, &packet, PacketKind::Heartbeat, sequence)
            .await?;
        debug!(sequence, "heartbeat acknowledged");
        Ok(())
    }

    fn advance(&mut self) {
        let (next, wrapped) = self.sequence.overflowing_add(1);
        if wrapped {
            warn!("sequence counter wrapped to 0");
        }
        self.sequence = next;
    }

    async fn exchange<T: Transport>(
        &self,
        transport: &mut T,
        packet: &[u8],
        kind: PacketKind,
        sequence: u32,
    ) -> TransportResult<()> {
        trace!(len = packet.len(), ?kind, sequence, "send");
        transport.send_all(packet).await?;

        let mut reply = [0u8; ACK_SIZE];
        read_exact_within(transport, &mut reply, self.socket_timeout).await?;
        let ack = Ack::from_bytes(&reply)?;
        if ack.acknowledges(kind, sequence) {
            return Ok(());
        }
        if ack.magic != kind.magic() {
            return Err(TransportError::UnexpectedMagic {
                expected: kind.magic(),
                actual: ack.magic,
            });
        }
        Err(TransportError::AckMismatch {
            expected: sequence,
            actual: ack.sequence,
        })
    }
}
