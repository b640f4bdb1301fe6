//! Transport layer error types.
//!
//! Every variant here is recoverable from the session's point of view: the
//! operation that hit it retries within its own budget, and only an
//! exhausted budget escalates to a reconnect.

use std::io;

use thiserror::Error;

use super::packet::FrameError;

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Packet encoding or decoding error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// I/O error (socket operations).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// No reply arrived within the socket timeout.
    #[error("timed out waiting for reply")]
    Timeout,

    /// Peer closed the stream before a full reply arrived.
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Bytes required.
        expected: usize,
        /// Bytes received before end of stream.
        actual: usize,
    },

    /// Ack echoed a different magic than the outstanding packet's.
    #[error("unexpected ack magic: expected 0x{expected:08x}, got 0x{actual:08x}")]
    UnexpectedMagic {
        /// Magic of the outstanding packet.
        expected: u32,
        /// Magic echoed by the peer.
        actual: u32,
    },

    /// Ack echoed a different sequence than the outstanding packet's.
    #[error("ack sequence mismatch: expected {expected}, got {actual}")]
    AckMismatch {
        /// Outstanding sequence.
        expected: u32,
        /// Sequence echoed by the peer.
        actual: u32,
    },

    /// No transport connection is open.
    #[error("not connected")]
    NotConnected,
}

impl TransportError {
    /// Check if this error is a protocol violation (garbled or mismatched ack)
    /// rather than a socket condition.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            TransportError::Frame(_)
                | TransportError::UnexpectedMagic { .. }
                | TransportError::AckMismatch { .. }
        )
    }

    /// Check if the connection is unusable and further attempts on it are
    /// pointless until a reconnect.
    pub fn is_connection_lost(&self) -> bool {
        match self {
            TransportError::NotConnected => true,
            TransportError::ShortRead { .. } => true,
            TransportError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::NotConnected
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
