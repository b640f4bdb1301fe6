//! Error types for the voxlink client.
//!
//! Each layer reports failure as a value; the orchestrator's failure switch
//! ([`ClientError::requires_reconnect`]) decides what happens next. Nothing
//! here is ever terminal for the process.

use std::path::PathBuf;

use thiserror::Error;

use crate::transport::TransportError;

/// Radio association could not be established.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Every association attempt failed or timed out.
    #[error("link association failed after {attempts} attempts")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },
}

/// Transport connection or handshake could not be established.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// Radio is not associated, so no transport can be opened.
    #[error("link is down")]
    LinkDown,

    /// Every connect/handshake attempt failed.
    #[error("handshake failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: TransportError,
    },
}

/// Errors from the sequenced session protocol.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An audio packet went unacknowledged for the whole retry budget.
    #[error("sequence {sequence} unacknowledged after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Outstanding sequence (not advanced).
        sequence: u32,
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: TransportError,
    },

    /// A single exchange failed (heartbeats do not retry).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Liveness loss reported by the heartbeat monitor.
#[derive(Debug, Error)]
pub enum LivenessError {
    /// Too many consecutive heartbeats went unacknowledged.
    #[error("liveness lost after {failures} consecutive heartbeat failures")]
    Fatal {
        /// Consecutive failures counted.
        failures: u32,
    },
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level client errors, as seen by the orchestrator.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Link association exhausted.
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// Transport handshake exhausted.
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Audio send exhausted its retries.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Heartbeat monitor declared the connection dead.
    #[error("liveness error: {0}")]
    Liveness(#[from] LivenessError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Check if this error must be handled by tearing down the connection
    /// and reconnecting.
    pub fn requires_reconnect(&self) -> bool {
        !matches!(self, ClientError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_classification() {
        assert!(ClientError::from(LinkError::Exhausted { attempts: 3 }).requires_reconnect());
        assert!(ClientError::from(HandshakeError::LinkDown).requires_reconnect());
        assert!(ClientError::from(LivenessError::Fatal { failures: 3 }).requires_reconnect());
        assert!(
            ClientError::from(SessionError::RetriesExhausted {
                sequence: 4,
                attempts: 3,
                last: TransportError::Timeout,
            })
            .requires_reconnect()
        );

        assert!(!ClientError::from(ConfigError::Invalid("x".into())).requires_reconnect());
    }

    #[test]
    fn test_error_messages() {
        let err = SessionError::RetriesExhausted {
            sequence: 4,
            attempts: 3,
            last: TransportError::Timeout,
        };
        assert_eq!(
            err.to_string(),
            "sequence 4 unacknowledged after 3 attempts: timed out waiting for reply"
        );
        assert_eq!(
            LivenessError::Fatal { failures: 3 }.to_string(),
            "liveness lost after 3 consecutive heartbeat failures"
        );
    }
}
