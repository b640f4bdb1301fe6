//! Connection state management and the network link.
//!
//! [`NetworkLink`] owns the radio association and the transport stream and
//! walks the connection state machine:
//!
//! ```text
//! Disconnected ──► LinkConnecting ──► TransportHandshaking ──► Connected
//!      ▲                 │                    │                    │
//!      └─────────────────┴──── failure ───────┴──── any I/O error ─┘
//! ```

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::error::{TransportError, TransportResult};
use super::packet::Packet;
use super::socket::read_exact_within;
use crate::config::Timings;
use crate::core::constants::{HANDSHAKE_MAGIC, HANDSHAKE_REPLY_SIZE};
use crate::core::{Connector, HandshakeError, LinkError, Radio, StateObserver, Transport};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No usable connection.
    #[default]
    Disconnected,
    /// Radio association in progress.
    LinkConnecting,
    /// Socket open, handshake in progress.
    TransportHandshaking,
    /// Link associated and handshake confirmed.
    Connected,
}

impl ConnectionState {
    /// Persisted string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::LinkConnecting => "link_connecting",
            Self::TransportHandshaking => "transport_handshaking",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Radio association plus one transport stream to the ingestion endpoint.
///
/// The link is itself a [`Transport`]: the session protocol writes packets
/// and reads acks through it. Any I/O error on the stream drops the stream
/// and moves the link to [`ConnectionState::Disconnected`].
///
/// Every state change is reported to the [`StateObserver`] before the call
/// that caused it continues.
#[derive(Debug)]
pub struct NetworkLink<R: Radio, C: Connector, O: StateObserver = ()> {
    radio: R,
    connector: C,
    stream: Option<C::Stream>,
    state: ConnectionState,
    timings: Timings,
    observer: O,
}

impl<R: Radio, C: Connector> NetworkLink<R, C> {
    /// Create a disconnected link with no observer.
    pub fn new(radio: R, connector: C, timings: Timings) -> Self {
        Self::with_observer(radio, connector, timings, ())
    }
}

impl<R: Radio, C: Connector, O: StateObserver> NetworkLink<R, C, O> {
    /// Create a disconnected link that reports transitions to `observer`.
    pub fn with_observer(radio: R, connector: C, timings: Timings, observer: O) -> Self {
        Self {
            radio,
            connector,
            stream: None,
            state: ConnectionState::Disconnected,
            timings,
            observer,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether packets can be exchanged right now.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.stream.is_some()
    }

    /// Get a reference to the radio.
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Get a reference to the state observer.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    async fn set_state(&mut self, next: ConnectionState) {
        if next != self.state {
            debug!(from = %self.state, to = %next, "connection state");
            self.state = next;
            self.observer.on_transition(next).await;
        }
    }

    /// Associate the radio, retrying up to the configured bound.
    ///
    /// Succeeds immediately when the radio is already associated.
    pub async fn connect_link(&mut self) -> Result<(), LinkError> {
        if self.radio.is_associated() {
            return Ok(());
        }

        let attempts = self.timings.max_retries;
        self.set_state(ConnectionState::LinkConnecting).await;
        for attempt in 1..=attempts {
            let outcome = timeout(self.timings.connection_timeout, self.radio.associate()).await;
            match outcome {
                Ok(Ok(())) if self.radio.is_associated() => {
                    info!(attempt, "link associated");
                    return Ok(());
                }
                Ok(Ok(())) => warn!(attempt, "association returned without an association"),
                Ok(Err(e)) => warn!(attempt, error = %e, "link association failed"),
                Err(_) => warn!(attempt, "link association timed out"),
            }
            if attempt < attempts {
                sleep(self.timings.reconnect_delay).await;
            }
        }

        self.set_state(ConnectionState::Disconnected).await;
        Err(LinkError::Exhausted { attempts })
    }

    /// Open the transport and perform the handshake, retrying up to the
    /// configured bound. `sequence` is announced to the endpoint.
    pub async fn connect_transport(&mut self, sequence: u32) -> Result<(), HandshakeError> {
        self.drop_stream().await;
        if !self.radio.is_associated() {
            self.set_state(ConnectionState::Disconnected).await;
            return Err(HandshakeError::LinkDown);
        }

        let attempts = self.timings.max_retries;
        let mut last = TransportError::NotConnected;
        for attempt in 1..=attempts {
            self.set_state(ConnectionState::TransportHandshaking).await;
            match self.open_stream(sequence).await {
                Ok(stream) => {
                    self.stream = Some(stream);
                    self.set_state(ConnectionState::Connected).await;
                    info!(attempt, sequence, "transport connected");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "transport connect failed");
                    last = e;
                }
            }
            if attempt < attempts {
                sleep(self.timings.reconnect_delay).await;
            }
        }

        self.set_state(ConnectionState::Disconnected).await;
        Err(HandshakeError::Exhausted { attempts, last })
    }

    async fn open_stream(&self, sequence: u32) -> TransportResult<C::Stream> {
        let connect = timeout(self.timings.connection_timeout, self.connector.connect());
        let mut stream = match connect.await {
            Ok(result) => result?,
            Err(_) => return Err(TransportError::Timeout),
        };

        match handshake(&mut stream, sequence, self.timings).await {
            Ok(()) => Ok(stream),
            Err(e) => {
                stream.shutdown().await;
                Err(e)
            }
        }
    }

    /// Re-establish link and transport, retrying forever.
    ///
    /// Returns the number of failed rounds before success.
    pub async fn reconnect(&mut self, sequence: u32) -> u32 {
        self.close().await;

        let mut failed_rounds = 0u32;
        loop {
            if !self.radio.is_associated() {
                if let Err(e) = self.connect_link().await {
                    failed_rounds += 1;
                    warn!(failed_rounds, error = %e, "reconnect: link unavailable");
                    sleep(self.timings.reconnect_delay).await;
                    continue;
                }
            }

            match self.connect_transport(sequence).await {
                Ok(()) => {
                    info!(failed_rounds, "reconnected");
                    return failed_rounds;
                }
                Err(e) => {
                    failed_rounds += 1;
                    warn!(failed_rounds, error = %e, "reconnect: transport unavailable");
                    sleep(self.timings.reconnect_delay).await;
                }
            }
        }
    }

    async fn drop_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await;
        }
    }

    /// Close the transport stream, keeping the radio association.
    pub async fn close(&mut self) {
        self.drop_stream().await;
        self.set_state(ConnectionState::Disconnected).await;
    }

    /// Close the transport and drop the radio association.
    pub async fn shutdown(&mut self) {
        self.close().await;
        self.radio.disassociate().await;
    }

    async fn on_stream_lost(&mut self, reason: &(dyn fmt::Display + Sync)) {
        warn!(%reason, "transport lost");
        self.stream = None;
        self.set_state(ConnectionState::Disconnected).await;
    }
}

async fn handshake<T: Transport>(
    stream: &mut T,
    sequence: u32,
    timings: Timings,
) -> TransportResult<()> {
    let hello = Packet::Handshake { sequence }.encode()?;
    stream.send_all(&hello).await?;

    let mut reply = [0u8; HANDSHAKE_REPLY_SIZE];
    read_exact_within(stream, &mut reply, timings.socket_timeout).await?;
    let magic = u32::from_be_bytes(reply);
    if magic != HANDSHAKE_MAGIC {
        debug!(
            magic = format_args!("0x{magic:08x}"),
            "handshake reply with foreign magic accepted"
        );
    }
    Ok(())
}

impl<R: Radio, C: Connector, O: StateObserver> Transport for NetworkLink<R, C, O> {
    async fn send_all(&mut self, data: &[u8]) -> io::Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        };
        let result = stream.send_all(data).await;
        if let Err(e) = &result {
            self.on_stream_lost(e).await;
        }
        result
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        };
        let result = stream.recv(buf).await;
        match &result {
            Ok(0) => self.on_stream_lost(&"end of stream").await,
            Err(e) => self.on_stream_lost(e).await,
            Ok(_) => {}
        }
        result
    }

    async fn shutdown(&mut self) {
        self.close().await;
    }
}
