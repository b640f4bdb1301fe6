//! Scripted collaborator doubles for unit tests.
//!
//! Every double shares its state behind an `Arc<Mutex<_>>`, so a test keeps a
//! clone for inspection while the component under test owns the other.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use crate::core::{AudioSource, Connector, Radio, StateObserver, Transport};
use crate::transport::{Ack, ConnectionState, PacketKind};

/// One scripted reaction to a `recv` call.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    /// Deliver these bytes (split across calls if the buffer is smaller).
    Data(Vec<u8>),
    /// Report end of stream.
    Eof,
    /// Never complete; the caller's timeout must fire.
    Stall,
    /// Fail with an I/O error of this kind.
    Fail(io::ErrorKind),
}

impl Reply {
    /// Ack bytes for a packet.
    pub(crate) fn ack(kind: PacketKind, sequence: u32) -> Self {
        Reply::Data(Ack::new(kind, sequence).to_bytes().to_vec())
    }

    /// Four-byte handshake confirmation.
    pub(crate) fn handshake_ok() -> Self {
        Reply::Data(PacketKind::Handshake.magic().to_be_bytes().to_vec())
    }
}

#[derive(Debug, Default)]
struct TransportScript {
    replies: VecDeque<Reply>,
    sent: Vec<Vec<u8>>,
    send_error: Option<io::ErrorKind>,
    shutdowns: u32,
}

/// Transport that records writes and answers reads from a script.
///
/// An exhausted script stalls, like a silent peer.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<TransportScript>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
        let transport = Self::new();
        for reply in replies {
            transport.push_reply(reply);
        }
        transport
    }

    pub(crate) fn push_reply(&self, reply: Reply) {
        self.script.lock().unwrap().replies.push_back(reply);
    }

    /// Make every subsequent `send_all` fail.
    pub(crate) fn fail_sends(&self, kind: io::ErrorKind) {
        self.script.lock().unwrap().send_error = Some(kind);
    }

    /// Everything written so far, one entry per `send_all`.
    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.script.lock().unwrap().sent.clone()
    }

    pub(crate) fn shutdowns(&self) -> u32 {
        self.script.lock().unwrap().shutdowns
    }
}

impl Transport for ScriptedTransport {
    async fn send_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut script = self.script.lock().unwrap();
        if let Some(kind) = script.send_error {
            return Err(io::Error::from(kind));
        }
        script.sent.push(data.to_vec());
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let reply = self.script.lock().unwrap().replies.pop_front();
        match reply {
            Some(Reply::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    let rest = data.split_off(n);
                    self.script
                        .lock()
                        .unwrap()
                        .replies
                        .push_front(Reply::Data(rest));
                }
                Ok(n)
            }
            Some(Reply::Eof) => Ok(0),
            Some(Reply::Fail(kind)) => Err(io::Error::from(kind)),
            Some(Reply::Stall) | None => std::future::pending().await,
        }
    }

    async fn shutdown(&mut self) {
        self.script.lock().unwrap().shutdowns += 1;
    }
}

#[derive(Debug, Default)]
struct ConnectorScript {
    outcomes: VecDeque<Result<ScriptedTransport, io::ErrorKind>>,
    attempts: u32,
}

/// Connector that hands out scripted transports or failures in order.
///
/// An exhausted script refuses every connection.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedConnector {
    script: Arc<Mutex<ConnectorScript>>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a connection that completes the handshake and returns the
    /// transport for inspection.
    pub(crate) fn accept_with_handshake(&self) -> ScriptedTransport {
        let transport = ScriptedTransport::with_replies([Reply::handshake_ok()]);
        self.accept(transport.clone());
        transport
    }

    pub(crate) fn accept(&self, transport: ScriptedTransport) {
        self.script
            .lock()
            .unwrap()
            .outcomes
            .push_back(Ok(transport));
    }

    pub(crate) fn refuse(&self, times: u32) {
        let mut script = self.script.lock().unwrap();
        for _ in 0..times {
            script
                .outcomes
                .push_back(Err(io::ErrorKind::ConnectionRefused));
        }
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.script.lock().unwrap().attempts
    }
}

impl Connector for ScriptedConnector {
    type Stream = ScriptedTransport;

    async fn connect(&self) -> io::Result<ScriptedTransport> {
        let mut script = self.script.lock().unwrap();
        script.attempts += 1;
        match script.outcomes.pop_front() {
            Some(Ok(transport)) => Ok(transport),
            Some(Err(kind)) => Err(io::Error::from(kind)),
            None => Err(io::Error::from(io::ErrorKind::ConnectionRefused)),
        }
    }
}

#[derive(Debug, Default)]
struct RadioScript {
    failures_left: u32,
    associated: bool,
    associate_calls: u32,
}

/// Radio that fails a set number of associations before succeeding.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedRadio {
    script: Arc<Mutex<RadioScript>>,
}

impl ScriptedRadio {
    pub(crate) fn failing(times: u32) -> Self {
        let radio = Self::default();
        radio.script.lock().unwrap().failures_left = times;
        radio
    }

    pub(crate) fn associated() -> Self {
        let radio = Self::default();
        radio.script.lock().unwrap().associated = true;
        radio
    }

    /// Simulate losing the access point.
    pub(crate) fn drop_association(&self) {
        self.script.lock().unwrap().associated = false;
    }

    pub(crate) fn associate_calls(&self) -> u32 {
        self.script.lock().unwrap().associate_calls
    }
}

impl Radio for ScriptedRadio {
    async fn associate(&mut self) -> io::Result<()> {
        let mut script = self.script.lock().unwrap();
        script.associate_calls += 1;
        if script.failures_left > 0 {
            script.failures_left -= 1;
            return Err(io::Error::new(io::ErrorKind::NotConnected, "no access point"));
        }
        script.associated = true;
        Ok(())
    }

    fn is_associated(&self) -> bool {
        self.script.lock().unwrap().associated
    }

    async fn disassociate(&mut self) {
        self.script.lock().unwrap().associated = false;
    }
}

/// Observer that records every transition it is told about.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingObserver {
    seen: Arc<Mutex<Vec<ConnectionState>>>,
}

impl RecordingObserver {
    pub(crate) fn transitions(&self) -> Vec<ConnectionState> {
        self.seen.lock().unwrap().clone()
    }
}

impl StateObserver for RecordingObserver {
    async fn on_transition(&mut self, state: ConnectionState) {
        self.seen.lock().unwrap().push(state);
    }
}

/// Audio source that replays queued frames, then fails with end of stream.
#[derive(Debug, Default)]
pub(crate) struct ScriptedSource {
    frames: VecDeque<io::Result<Vec<u8>>>,
}

impl ScriptedSource {
    pub(crate) fn new(frames: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            frames: frames.into_iter().map(Ok).collect(),
        }
    }

    pub(crate) fn push_error(&mut self, kind: io::ErrorKind) {
        self.frames.push_back(Err(io::Error::from(kind)));
    }
}

impl AudioSource for ScriptedSource {
    async fn read_frame(&mut self) -> io::Result<Vec<u8>> {
        self.frames
            .pop_front()
            .unwrap_or_else(|| Err(io::Error::from(io::ErrorKind::UnexpectedEof)))
    }
}

/// A frame of `samples` little-endian samples all equal to `value`.
pub(crate) fn constant_frame(value: i16, samples: usize) -> Vec<u8> {
    let mut frame = Vec::with_capacity(samples * 2);
    for _ in 0..samples {
        frame.extend_from_slice(&value.to_le_bytes());
    }
    frame
}
