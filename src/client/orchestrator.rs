//! The device main loop.
//!
//! ```text
//! start ─► read frame ─► voice? ─yes─► send_audio ─┐
//!              ▲            │no                     │ok
//!              │            ▼                       ▼
//!              └──────── liveness tick ◄────────────┘
//!                           │fatal        send failed
//!                           ▼                 │
//!                        recover ◄────────────┘
//! ```
//!
//! Everything runs on the caller's task, one awaited step at a time.

use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use crate::audio::{NoiseEstimate, VoiceActivityGate};
use crate::config::{ClientConfig, Timings};
use crate::core::{AudioSource, BlobStore, ClientError, Connector, Radio};
use crate::session::{Heartbeat, LivenessMonitor, SessionProtocol};
use crate::storage::PersistentCursor;
use crate::transport::{ConnectionState, NetworkLink};

/// What happened to the captured frame in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Voice frame sent and acknowledged with this sequence.
    Sent {
        /// Acknowledged sequence.
        sequence: u32,
    },
    /// Frame gated out as silence.
    Silent,
    /// Capture failed; nothing was sent.
    CaptureFailed,
}

/// Result of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Frame handling.
    pub frame: FrameOutcome,
    /// Liveness tick.
    pub heartbeat: Heartbeat,
}

/// Counters kept by the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Frames read from the capture source.
    pub frames_captured: u64,
    /// Frames sent and acknowledged.
    pub frames_sent: u64,
    /// Frames gated out as silence.
    pub frames_silent: u64,
    /// Capture errors swallowed.
    pub capture_errors: u64,
    /// Acknowledged heartbeats.
    pub heartbeats_acked: u64,
    /// Missed heartbeats.
    pub heartbeats_missed: u64,
    /// Completed recoveries.
    pub reconnects: u64,
}

/// Sequential controller for an unattended voice streaming device.
pub struct Orchestrator<A, R, C, S>
where
    A: AudioSource,
    R: Radio,
    C: Connector,
    S: BlobStore,
{
    source: A,
    gate: VoiceActivityGate,
    link: NetworkLink<R, C, PersistentCursor<S>>,
    protocol: SessionProtocol<S>,
    liveness: LivenessMonitor,
    timings: Timings,
    stats: ClientStats,
}

impl<A, R, C, S> Orchestrator<A, R, C, S>
where
    A: AudioSource,
    R: Radio,
    C: Connector,
    S: BlobStore,
{
    /// Validate the configuration and restore the persisted sequence.
    ///
    /// The persisted connection state is informational only; the
    /// orchestrator always starts disconnected. From then on every link
    /// transition is written back through the same cursor.
    pub async fn new(
        config: &ClientConfig,
        source: A,
        radio: R,
        connector: C,
        store: S,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let timings = config.timings();

        let cursor = PersistentCursor::new(store);
        let restored = cursor.load().await;
        info!(
            sequence = restored.sequence,
            last_state = %restored.connection_state,
            "restored device state"
        );

        Ok(Self {
            source,
            gate: VoiceActivityGate::new(
                config.audio.vad_threshold,
                NoiseEstimate::from(config.audio.noise),
            ),
            link: NetworkLink::with_observer(radio, connector, timings, cursor.clone()),
            protocol: SessionProtocol::new(restored.sequence, cursor, timings),
            liveness: LivenessMonitor::new(timings),
            timings,
            stats: ClientStats::default(),
        })
    }

    /// Next sequence to send.
    pub fn sequence(&self) -> u32 {
        self.protocol.sequence()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    /// Counters.
    pub fn stats(&self) -> ClientStats {
        self.stats
    }

    /// Get a reference to the network link.
    pub fn link(&self) -> &NetworkLink<R, C, PersistentCursor<S>> {
        &self.link
    }

    /// Get a reference to the voice gate.
    pub fn gate(&self) -> &VoiceActivityGate {
        &self.gate
    }

    /// Establish link and transport, retrying until both are up.
    pub async fn start(&mut self) {
        let failed_rounds = self.link.reconnect(self.protocol.sequence()).await;
        self.on_connected(failed_rounds).await;
    }

    /// Run one iteration: capture, gate, send, liveness.
    ///
    /// An error means the connection must be recovered with
    /// [`recover`](Self::recover) before the next step.
    pub async fn step(&mut self) -> Result<StepOutcome, ClientError> {
        let frame = match self.source.read_frame().await {
            Ok(frame) => {
                self.stats.frames_captured += 1;
                self.handle_frame(&frame).await?
            }
            Err(e) => {
                self.stats.capture_errors += 1;
                warn!(error = %e, "capture failed");
                sleep(self.timings.retry_delay).await;
                FrameOutcome::CaptureFailed
            }
        };

        let heartbeat = self
            .liveness
            .tick(Instant::now(), &mut self.protocol, &mut self.link)
            .await?;
        match heartbeat {
            Heartbeat::Acknowledged => self.stats.heartbeats_acked += 1,
            Heartbeat::Missed { .. } => self.stats.heartbeats_missed += 1,
            Heartbeat::Skipped => {}
        }

        Ok(StepOutcome { frame, heartbeat })
    }

    async fn handle_frame(&mut self, frame: &[u8]) -> Result<FrameOutcome, ClientError> {
        if !self.gate.is_voice(frame) {
            self.stats.frames_silent += 1;
            return Ok(FrameOutcome::Silent);
        }

        let sequence = self.protocol.send_audio(&mut self.link, frame).await?;
        self.stats.frames_sent += 1;
        Ok(FrameOutcome::Sent { sequence })
    }

    /// Tear down the connection after `err` and block until it is back.
    pub async fn recover(&mut self, err: &ClientError) {
        warn!(error = %err, sequence = self.protocol.sequence(), "connection failure, reconnecting");
        self.link.close().await;

        let failed_rounds = self.link.reconnect(self.protocol.sequence()).await;
        self.stats.reconnects += 1;
        self.on_connected(failed_rounds).await;
    }

    async fn on_connected(&mut self, failed_rounds: u32) {
        self.liveness.reset();
        info!(
            sequence = self.protocol.sequence(),
            failed_rounds, "streaming"
        );
    }

    /// Start, then step forever, recovering from every failure.
    pub async fn run(&mut self) {
        self.start().await;
        loop {
            match self.step().await {
                Ok(outcome) => debug!(?outcome, "step"),
                Err(e) if e.requires_reconnect() => self.recover(&e).await,
                Err(e) => {
                    error!(error = %e, "step failed");
                    sleep(self.timings.reconnect_delay).await;
                }
            }
        }
    }

    /// Close the connection and drop the radio association. The link
    /// persists the final state.
    pub async fn shutdown(&mut self) {
        self.link.shutdown().await;
        info!(sequence = self.protocol.sequence(), "client stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfigBuilder;
    use crate::core::SessionError;
    use crate::storage::MemoryStore;
    use crate::testing::{
        Reply, ScriptedConnector, ScriptedRadio, ScriptedSource, ScriptedTransport, constant_frame,
    };
    use crate::transport::PacketKind;
    use std::time::Duration;

    type TestOrchestrator =
        Orchestrator<ScriptedSource, ScriptedRadio, ScriptedConnector, MemoryStore>;

    fn config() -> ClientConfig {
        ClientConfigBuilder::new()
            .frame_samples(64)
            .vad_threshold(1000.0)
            .build()
    }

    async fn orchestrator(
        source: ScriptedSource,
        connector: &ScriptedConnector,
        store: &MemoryStore,
    ) -> TestOrchestrator {
        Orchestrator::new(
            &config(),
            source,
            ScriptedRadio::associated(),
            connector.clone(),
            store.clone(),
        )
        .await
        .unwrap()
    }

    async fn persisted(store: &MemoryStore) -> crate::storage::PersistedState {
        PersistentCursor::new(store.clone()).load().await
    }

    #[tokio::test(start_paused = true)]
    async fn test_voice_frame_sent_then_heartbeat() {
        let connector = ScriptedConnector::new();
        let transport = connector.accept_with_handshake();
        transport.push_reply(Reply::ack(PacketKind::Audio, 0));
        transport.push_reply(Reply::ack(PacketKind::Heartbeat, 1));
        let store = MemoryStore::new();
        let source = ScriptedSource::new([constant_frame(3000, 64)]);

        let mut client = orchestrator(source, &connector, &store).await;
        client.start().await;
        assert_eq!(client.state(), ConnectionState::Connected);

        let outcome = client.step().await.unwrap();
        assert_eq!(outcome.frame, FrameOutcome::Sent { sequence: 0 });
        assert_eq!(outcome.heartbeat, Heartbeat::Acknowledged);
        assert_eq!(client.sequence(), 1);
        assert_eq!(persisted(&store).await.sequence, 1);

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(hex::encode(&sent[0]), "deadbeef0000000000000000");
        assert_eq!(hex::encode(&sent[1][0..4]), "aabbccdd");
        assert_eq!(hex::encode(&sent[2][0..8]), "ffeeddcc00000001");
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_frame_not_sent() {
        let connector = ScriptedConnector::new();
        let transport = connector.accept_with_handshake();
        transport.push_reply(Reply::ack(PacketKind::Heartbeat, 0));
        let store = MemoryStore::new();
        let source = ScriptedSource::new([constant_frame(0, 64), constant_frame(0, 64)]);

        let mut client = orchestrator(source, &connector, &store).await;
        client.start().await;

        assert_eq!(client.step().await.unwrap().frame, FrameOutcome::Silent);
        let second = client.step().await.unwrap();
        assert_eq!(second.frame, FrameOutcome::Silent);
        assert_eq!(second.heartbeat, Heartbeat::Skipped);

        // Handshake and one heartbeat only.
        assert_eq!(transport.sent().len(), 2);
        assert_eq!(client.sequence(), 0);
        assert_eq!(client.stats().frames_silent, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_send_recovers_without_advancing() {
        let connector = ScriptedConnector::new();
        let first = connector.accept_with_handshake();
        let second = connector.accept_with_handshake();
        let store = MemoryStore::new();
        let source = ScriptedSource::new([constant_frame(3000, 64)]);

        let mut client = orchestrator(source, &connector, &store).await;
        client.start().await;

        let err = client.step().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Session(SessionError::RetriesExhausted { sequence: 0, .. })
        ));
        assert_eq!(first.sent().len(), 1 + 3);

        client.recover(&err).await;
        assert_eq!(first.shutdowns(), 1);
        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(client.sequence(), 0);
        assert_eq!(client.stats().reconnects, 1);
        assert_eq!(hex::encode(&second.sent()[0]), "deadbeef0000000000000000");

        let state = persisted(&store).await;
        assert_eq!(state.sequence, 0);
        assert_eq!(state.connection_state, ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_liveness_escalates() {
        let connector = ScriptedConnector::new();
        let transport = ScriptedTransport::with_replies([
            Reply::handshake_ok(),
            Reply::Fail(std::io::ErrorKind::ConnectionReset),
        ]);
        connector.accept(transport);
        let store = MemoryStore::new();
        let config = ClientConfigBuilder::new().max_retries(1).build();
        let source = ScriptedSource::new([constant_frame(0, 64)]);

        let mut client = Orchestrator::new(
            &config,
            source,
            ScriptedRadio::associated(),
            connector.clone(),
            store.clone(),
        )
        .await
        .unwrap();
        client.start().await;

        let err = client.step().await.unwrap_err();
        assert!(matches!(err, ClientError::Liveness(_)));
        assert!(err.requires_reconnect());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_error_swallowed() {
        let connector = ScriptedConnector::new();
        let transport = connector.accept_with_handshake();
        transport.push_reply(Reply::ack(PacketKind::Heartbeat, 0));
        let store = MemoryStore::new();
        let mut source = ScriptedSource::default();
        source.push_error(std::io::ErrorKind::Interrupted);

        let mut client = orchestrator(source, &connector, &store).await;
        client.start().await;

        let started = Instant::now();
        let outcome = client.step().await.unwrap();
        assert_eq!(outcome.frame, FrameOutcome::CaptureFailed);
        assert_eq!(outcome.heartbeat, Heartbeat::Acknowledged);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(client.stats().capture_errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restores_persisted_sequence() {
        let connector = ScriptedConnector::new();
        let transport = connector.accept_with_handshake();
        let store = MemoryStore::with_blob(r#"{"sequence":42,"connection_state":"connected"}"#);

        let mut client = orchestrator(ScriptedSource::default(), &connector, &store).await;
        assert_eq!(client.sequence(), 42);
        assert_eq!(client.state(), ConnectionState::Disconnected);

        client.start().await;
        assert_eq!(hex::encode(&transport.sent()[0]), "deadbeef0000002a00000000");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_retries_until_connected() {
        let connector = ScriptedConnector::new();
        connector.refuse(4);
        connector.accept_with_handshake();
        let store = MemoryStore::new();

        let mut client = orchestrator(ScriptedSource::default(), &connector, &store).await;
        client.start().await;

        assert_eq!(connector.attempts(), 5);
        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(
            persisted(&store).await.connection_state,
            ConnectionState::Connected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_loss_persisted_before_liveness_gives_up() {
        let connector = ScriptedConnector::new();
        let transport = ScriptedTransport::with_replies([
            Reply::handshake_ok(),
            Reply::Fail(std::io::ErrorKind::ConnectionReset),
        ]);
        connector.accept(transport);
        let store = MemoryStore::with_blob(r#"{"sequence":4,"connection_state":"connected"}"#);
        let source = ScriptedSource::new([constant_frame(0, 64)]);

        let mut client = orchestrator(source, &connector, &store).await;
        client.start().await;
        assert_eq!(
            persisted(&store).await.connection_state,
            ConnectionState::Connected
        );

        let outcome = client.step().await.unwrap();
        assert_eq!(outcome.heartbeat, Heartbeat::Missed { failures: 1 });
        assert_eq!(client.state(), ConnectionState::Disconnected);

        let state = persisted(&store).await;
        assert_eq!(state.connection_state, client.state());
        assert_eq!(state.sequence, 4);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = ClientConfigBuilder::new().frame_samples(0).build();
        let result = Orchestrator::new(
            &config,
            ScriptedSource::default(),
            ScriptedRadio::associated(),
            ScriptedConnector::new(),
            MemoryStore::new(),
        )
        .await;
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_persists_disconnected() {
        let connector = ScriptedConnector::new();
        connector.accept_with_handshake();
        let store = MemoryStore::new();

        let mut client = orchestrator(ScriptedSource::default(), &connector, &store).await;
        client.start().await;
        client.shutdown().await;

        assert!(!client.link().radio().is_associated());
        assert_eq!(
            persisted(&store).await.connection_state,
            ConnectionState::Disconnected
        );
    }
}
