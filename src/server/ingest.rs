//! TCP listener for device connections.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::session::{Action, IngestSession};
use super::sink::AudioSink;
use crate::core::constants::DEFAULT_IDLE_TIMEOUT;
use crate::transport::FrameError;

/// Errors that end a device connection or the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device sent a stream that cannot be decoded.
    #[error("undecodable stream: {0}")]
    Frame(#[from] FrameError),

    /// The device went silent.
    #[error("connection idle for {0:?}")]
    IdleTimeout(Duration),
}

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Accepts device connections and serves each on its own task.
#[derive(Debug)]
pub struct IngestServer<K: AudioSink> {
    listener: TcpListener,
    local_addr: SocketAddr,
    sink: Arc<K>,
    idle_timeout: Duration,
}

impl<K: AudioSink> IngestServer<K> {
    /// Bind a listener.
    pub async fn bind(addr: impl ToSocketAddrs, sink: K) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await.map_err(ServerError::Bind)?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            sink: Arc::new(sink),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        })
    }

    /// Set how long a connection may stay silent.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(addr = %self.local_addr, "ingest server listening");
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };
            info!(%peer, "device connected");

            let sink = Arc::clone(&self.sink);
            let idle_timeout = self.idle_timeout;
            tokio::spawn(async move {
                match serve_connection(stream, peer, sink, idle_timeout).await {
                    Ok(()) => info!(%peer, "device disconnected"),
                    Err(e) => warn!(%peer, error = %e, "device connection closed"),
                }
            });
        }
    }
}

async fn serve_connection<K: AudioSink>(
    mut stream: TcpStream,
    peer: SocketAddr,
    sink: Arc<K>,
    idle_timeout: Duration,
) -> Result<(), ServerError> {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%peer, error = %e, "failed to disable nagle");
    }
    let mut session = IngestSession::new(peer.to_string());
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = match timeout(idle_timeout, stream.read(&mut buf)).await {
            Ok(read) => read?,
            Err(_) => return Err(ServerError::IdleTimeout(idle_timeout)),
        };
        if n == 0 {
            return Ok(());
        }
        session.feed(&buf[..n]);

        while let Some(packet) = session.next_packet()? {
            match session.on_packet(packet) {
                Action::Reply(bytes) => stream.write_all(&bytes).await?,
                Action::Deliver(chunk) => {
                    let sequence = chunk.sequence;
                    if let Err(e) = sink.deliver(chunk).await {
                        warn!(%peer, sequence, error = %e, "sink rejected audio, ack withheld");
                        continue;
                    }
                    let ack = session.delivered(sequence);
                    stream.write_all(&ack).await?;
                    debug!(%peer, sequence, "audio acknowledged");
                }
                Action::Drop(reason) => debug!(%peer, ?reason, "packet dropped"),
            }
        }
    }
}
