//! TCP stream transport and bounded reads.
//!
//! Provides the [`Transport`]/[`Connector`] implementations used on real
//! hosts, plus [`read_exact_within`], the one place a reply is read under the
//! socket-level timeout.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::error::{TransportError, TransportResult};
use crate::core::{Connector, Transport};

/// A connected TCP stream to the ingestion endpoint.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Wrap a connected stream. Nagle is disabled so small acks and packets
    /// are not delayed.
    pub fn new(stream: TcpStream) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "failed to disable nagle");
        }
        Self { stream }
    }

    /// Get a reference to the underlying stream.
    pub fn inner(&self) -> &TcpStream {
        &self.stream
    }
}

impl Transport for TcpTransport {
    async fn send_all(&mut self, data: &[u8]) -> io::Result<()> {
        trace!(len = data.len(), "tcp send");
        self.stream.write_all(data).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).await
    }

    async fn shutdown(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// Opens TCP connections to a fixed `host:port`.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    target: String,
}

impl TcpConnector {
    /// Create a connector for `host:port`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// Target address.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Connector for TcpConnector {
    type Stream = TcpTransport;

    async fn connect(&self) -> io::Result<TcpTransport> {
        let stream = TcpStream::connect(self.target.as_str()).await?;
        Ok(TcpTransport::new(stream))
    }
}

/// Fill `buf` from the transport within `timeout`.
///
/// End of stream before `buf` is full is a [`TransportError::ShortRead`];
/// running out of time is a [`TransportError::Timeout`].
pub async fn read_exact_within<T: Transport>(
    transport: &mut T,
    buf: &mut [u8],
    timeout: Duration,
) -> TransportResult<()> {
    let expected = buf.len();
    let read = async {
        let mut filled = 0;
        while filled < expected {
            let n = transport.recv(&mut buf[filled..]).await?;
            if n == 0 {
                return Err(TransportError::ShortRead {
                    expected,
                    actual: filled,
                });
            }
            filled += n;
        }
        Ok::<(), TransportError>(())
    };

    match tokio::time::timeout(timeout, read).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    }
}
