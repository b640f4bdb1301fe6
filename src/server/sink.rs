//! Destinations for received audio.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::mpsc;

/// One in-order audio packet from a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Remote address of the device connection.
    pub peer: String,
    /// Packet sequence.
    pub sequence: u32,
    /// Device capture timestamp (seconds).
    pub timestamp: u32,
    /// Raw PCM bytes.
    pub payload: Vec<u8>,
}

/// Accepts audio before it is acknowledged.
///
/// An error withholds the ack, so the device retransmits the same packet.
pub trait AudioSink: Send + Sync + 'static {
    /// Take ownership of a chunk.
    fn deliver(&self, chunk: AudioChunk) -> impl Future<Output = io::Result<()>> + Send;
}

/// Writes each chunk to `{peer}_{timestamp}_{sequence}.raw` in a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create the directory if needed.
    pub async fn create(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path a chunk is written to.
    pub fn chunk_path(&self, chunk: &AudioChunk) -> PathBuf {
        let peer: String = chunk
            .peer
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
            .collect();
        self.dir
            .join(format!("{peer}_{}_{}.raw", chunk.timestamp, chunk.sequence))
    }
}

impl AudioSink for DirectorySink {
    async fn deliver(&self, chunk: AudioChunk) -> io::Result<()> {
        let path = self.chunk_path(&chunk);
        fs::write(&path, &chunk.payload).await
    }
}

/// Forwards chunks over a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<AudioChunk>,
}

impl ChannelSink {
    /// Create a sink and the receiving end.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AudioChunk>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl AudioSink for ChannelSink {
    async fn deliver(&self, chunk: AudioChunk) -> io::Result<()> {
        self.tx
            .send(chunk)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "audio receiver dropped"))
    }
}
