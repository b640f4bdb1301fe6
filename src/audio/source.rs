//! Frame sources.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::core::AudioSource;

/// Reads fixed-size raw PCM frames from any async byte stream.
///
/// End of stream, including a trailing partial frame, is reported as
/// [`io::ErrorKind::UnexpectedEof`].
#[derive(Debug)]
pub struct PcmReader<R> {
    reader: R,
    frame_bytes: usize,
}

impl<R: AsyncRead + Unpin + Send> PcmReader<R> {
    /// Create a reader producing frames of `frame_bytes` bytes.
    pub fn new(reader: R, frame_bytes: usize) -> Self {
        Self {
            reader,
            frame_bytes,
        }
    }

    /// Frame size in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }
}

impl<R: AsyncRead + Unpin + Send> AudioSource for PcmReader<R> {
    async fn read_frame(&mut self) -> io::Result<Vec<u8>> {
        let mut frame = vec![0u8; self.frame_bytes];
        self.reader.read_exact(&mut frame).await?;
        Ok(frame)
    }
}
