//! Collaborator interfaces.
//!
//! The session layer never touches hardware or sockets directly. It drives
//! these traits, which the binary backs with real devices and the tests back
//! with scripted doubles.

use std::future::Future;
use std::io;

use crate::transport::ConnectionState;

/// A bidirectional byte stream to the ingestion endpoint.
pub trait Transport: Send {
    /// Write the whole buffer.
    fn send_all(&mut self, data: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Read some bytes into `buf`. `Ok(0)` means the peer closed the stream.
    fn recv(&mut self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Close the stream. Errors are ignored; the stream is unusable afterwards.
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens transport streams to the configured endpoint.
pub trait Connector: Send + Sync {
    /// Stream type produced by a successful connect.
    type Stream: Transport;

    /// Open a new stream.
    fn connect(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Wireless association driver.
pub trait Radio: Send {
    /// Associate with the access point. Resolves once associated or failed.
    fn associate(&mut self) -> impl Future<Output = io::Result<()>> + Send;

    /// Whether the radio currently holds an association.
    fn is_associated(&self) -> bool;

    /// Drop the association.
    fn disassociate(&mut self) -> impl Future<Output = ()> + Send;
}

/// Audio capture peripheral producing signed 16-bit PCM frames.
pub trait AudioSource: Send {
    /// Block until the next frame is captured.
    fn read_frame(&mut self) -> impl Future<Output = io::Result<Vec<u8>>> + Send;
}

/// Durable storage for one small state blob.
pub trait BlobStore: Send + Sync {
    /// Load the stored blob.
    fn load_blob(&self) -> impl Future<Output = io::Result<Vec<u8>>> + Send;

    /// Replace the stored blob.
    fn save_blob(&self, data: &[u8]) -> impl Future<Output = io::Result<()>> + Send;
}

/// Notified of every connection state transition of a network link.
pub trait StateObserver: Send {
    /// Called once the link has moved to `state`.
    fn on_transition(&mut self, state: ConnectionState) -> impl Future<Output = ()> + Send;
}

impl StateObserver for () {
    async fn on_transition(&mut self, _state: ConnectionState) {}
}
