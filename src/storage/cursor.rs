//! Persistent sequence cursor.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{BlobStore, StateObserver};
use crate::transport::ConnectionState;

/// The persisted record.
///
/// ```json
/// {"sequence":42,"connection_state":"connected"}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Next sequence number to send (one past the last acknowledged).
    pub sequence: u32,
    /// Connection state at the time of the save.
    pub connection_state: ConnectionState,
}

/// Best-effort durable store for [`PersistedState`].
///
/// Clones share the store and the last loaded or saved sequence, so a
/// state-only save from the network link never rewinds the counter written
/// by the session protocol.
#[derive(Debug)]
pub struct PersistentCursor<S: BlobStore> {
    store: Arc<S>,
    sequence: Arc<AtomicU32>,
}

impl<S: BlobStore> Clone for PersistentCursor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            sequence: Arc::clone(&self.sequence),
        }
    }
}

impl<S: BlobStore> PersistentCursor<S> {
    /// Wrap a blob store.
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            sequence: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load the stored state. Missing, unreadable or malformed data yields
    /// the defaults.
    pub async fn load(&self) -> PersistedState {
        let blob = match self.store.load_blob().await {
            Ok(blob) => blob,
            Err(e) => {
                debug!(error = %e, "no persisted state, using defaults");
                return PersistedState::default();
            }
        };

        match serde_json::from_slice::<PersistedState>(&blob) {
            Ok(state) => {
                self.sequence.store(state.sequence, Ordering::Relaxed);
                state
            }
            Err(e) => {
                debug!(error = %e, "persisted state unreadable, using defaults");
                PersistedState::default()
            }
        }
    }

    /// Sequence of the last load or save.
    pub fn sequence(&self) -> u32 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Save the state. Failures are logged and otherwise ignored.
    pub async fn save(&self, sequence: u32, connection_state: ConnectionState) {
        self.sequence.store(sequence, Ordering::Relaxed);
        let state = PersistedState {
            sequence,
            connection_state,
        };
        let blob = match serde_json::to_vec(&state) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "failed to encode persisted state");
                return;
            }
        };
        if let Err(e) = self.store.save_blob(&blob).await {
            warn!(error = %e, sequence, "failed to persist state");
        }
    }

    /// Save a new connection state alongside the current sequence.
    pub async fn save_state(&self, connection_state: ConnectionState) {
        self.save(self.sequence(), connection_state).await;
    }
}

impl<S: BlobStore> StateObserver for PersistentCursor<S> {
    async fn on_transition(&mut self, state: ConnectionState) {
        self.save_state(state).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};

    #[tokio::test]
    async fn test_save_then_fresh_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device_state.json");

        PersistentCursor::new(FileStore::new(&path))
            .save(42, ConnectionState::Connected)
            .await;

        let restored = PersistentCursor::new(FileStore::new(&path)).load().await;
        assert_eq!(restored.sequence, 42);
        assert_eq!(restored.connection_state, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_blob_format() {
        let store = MemoryStore::new();
        PersistentCursor::new(store.clone())
            .save(7, ConnectionState::Disconnected)
            .await;

        let json: serde_json::Value = serde_json::from_slice(&store.blob().unwrap()).unwrap();
        assert_eq!(json["sequence"], 7);
        assert_eq!(json["connection_state"], "disconnected");
    }

    #[tokio::test]
    async fn test_load_falls_back_to_defaults() {
        let missing = PersistentCursor::new(MemoryStore::new()).load().await;
        assert_eq!(missing, PersistedState::default());

        let corrupt = PersistentCursor::new(MemoryStore::with_blob("{not json"))
            .load()
            .await;
        assert_eq!(corrupt.sequence, 0);
        assert_eq!(corrupt.connection_state, ConnectionState::Disconnected);

        let partial = PersistentCursor::new(MemoryStore::with_blob(r#"{"sequence":9}"#))
            .load()
            .await;
        assert_eq!(partial.sequence, 9);
        assert_eq!(partial.connection_state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_save_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in place of the file makes the rename fail.
        let path = dir.path().join("state.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("occupant"), b"x").unwrap();

        let cursor = PersistentCursor::new(FileStore::new(&path));
        cursor.save(1, ConnectionState::Connected).await;
        assert_eq!(cursor.load().await, PersistedState::default());
    }

    #[tokio::test]
    async fn test_state_save_keeps_shared_sequence() {
        let store = MemoryStore::with_blob(r#"{"sequence":5,"connection_state":"connected"}"#);
        let cursor = PersistentCursor::new(store.clone());
        let mut observer = cursor.clone();

        assert_eq!(cursor.load().await.sequence, 5);
        observer
            .on_transition(ConnectionState::TransportHandshaking)
            .await;
        let state = cursor.load().await;
        assert_eq!(state.sequence, 5);
        assert_eq!(state.connection_state, ConnectionState::TransportHandshaking);

        cursor.save(6, ConnectionState::Connected).await;
        observer.on_transition(ConnectionState::Disconnected).await;
        let state = cursor.load().await;
        assert_eq!(state.sequence, 6);
        assert_eq!(state.connection_state, ConnectionState::Disconnected);
    }
}
