//! [`BlobStore`] implementations.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::fs;

use crate::core::BlobStore;

/// Blob stored in a single file.
///
/// Writes go to a `.tmp` sibling first and are renamed into place, so a
/// power loss leaves either the old blob or the new one.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store the blob at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the blob.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlobStore for FileStore {
    async fn load_blob(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path).await
    }

    async fn save_blob(&self, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, data).await?;
        fs::rename(&tmp_path, &self.path).await
    }
}

/// In-memory blob, for tests and diskless devices.
///
/// Clones share the same blob.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blob: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `data`.
    pub fn with_blob(data: impl Into<Vec<u8>>) -> Self {
        Self {
            blob: Arc::new(Mutex::new(Some(data.into()))),
        }
    }

    /// Current blob contents.
    pub fn blob(&self) -> Option<Vec<u8>> {
        self.blob.lock().ok().and_then(|blob| blob.clone())
    }
}

impl BlobStore for MemoryStore {
    async fn load_blob(&self) -> io::Result<Vec<u8>> {
        self.blob()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    async fn save_blob(&self, data: &[u8]) -> io::Result<()> {
        let mut blob = self
            .blob
            .lock()
            .map_err(|_| io::Error::other("memory store poisoned"))?;
        *blob = Some(data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"));

        assert_eq!(
            store.load_blob().await.unwrap_err().kind(),
            io::ErrorKind::NotFound
        );

        store.save_blob(b"first").await.unwrap();
        store.save_blob(b"second").await.unwrap();
        assert_eq!(store.load_blob().await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_file_store_atomic_write_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let store = FileStore::new(&path);

        store.save_blob(b"hello").await.unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_memory_store_shared_between_clones() {
        let store = MemoryStore::new();
        assert!(store.load_blob().await.is_err());

        let clone = store.clone();
        clone.save_blob(b"abc").await.unwrap();
        assert_eq!(store.load_blob().await.unwrap(), b"abc");
        assert_eq!(MemoryStore::with_blob("x").blob(), Some(b"x".to_vec()));
    }
}
