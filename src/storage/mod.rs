//! Durable device state.
//!
//! [`PersistentCursor`] keeps the last acknowledged sequence number and the
//! connection state in a small JSON blob behind a [`BlobStore`]. Storage is
//! best-effort: a missing or corrupt blob loads as defaults, and a failed
//! save is logged and forgotten.

mod cursor;
mod store;

pub use cursor::{PersistedState, PersistentCursor};
pub use store::{FileStore, MemoryStore};
