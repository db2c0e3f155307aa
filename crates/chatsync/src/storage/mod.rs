//! Persistent snapshot storage
//!
//! The snapshot is a cold-start cache only: it is written by the master tab
//! and read by a tab that could not get the state from a peer. Writes are
//! last-writer-wins.

mod memory;
mod snapshot;
mod sqlite;

use anyhow::Result;

pub use memory::InMemorySnapshotStore;
pub use snapshot::{PersistedSnapshot, SNAPSHOT_VERSION, load_snapshot, trim_state};
pub use sqlite::SqliteSnapshotStore;

/// Byte-level storage of the serialized snapshot
pub trait SnapshotStore: Send + Sync {
    /// Read the stored snapshot, if any
    fn load(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the stored snapshot
    fn save(&self, bytes: &[u8]) -> Result<()>;

    /// Remove the stored snapshot
    fn clear(&self) -> Result<()>;
}
