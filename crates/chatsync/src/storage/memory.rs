//! In-memory snapshot storage
//!
//! Clones share the same slot, the way every tab of a browser profile sees
//! the same storage.

use anyhow::{Result, anyhow};
use std::sync::{Arc, RwLock};

use super::SnapshotStore;

#[derive(Clone, Default)]
pub struct InMemorySnapshotStore {
    slot: Arc<RwLock<Option<Vec<u8>>>>,
}

impl InMemorySnapshotStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything has been saved
    pub fn is_empty(&self) -> bool {
        self.slot.read().map(|slot| slot.is_none()).unwrap_or(true)
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        let slot = self.slot.read().map_err(|_| anyhow!("snapshot slot lock poisoned"))?;
        Ok(slot.clone())
    }

    fn save(&self, bytes: &[u8]) -> Result<()> {
        let mut slot = self.slot.write().map_err(|_| anyhow!("snapshot slot lock poisoned"))?;
        *slot = Some(bytes.to_vec());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self.slot.write().map_err(|_| anyhow!("snapshot slot lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}
