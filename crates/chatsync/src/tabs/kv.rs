//! Shared key/value storage visible to every tab

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// String key/value store shared by the tabs of one session
///
/// Writes are last-writer-wins with no cross-tab locking.
pub trait SharedKv: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory `SharedKv`; clones see the same entries
#[derive(Clone, Default)]
pub struct InMemoryKv {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SharedKv for InMemoryKv {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.remove(key);
    }
}
