//! Tab identity and the per-tab liveness record

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier of an open tab of the session
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TabId(pub String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random tab id
    pub fn generate() -> Self {
        Self(format!("{:016x}", rand::random::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TabId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role of a tab in the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabRole {
    /// Election not finished yet
    #[default]
    Unestablished,
    Follower,
    Master,
}

/// Liveness record of a tab, refreshed by its heartbeats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabRecord {
    pub tab_id: TabId,
    /// Timestamp (ms) of the last heartbeat observed from this tab
    pub last_seen_ms: i64,
    pub role: TabRole,
}

impl TabRecord {
    pub fn new(tab_id: TabId, now_ms: i64) -> Self {
        Self {
            tab_id,
            last_seen_ms: now_ms,
            role: TabRole::Unestablished,
        }
    }

    pub fn is_stale(&self, now_ms: i64, timeout_ms: i64) -> bool {
        now_ms - self.last_seen_ms > timeout_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(TabId::generate(), TabId::generate());
    }

    #[test]
    fn test_record_staleness() {
        let record = TabRecord::new(TabId::new("a"), 1_000);
        assert!(!record.is_stale(3_000, 3_000));
        assert!(record.is_stale(4_001, 3_000));
    }
}
