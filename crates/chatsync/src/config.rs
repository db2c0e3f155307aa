//! Engine configuration
//!
//! Loaded from `chatsync.json` in the chatsync config directory. Every field
//! is optional in the file; missing fields take their defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config filename in the chatsync config directory
const CONFIG_FILE: &str = "chatsync.json";

/// Timers, storage naming and cache limits of a tab engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How often every tab announces itself and the master renews its claim
    pub heartbeat_interval_ms: i64,
    /// A claim or peer older than this is considered gone
    pub master_timeout_ms: i64,
    /// Wait between writing a claim and confirming it
    pub settle_window_ms: i64,
    /// How long a new tab waits for a full-state answer before using the cache
    pub full_state_timeout_ms: i64,
    /// Prefix of the shared keys (`<prefix>:master`) and the snapshot key
    pub storage_key_prefix: String,
    /// Messages requested per history fetch
    pub message_list_slice: usize,
    /// Ids returned by a viewport query
    pub viewport_limit: usize,
    pub user_list_limit: usize,
    pub chat_list_limit: usize,
    pub archived_chat_list_limit: usize,
    pub custom_emoji_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 1000,
            master_timeout_ms: 3000,
            settle_window_ms: 300,
            full_state_timeout_ms: 1500,
            storage_key_prefix: "tt-multitab".to_string(),
            message_list_slice: 40,
            viewport_limit: 80,
            user_list_limit: 500,
            chat_list_limit: 200,
            archived_chat_list_limit: 10,
            custom_emoji_limit: 150,
        }
    }
}

impl EngineConfig {
    /// Load `chatsync.json` from the config directory, or the defaults
    pub fn load() -> Result<Self> {
        let config: Self = config::load_json_or_default(CONFIG_FILE)?;
        config.validated()
    }

    /// Load from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config: Self = config::load_json_file(path)?;
        config.validated()
    }

    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse engine config JSON")?;
        config.validated()
    }

    /// Key of the master claim in the shared key/value store
    pub fn master_key(&self) -> String {
        format!("{}:master", self.storage_key_prefix)
    }

    /// Key of the persisted snapshot
    pub fn snapshot_key(&self) -> String {
        format!("{}:snapshot", self.storage_key_prefix)
    }

    fn validated(self) -> Result<Self> {
        anyhow::ensure!(self.heartbeat_interval_ms > 0, "heartbeat_interval_ms must be positive");
        anyhow::ensure!(
            self.master_timeout_ms > self.heartbeat_interval_ms,
            "master_timeout_ms ({}) must exceed heartbeat_interval_ms ({})",
            self.master_timeout_ms,
            self.heartbeat_interval_ms
        );
        anyhow::ensure!(self.settle_window_ms >= 0, "settle_window_ms must not be negative");
        anyhow::ensure!(self.full_state_timeout_ms > 0, "full_state_timeout_ms must be positive");
        anyhow::ensure!(!self.storage_key_prefix.is_empty(), "storage_key_prefix must not be empty");
        Ok(self)
    }
}
