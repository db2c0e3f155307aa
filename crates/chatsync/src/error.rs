//! Error types of the sync engine

use thiserror::Error;

use crate::models::{ChatId, TabId};

/// Failure to put a message on, or read one from, the cross-tab channel
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode envelope: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Failure to load or save a persisted snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("snapshot is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Failure reported by the network transport
///
/// The engine never retries; callers decide whether to re-issue.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("disconnected")]
    Disconnected,
    #[error("rejected by server: {0}")]
    Rejected(String),
}

/// Failure of an engine operation
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("tab {0} is not the master")]
    NotMaster(TabId),
    #[error("no transport attached to master tab {0}")]
    NoTransport(TabId),
    #[error("unknown chat {0}")]
    UnknownChat(ChatId),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
