//! Chatsync - Multi-tab state engine for a messaging client
//!
//! This crate keeps one consistent client-side model of a messaging session
//! across several tabs of the same application:
//! - Domain models (Chat, Message, Thread, ChatFolder, User)
//! - Normalized state with structural sharing and an action/reducer store
//! - Range index merging windows of known message ids
//! - Incremental folder ordering and unread aggregation
//! - Master election over a shared key-value store
//! - Cross-tab broadcast of sequenced deltas with gap detection
//! - Snapshot cache (SQLite or in-memory)
//! - Query API for UI consumption
//!
//! The engine is synchronous and clock-free: callers drive it with
//! timestamps, which keeps it deterministic under test.

pub mod broadcast;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod folders;
pub mod models;
pub mod query;
pub mod ranges;
pub mod state;
pub mod storage;
pub mod tabs;

pub use broadcast::{BroadcastChannel, DeltaTracker, Envelope, HubChannel, InMemoryHub, SeqDecision, StateSnapshot};
pub use config::EngineConfig;
pub use dispatch::{Action, ChangeScope, ChatPatch, Store, Subscription};
pub use engine::{
    Command, CommandOutcome, CommandTicket, EngineEvent, HydrationSource, SimulatedTransport,
    SyncMode, TabEngine, TicketStatus, Transport, UpdateEvent,
};
pub use error::{ChannelError, EngineError, SnapshotError, TransportError};
pub use folders::{FolderAggregator, UnreadCounters};
pub use models::{
    Chat, ChatFolder, ChatId, ChatKind, FolderId, Message, MessageId, SendState, TabId, TabRole,
    Thread, ThreadId, User, UserId,
};
pub use state::State;
pub use storage::{InMemorySnapshotStore, SnapshotStore, SqliteSnapshotStore};
pub use tabs::{InMemoryKv, RoleChange, SharedKv, TabCoordinator};
