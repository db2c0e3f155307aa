//! Tab roles and master election

mod coordinator;
mod kv;

pub use coordinator::{MasterClaim, RoleChange, Step, TabCoordinator};
pub use kv::{InMemoryKv, SharedKv};
