//! Dispatch pipeline: actions, reducers and the per-tab store

mod action;
mod reducer;
mod store;
mod subscription;

pub use action::{Action, ChangeScope, ChatPatch};
pub use reducer::reduce;
pub use store::Store;
pub use subscription::{Observers, Subscription};
