//! Cross-tab broadcast channel
//!
//! Tabs exchange typed [`Envelope`]s over a [`BroadcastChannel`]. Delivery is
//! best-effort: deltas carry per-origin sequence numbers so a receiver can
//! detect loss with a [`DeltaTracker`] and fall back to a full state.

mod envelope;
mod hub;
mod sequence;

pub use envelope::{Envelope, StateSnapshot};
pub use hub::{FaultFilter, HubChannel, InMemoryHub};
pub use sequence::{DeltaSequencer, DeltaTracker, SeqDecision};

use crate::error::ChannelError;

/// A pub/sub transport shared by the tabs of one session
///
/// A post reaches every other tab, never the sender.
pub trait BroadcastChannel: Send {
    fn post(&self, envelope: &Envelope) -> Result<(), ChannelError>;

    /// Take every envelope received since the last drain, in arrival order
    fn drain(&mut self) -> Vec<Envelope>;
}
