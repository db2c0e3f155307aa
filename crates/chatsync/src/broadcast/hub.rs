//! In-process broadcast channel
//!
//! Every tab of a simulated session connects to one `InMemoryHub`. A post is
//! fanned out to every other connected tab as encoded bytes, so receivers
//! never share references with the sender.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam::channel::{Receiver, Sender, TryRecvError, TrySendError};
use log::{debug, warn};

use super::{BroadcastChannel, Envelope};
use crate::error::ChannelError;

/// Drop filter used to simulate lossy delivery; returns true to drop
pub type FaultFilter = Box<dyn Fn(&Envelope) -> bool + Send>;

struct HubState {
    next_id: u64,
    subscribers: BTreeMap<u64, Sender<Vec<u8>>>,
    fault: Option<FaultFilter>,
}

#[derive(Clone)]
pub struct InMemoryHub {
    inner: Arc<Mutex<HubState>>,
}

impl Default for InMemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubState {
                next_id: 1,
                subscribers: BTreeMap::new(),
                fault: None,
            })),
        }
    }

    /// Attach a new tab to the hub
    pub fn connect(&self) -> HubChannel {
        let (sender, receiver) = crossbeam::channel::unbounded();
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.insert(id, sender);

        HubChannel {
            id,
            hub: self.clone(),
            receiver,
        }
    }

    /// Install or remove a filter that silently drops matching posts
    pub fn set_fault(&self, fault: Option<FaultFilter>) {
        self.lock().fault = fault;
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, from: u64, envelope: &Envelope) -> Result<(), ChannelError> {
        let bytes = envelope.encode()?;
        let mut state = self.lock();

        if !state.subscribers.contains_key(&from) {
            return Err(ChannelError::Closed);
        }
        if state.fault.as_ref().is_some_and(|filter| filter(envelope)) {
            debug!("Dropped {} envelope in transit", envelope.kind());
            return Ok(());
        }

        let mut closed = Vec::new();
        for (id, subscriber) in &state.subscribers {
            if *id == from {
                continue;
            }
            match subscriber.try_send(bytes.clone()) {
                Ok(()) => {}
                Err(TrySendError::Disconnected(_)) | Err(TrySendError::Full(_)) => closed.push(*id),
            }
        }

        for id in closed {
            debug!("Pruning closed subscriber {}", id);
            state.subscribers.remove(&id);
        }
        Ok(())
    }

    fn disconnect(&self, id: u64) {
        self.lock().subscribers.remove(&id);
    }
}

/// One tab's connection to an `InMemoryHub`
pub struct HubChannel {
    id: u64,
    hub: InMemoryHub,
    receiver: Receiver<Vec<u8>>,
}

impl BroadcastChannel for HubChannel {
    fn post(&self, envelope: &Envelope) -> Result<(), ChannelError> {
        self.hub.publish(self.id, envelope)
    }

    fn drain(&mut self) -> Vec<Envelope> {
        let mut envelopes = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(bytes) => match Envelope::decode(&bytes) {
                    Ok(envelope) => envelopes.push(envelope),
                    Err(e) => warn!("Skipping undecodable envelope: {}", e),
                },
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        envelopes
    }
}

impl Drop for HubChannel {
    fn drop(&mut self) {
        self.hub.disconnect(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TabId;

    fn claim(tab: &str, timestamp: i64) -> Envelope {
        Envelope::MasterClaim {
            tab_id: TabId::new(tab),
            timestamp,
        }
    }

    #[test]
    fn test_fan_out_skips_sender() {
        let hub = InMemoryHub::new();
        let mut a = hub.connect();
        let mut b = hub.connect();
        let mut c = hub.connect();

        a.post(&claim("a", 1)).unwrap();

        assert!(a.drain().is_empty());
        assert_eq!(b.drain(), vec![claim("a", 1)]);
        assert_eq!(c.drain(), vec![claim("a", 1)]);
        assert!(b.drain().is_empty());
    }

    #[test]
    fn test_order_per_sender() {
        let hub = InMemoryHub::new();
        let a = hub.connect();
        let mut b = hub.connect();

        for i in 0..5 {
            a.post(&claim("a", i)).unwrap();
        }

        let timestamps: Vec<i64> = b
            .drain()
            .into_iter()
            .map(|envelope| match envelope {
                Envelope::MasterClaim { timestamp, .. } => timestamp,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(timestamps, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_dropped_channel_unregisters() {
        let hub = InMemoryHub::new();
        let a = hub.connect();
        let b = hub.connect();
        assert_eq!(hub.subscriber_count(), 2);

        drop(b);
        assert_eq!(hub.subscriber_count(), 1);
        a.post(&claim("a", 1)).unwrap();
    }

    #[test]
    fn test_fault_filter_drops() {
        let hub = InMemoryHub::new();
        let a = hub.connect();
        let mut b = hub.connect();

        hub.set_fault(Some(Box::new(|envelope: &Envelope| {
            matches!(envelope, Envelope::MasterClaim { timestamp: 2, .. })
        })));
        for i in 1..=3 {
            a.post(&claim("a", i)).unwrap();
        }
        hub.set_fault(None);

        assert_eq!(b.drain(), vec![claim("a", 1), claim("a", 3)]);
    }
}
