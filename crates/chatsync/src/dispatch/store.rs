//! The state container owned by one tab

use std::sync::Arc;

use super::action::Action;
use super::reducer::reduce;
use super::subscription::{Observers, Subscription};
use crate::state::State;

/// Owns the current `State` and notifies subscribers after each change
///
/// Every change produces a new `Arc<State>`, so holders of the previous one
/// keep a consistent snapshot and `Arc::ptr_eq` tells whether anything
/// happened at all.
pub struct Store {
    state: Arc<State>,
    observers: Observers<Arc<State>>,
}

impl Store {
    pub fn new(state: State) -> Self {
        Self {
            state: Arc::new(state),
            observers: Observers::new(),
        }
    }

    pub fn state(&self) -> &Arc<State> {
        &self.state
    }

    /// Apply one action; returns whether the state changed
    pub fn dispatch(&mut self, action: &Action) -> bool {
        self.dispatch_all(std::slice::from_ref(action))
    }

    /// Apply actions in order, notifying subscribers once at the end
    pub fn dispatch_all(&mut self, actions: &[Action]) -> bool {
        let mut next = State::clone(&self.state);
        let mut changed = false;
        for action in actions {
            changed |= reduce(&mut next, action);
        }
        if !changed {
            return false;
        }

        self.state = Arc::new(next);
        self.observers.notify(&self.state);
        true
    }

    /// Apply actions in order and return the ones that changed something
    ///
    /// Subscribers are notified once, after the last action.
    pub fn dispatch_changes(&mut self, actions: Vec<Action>) -> Vec<Action> {
        let mut next = State::clone(&self.state);
        let applied: Vec<Action> = actions
            .into_iter()
            .filter(|action| reduce(&mut next, action))
            .collect();
        if applied.is_empty() {
            return applied;
        }

        self.state = Arc::new(next);
        self.observers.notify(&self.state);
        applied
    }

    /// Call `callback` with the selected value whenever it changes
    ///
    /// Values are compared with `PartialEq`; the callback is not called for
    /// the value current at subscription time.
    pub fn subscribe<T, S, F>(&self, selector: S, mut callback: F) -> Subscription
    where
        T: PartialEq + Send + 'static,
        S: Fn(&State) -> T + Send + 'static,
        F: FnMut(&T) + Send + 'static,
    {
        let mut last = selector(&self.state);
        self.observers.subscribe(move |state: &Arc<State>| {
            let next = selector(state);
            if next != last {
                callback(&next);
                last = next;
            }
        })
    }

    /// Call `callback` with every new state
    pub fn subscribe_all(&self, callback: impl FnMut(&Arc<State>) + Send + 'static) -> Subscription {
        self.observers.subscribe(callback)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(State::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ChatPatch;
    use crate::models::{Chat, ChatId};
    use std::sync::Mutex;

    fn upsert(id: &str, title: &str) -> Action {
        Action::UpsertChats {
            chats: vec![Chat::new(id, title)],
        }
    }

    #[test]
    fn test_dispatch_swaps_state_only_on_change() {
        let mut store = Store::default();
        assert!(store.dispatch(&upsert("c1", "General")));
        let first = store.state().clone();

        assert!(!store.dispatch(&upsert("c1", "General")));
        assert!(Arc::ptr_eq(&first, store.state()));

        assert!(store.dispatch(&upsert("c2", "Other")));
        assert!(!Arc::ptr_eq(&first, store.state()));
        assert_eq!(first.chats.len(), 1);
    }

    #[test]
    fn test_selector_subscription_fires_on_value_change() {
        let mut store = Store::default();
        store.dispatch(&upsert("c1", "General"));
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let subscription = store.subscribe(
            |state: &State| state.chat(&ChatId::new("c1")).map(|chat| chat.title.clone()),
            move |title: &Option<String>| sink.lock().unwrap().push(title.clone().unwrap_or_default()),
        );

        // Unrelated change
        store.dispatch(&upsert("c2", "Other"));
        assert!(seen.lock().unwrap().is_empty());

        store.dispatch(&Action::UpdateChat {
            chat_id: ChatId::new("c1"),
            patch: ChatPatch {
                title: Some("Renamed".into()),
                ..ChatPatch::default()
            },
        });
        assert_eq!(*seen.lock().unwrap(), vec!["Renamed".to_string()]);

        drop(subscription);
        store.dispatch(&upsert("c1", "Again"));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dispatch_all_notifies_once() {
        let mut store = Store::default();
        let count = Arc::new(Mutex::new(0));

        let counter = count.clone();
        let _subscription = store.subscribe_all(move |_| *counter.lock().unwrap() += 1);

        store.dispatch_all(&[upsert("c1", "A"), upsert("c2", "B"), upsert("c3", "C")]);
        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(store.state().chats.len(), 3);
    }

    #[test]
    fn test_dispatch_changes_filters_no_ops() {
        let mut store = Store::default();
        store.dispatch(&upsert("c1", "General"));

        let applied = store.dispatch_changes(vec![
            upsert("c1", "General"),
            upsert("c2", "Other"),
            Action::UpdateChat {
                chat_id: ChatId::new("missing"),
                patch: ChatPatch::default(),
            },
        ]);
        assert_eq!(applied, vec![upsert("c2", "Other")]);

        let before = store.state().clone();
        assert!(store.dispatch_changes(vec![upsert("c2", "Other")]).is_empty());
        assert!(Arc::ptr_eq(&before, store.state()));
    }
}
