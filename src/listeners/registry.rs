//! Listener set owned by one store instance.

use super::types::{ChangeEvent, RecordListener};
use parking_lot::RwLock;
use std::sync::Arc;

/// Identity of a listener: the address of its shared allocation.
fn key(listener: &Arc<dyn RecordListener>) -> *const () {
    Arc::as_ptr(listener) as *const ()
}

/// Set of registered listeners.
///
/// Membership is by `Arc` identity: registering the same handle twice is a
/// no-op, and two separately allocated listeners are distinct even when
/// their contents are equal.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn RecordListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Returns false if it was already registered.
    pub fn add(&self, listener: Arc<dyn RecordListener>) -> bool {
        let mut listeners = self.listeners.write();
        let k = key(&listener);
        if listeners.iter().any(|l| key(l) == k) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Unregister a listener. Returns false if it was not registered.
    pub fn remove(&self, listener: &Arc<dyn RecordListener>) -> bool {
        let mut listeners = self.listeners.write();
        let k = key(listener);
        let before = listeners.len();
        listeners.retain(|l| key(l) != k);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    /// Deliver `event` to every listener registered at call time.
    ///
    /// Listeners may modify the registry while being notified; changes apply
    /// from the next event. Listeners that report themselves inactive are
    /// unregistered afterwards. Returns the number of listeners notified.
    pub fn notify(&self, event: &ChangeEvent) -> usize {
        let snapshot: Vec<Arc<dyn RecordListener>> = self.listeners.read().clone();

        let mut inactive = Vec::new();
        for listener in &snapshot {
            listener.on_change(event);
            if !listener.is_active() {
                inactive.push(key(listener));
            }
        }

        if !inactive.is_empty() {
            self.listeners
                .write()
                .retain(|l| !inactive.contains(&key(l)));
        }

        snapshot.len()
    }
}
