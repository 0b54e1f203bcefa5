//! Change event and listener types.

use crate::types::Record;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Kind of mutation an event reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

/// One mutation batch and the records it touched, in call order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeType,
    pub records: Vec<Record>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeType, records: Vec<Record>) -> Self {
        Self { kind, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Observer of record changes.
///
/// Called on the mutating thread while the store's mutation lock is held.
/// Listeners may call back into the same store from that thread.
pub trait RecordListener: Send + Sync {
    fn on_change(&self, event: &ChangeEvent);

    /// Whether the listener still wants events. Inactive listeners are
    /// unregistered after the fan-out that observed them inactive.
    fn is_active(&self) -> bool {
        true
    }
}

/// Listener backed by a closure.
pub struct FnListener<F>(F);

impl<F> RecordListener for FnListener<F>
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    fn on_change(&self, event: &ChangeEvent) {
        (self.0)(event)
    }
}

/// Wrap a closure as a shareable listener.
pub fn listener_fn<F>(f: F) -> Arc<dyn RecordListener>
where
    F: Fn(&ChangeEvent) + Send + Sync + 'static,
{
    Arc::new(FnListener(f))
}

/// Listener forwarding events into a bounded channel.
pub struct ChannelListener {
    sender: Sender<ChangeEvent>,
    active: AtomicBool,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its channel.
    pub fn new(buffer_size: usize) -> (Self, Receiver<ChangeEvent>) {
        let (sender, receiver) = bounded(buffer_size.max(1));
        (
            Self {
                sender,
                active: AtomicBool::new(true),
            },
            receiver,
        )
    }
}

impl RecordListener for ChannelListener {
    fn on_change(&self, event: &ChangeEvent) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        match self.sender.try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(kind = ?event.kind, "subscriber buffer full, dropping subscriber");
                self.active.store(false, Ordering::Release);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.active.store(false, Ordering::Release);
            }
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Receiving side of a channel subscription.
pub struct SubscriptionHandle {
    listener: Arc<dyn RecordListener>,
    /// Channel to receive events.
    pub receiver: Receiver<ChangeEvent>,
}

impl SubscriptionHandle {
    pub(crate) fn new(listener: Arc<dyn RecordListener>, receiver: Receiver<ChangeEvent>) -> Self {
        Self { listener, receiver }
    }

    /// The registered listener, for passing to `remove_listener`.
    pub fn listener(&self) -> &Arc<dyn RecordListener> {
        &self.listener
    }

    /// Whether the store still delivers to this subscription.
    pub fn is_active(&self) -> bool {
        self.listener.is_active()
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<ChangeEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<ChangeEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<ChangeEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> ChangeEvent {
        ChangeEvent::new(ChangeType::Insert, vec![Record::book("Dune")])
    }

    #[test]
    fn test_channel_listener_delivers() {
        let (listener, receiver) = ChannelListener::new(4);
        listener.on_change(&event());
        assert_eq!(receiver.try_recv().unwrap(), event());
        assert!(listener.is_active());
    }

    #[test]
    fn test_channel_listener_overflow_deactivates() {
        let (listener, receiver) = ChannelListener::new(1);
        listener.on_change(&event());
        listener.on_change(&event());
        assert!(!listener.is_active());

        // Nothing more is queued once inactive
        drop(receiver.try_recv().unwrap());
        listener.on_change(&event());
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_channel_listener_disconnected() {
        let (listener, receiver) = ChannelListener::new(4);
        drop(receiver);
        listener.on_change(&event());
        assert!(!listener.is_active());
    }

    #[test]
    fn test_event_serializes_kind() {
        let json = serde_json::to_value(event()).unwrap();
        assert_eq!(json["kind"], "INSERT");
        assert_eq!(json["records"][0]["title"], "Dune");
    }
}
