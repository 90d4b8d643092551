//! Event bus for mode change notifications.

pub mod types;

pub use types::ModeEvent;

use tokio::sync::broadcast;

/// Event channel capacity (ring buffer size).
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Broadcast bus distributing [`ModeEvent`]s to all subscribers.
///
/// Fire-and-forget: with no subscribers an event is dropped, and a lagging
/// subscriber sees `Lagged` instead of blocking the publisher.
pub struct EventBus {
    tx: broadcast::Sender<ModeEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: ModeEvent) {
        // send errors only mean "no subscribers"
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
