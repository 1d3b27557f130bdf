//! Store event system for write and failure notifications.
//!
//! Observers subscribe at construction time through the store's dispatcher;
//! delivery failures never affect the operation that emitted the event.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use tagnet_types::RecordKind;

/// Events emitted by the store.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum StoreEvent {
    /// A record was written successfully.
    Stored {
        kind: RecordKind,
        /// Owning tag key; `None` for environment records.
        key: Option<String>,
    },
    /// A storage operation failed.
    Error { message: String },
}

/// Sender for store events.
pub type EventSender = broadcast::Sender<StoreEvent>;

/// Receiver for store events.
pub type EventReceiver = broadcast::Receiver<StoreEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher with a bounded channel.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: StoreEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_receivers_does_not_panic() {
        let dispatcher = EventDispatcher::default();
        dispatcher.send(StoreEvent::Error {
            message: "disk full".to_string(),
        });
    }

    #[test]
    fn test_subscriber_receives_event() {
        let dispatcher = EventDispatcher::new(8);
        let mut rx = dispatcher.subscribe();

        dispatcher.send(StoreEvent::Stored {
            kind: RecordKind::Battery,
            key: Some("aa:bb".to_string()),
        });

        match rx.try_recv().unwrap() {
            StoreEvent::Stored { kind, key } => {
                assert_eq!(kind, RecordKind::Battery);
                assert_eq!(key.as_deref(), Some("aa:bb"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_receiver_count() {
        let dispatcher = EventDispatcher::new(8);
        assert_eq!(dispatcher.receiver_count(), 0);
        let _rx = dispatcher.subscribe();
        assert_eq!(dispatcher.receiver_count(), 1);
    }

    #[test]
    fn test_event_serialization() {
        let event = StoreEvent::Stored {
            kind: RecordKind::Sensor,
            key: Some("aa:bb".to_string()),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"stored\""));
        assert!(json.contains("\"sensor\""));
    }
}
