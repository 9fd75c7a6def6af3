use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Type of event in the watch stream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    Put,
    Delete,
}

/// A single watch event representing a state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEvent {
    pub event_type: EventType,
    pub key: String,
    #[serde(default)]
    pub value: Option<Vec<u8>>,
}

impl WatchEvent {
    /// The registry kind segment of this event's key
    /// (`/registry/<kind>/...` → `<kind>`), if the key is a registry key.
    pub fn kind(&self) -> Option<&str> {
        self.key.strip_prefix("/registry/")?.split('/').next()
    }
}

/// Change notifications for the reconcile queues. Delivery is
/// fire-and-forget: a missing or slow subscriber never blocks a store
/// write, and a lagged subscriber catches up through its periodic relist
/// of the kind's prefix rather than through event replay.
#[derive(Clone)]
pub struct EventLog {
    sender: broadcast::Sender<WatchEvent>,
}

impl EventLog {
    /// Create a new event log buffering up to `capacity` undelivered
    /// events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Record a new event. Called internally by StateStore on put/delete.
    pub fn emit(&self, event_type: EventType, key: String, value: Option<Vec<u8>>) {
        // Send errors only mean nobody is listening right now.
        let _ = self.sender.send(WatchEvent {
            event_type,
            key,
            value,
        });
    }

    /// Subscribe to receive new events as they are emitted.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_carry_kinds() {
        let log = EventLog::new(8);
        let mut rx = log.subscribe();
        log.emit(
            EventType::Put,
            "/registry/containercheckpoints/default/m1-c".to_string(),
            None,
        );
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind(), Some("containercheckpoints"));

        let outside = WatchEvent {
            event_type: EventType::Put,
            key: "/tmp/x".to_string(),
            value: None,
        };
        assert_eq!(outside.kind(), None);
    }

    #[tokio::test]
    async fn subscribers_see_mutations_in_order() {
        let log = EventLog::new(8);
        // Emitting with no subscribers must not fail the write path.
        log.emit(EventType::Put, "/registry/nodes/n0".to_string(), None);

        let mut rx = log.subscribe();
        log.emit(EventType::Put, "/registry/nodes/n1".to_string(), Some(b"{}".to_vec()));
        log.emit(EventType::Delete, "/registry/nodes/n1".to_string(), None);

        let put = rx.recv().await.unwrap();
        assert_eq!(put.event_type, EventType::Put);
        assert_eq!(put.value.as_deref(), Some(b"{}".as_slice()));
        let delete = rx.recv().await.unwrap();
        assert_eq!(delete.event_type, EventType::Delete);
        assert_eq!(delete.key, "/registry/nodes/n1");
    }
}
