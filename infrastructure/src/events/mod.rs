//! Event-sink adapters
//!
//! [`TracingEventSink`] forwards engine events into the `tracing`
//! subscriber; [`BroadcastEventSink`] fans them out to in-process
//! subscribers over a tokio broadcast channel.

use coevolve_application::ports::event_sink::EventSink;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::info;

/// Emits every engine event as a structured info log line
#[derive(Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, name: &str, payload: Value) {
        info!(event = name, %payload, "engine event");
    }
}

/// One event as seen by broadcast subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub name: String,
    pub payload: Value,
}

/// Fans engine events out to broadcast subscribers.
///
/// Emission never blocks: with no active subscriber, or a subscriber that
/// has lagged past the channel capacity, events are simply dropped.
pub struct BroadcastEventSink {
    sender: broadcast::Sender<EngineEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, name: &str, payload: Value) {
        let _ = self.sender.send(EngineEvent {
            name: name.to_string(),
            payload,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscriber() {
        let sink = BroadcastEventSink::new(8);
        let mut rx = sink.subscribe();

        sink.emit("artifact-created", json!({"version": 1}));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, "artifact-created");
        assert_eq!(event.payload["version"], json!(1));
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let sink = BroadcastEventSink::new(8);
        sink.emit("consensus-concluded", json!({}));
    }
}
