//! Bridges [`EventEmitter`] calls from domain code into the WebSocket fan-out channel.

use tokio::sync::broadcast;

use super::{EventEmitter, ServerEvent};

/// Default capacity of the underlying broadcast channel.
///
/// This is independent of the per-client bounded queue
/// ([`crate::protocol_constants::CLIENT_QUEUE_DEPTH`]); it only bounds how far a lagging
/// subscriber can fall behind before `tokio::sync::broadcast` starts reporting `Lagged`.
const BRIDGE_CHANNEL_CAPACITY: usize = 1024;

/// Fans [`ServerEvent`]s out to every subscribed WebSocket connection.
///
/// Domain code (the engine, the scene engine, the auth gate) never touches a socket
/// directly; it calls [`EventEmitter::emit`] on this bridge, which forwards onto a
/// `tokio::sync::broadcast` channel that each client's write-loop subscribes to
/// independently, per [`crate::api::ws_connection::WsConnectionManager`].
pub struct BroadcastEventBridge {
    sender: broadcast::Sender<ServerEvent>,
}

impl BroadcastEventBridge {
    /// Creates a new bridge with the default channel capacity.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BRIDGE_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribes a new receiver; each hub client holds its own.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Number of currently subscribed receivers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEmitter for BroadcastEventBridge {
    fn emit(&self, event: ServerEvent) {
        // No receivers is the common case before the first client connects; that is not
        // an error, so the send result is intentionally discarded.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bridge = BroadcastEventBridge::new();
        let mut rx = bridge.subscribe();
        bridge.emit(ServerEvent::ScenesChanged);
        let received = rx.recv().await.unwrap();
        assert!(matches!(received, ServerEvent::ScenesChanged));
    }

    #[test]
    fn subscriber_count_tracks_subscriptions() {
        let bridge = BroadcastEventBridge::new();
        assert_eq!(bridge.subscriber_count(), 0);
        let _rx = bridge.subscribe();
        assert_eq!(bridge.subscriber_count(), 1);
    }
}
