//! Connection tracking for WebSocket clients: a registry that hands out an RAII guard per
//! connection and supports force-closing every live connection at once (used when auth
//! state changes out from under a client, e.g. password rotation).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Placeholder for per-connection bookkeeping beyond the cancellation token. Empty for now;
/// kept as a struct so fields can be added without changing the registry's key type.
struct ConnectionState;

/// Registry of live WebSocket connections.
///
/// Each connection gets a [`ConnectionGuard`] on [`register`](Self::register) whose `Drop`
/// impl removes it from the map. `global_cancel` is wrapped in a lock so [`close_all`] can
/// atomically cancel every outstanding child token and swap in a fresh parent, letting new
/// connections register immediately after a mass close.
pub struct WsConnectionManager {
    connections: DashMap<String, ConnectionState>,
    next_id: AtomicU64,
    global_cancel: RwLock<CancellationToken>,
}

impl WsConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            global_cancel: RwLock::new(CancellationToken::new()),
        }
    }

    /// Registers a new connection and returns its cleanup guard.
    pub fn register(self: &Arc<Self>) -> ConnectionGuard {
        let id = format!("ws-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.connections.insert(id.clone(), ConnectionState);
        let cancel_token = self.global_cancel.read().child_token();
        ConnectionGuard {
            id,
            manager: Arc::clone(self),
            cancel_token,
        }
    }

    fn unregister(&self, id: &str) {
        self.connections.remove(id);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Cancels every live connection's token and replaces the parent token, so connections
    /// registered after this call are unaffected. Returns the number of connections that
    /// were live at the time of the call.
    pub fn close_all(&self) -> usize {
        let count = self.connections.len();
        let mut global = self.global_cancel.write();
        global.cancel();
        *global = CancellationToken::new();
        count
    }
}

impl Default for WsConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII handle for one registered connection. Dropping it (on handler exit, panic, or early
/// return) removes the connection from its manager.
pub struct ConnectionGuard {
    id: String,
    manager: Arc<WsConnectionManager>,
    cancel_token: CancellationToken,
}

impl ConnectionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.manager.unregister(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_increments_and_drop_decrements_the_live_count() {
        let manager = Arc::new(WsConnectionManager::new());
        assert_eq!(manager.connection_count(), 0);
        let guard = manager.register();
        assert_eq!(manager.connection_count(), 1);
        drop(guard);
        assert_eq!(manager.connection_count(), 0);
    }

    #[test]
    fn each_connection_gets_a_distinct_id() {
        let manager = Arc::new(WsConnectionManager::new());
        let a = manager.register();
        let b = manager.register();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn close_all_cancels_live_tokens_but_not_future_ones() {
        let manager = Arc::new(WsConnectionManager::new());
        let before = manager.register();
        assert!(!before.cancel_token().is_cancelled());

        let closed = manager.close_all();
        assert_eq!(closed, 1);
        assert!(before.cancel_token().is_cancelled());

        let after = manager.register();
        assert!(!after.cancel_token().is_cancelled());
    }
}
