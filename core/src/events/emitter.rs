//! [`EventEmitter`] trait and its default implementations.

use super::ServerEvent;

/// Trait implemented by anything that wants to emit [`ServerEvent`]s without knowing
/// about the transport (WebSocket hub, logging, a future SSE endpoint, …).
pub trait EventEmitter: Send + Sync {
    /// Emits an event.
    fn emit(&self, event: ServerEvent);
}

/// An [`EventEmitter`] that logs every event at `debug!` and otherwise discards it.
///
/// Useful for tests and for any embedding host that does not want a live hub.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit(&self, event: ServerEvent) {
        log::debug!("event: {:?}", event);
    }
}

/// An [`EventEmitter`] that discards every event silently.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit(&self, _event: ServerEvent) {}
}
