//! Task spawning abstraction for async runtime independence.
//!
//! The engine, input receivers, output scheduler and message hub all need to spawn
//! background tasks. Routing every spawn through a trait keeps the core from hard-coding
//! a `tokio::spawn` call at every call site, so an embedding host can supply its own
//! executor without the core caring.

use std::future::Future;
use std::pin::Pin;

use tokio::task::JoinHandle;

/// Spawns futures onto a background executor.
pub trait TaskSpawner: Send + Sync {
    /// Spawns a future, returning a handle that can be awaited or aborted.
    fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>) -> JoinHandle<()>;
}

/// A [`TaskSpawner`] backed by a `tokio::runtime::Handle`.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    /// Builds a spawner from an explicit runtime handle.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Builds a spawner from the handle of the currently running runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a `tokio` runtime context.
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>) -> JoinHandle<()> {
        self.handle.spawn(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn tokio_spawner_runs_the_future() {
        let spawner = TokioSpawner::current();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        let handle = spawner.spawn(Box::pin(async move {
            ran_clone.store(true, Ordering::SeqCst);
        }));
        handle.await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }
}
