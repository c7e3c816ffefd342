//! Shared status store for the tracked run.
//!
//! Holds the single process-wide [`RunStatus`] record behind an async
//! mutex. Readers get a snapshot clone that is safe to serialize; only the
//! runner mutates the record through [`StatusStore::update`]. The store is
//! an explicit context object: it is created by the server setup and
//! shared by `Arc`, never a module-level global, so independent test
//! instances can run concurrently.

use rk_protocol::RunStatus;
use tokio::sync::Mutex;

/// Owns the current [`RunStatus`] and serves it to polling readers.
#[derive(Default)]
pub struct StatusStore {
    inner: Mutex<RunStatus>,
}

impl StatusStore {
    /// Create a store holding the Idle record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot; a clone, safe to serialize.
    pub async fn snapshot(&self) -> RunStatus {
        self.inner.lock().await.clone()
    }

    /// Replace the record with the Idle defaults. Idempotent.
    pub async fn reset(&self) {
        *self.inner.lock().await = RunStatus::idle();
    }

    /// Mutate the record under the lock.
    ///
    /// Each invocation is applied atomically with respect to snapshots, so
    /// pollers never observe a half-applied chunk.
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut RunStatus),
    {
        let mut status = self.inner.lock().await;
        f(&mut status);
    }
}
