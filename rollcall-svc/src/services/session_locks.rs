//! Per-session mutual exclusion
//!
//! Result application and manual overrides of the same session take the same
//! lock, so record writes and the count recompute that follows them never
//! interleave. Sessions are independent of each other.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct SessionLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock of one session, waiting for the current holder
    pub async fn lock(&self, session_id: Uuid) -> OwnedMutexGuard<()> {
        let session_lock = {
            let mut locks = self.locks.lock().await;
            // Entries only referenced by the map have no holder or waiter
            locks.retain(|id, lock| *id == session_id || Arc::strong_count(lock) > 1);
            locks
                .entry(session_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        session_lock.lock_owned().await
    }

    /// Number of sessions currently tracked
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
