use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Idle entries are swept once the table grows past this many names.
const SWEEP_THRESHOLD: usize = 1024;

/// One async mutex per user name.
///
/// Every request that reads and writes back a user record holds the owner's
/// guard from the store read until the write has finished, so two requests
/// against the same mailbox can never clobber each other.
#[derive(Default)]
pub struct UserLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);

            if table.len() >= SWEEP_THRESHOLD {
                // Only the table itself still holds an idle lock.
                table.retain(|_, lock| Arc::strong_count(lock) > 1);
            }

            table.entry(name.to_string()).or_default().clone()
        };

        lock.lock_owned().await
    }

    /// Number of names currently tracked.
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
