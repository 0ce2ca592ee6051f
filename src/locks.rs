//! Per-record mutual exclusion.
//!
//! Uploads, downloads and deletes of the same storage key take the key's lock
//! so that bytes and metadata always change together. Unrelated keys never
//! contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, Weak};

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct RecordLocks {
    inner: StdMutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            // Entries whose last guard or waiter is gone
            map.retain(|_, weak| weak.strong_count() > 0);

            match map.get(key).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let fresh = Arc::new(Mutex::new(()));
                    map.insert(key.to_string(), Arc::downgrade(&fresh));
                    fresh
                }
            }
        };

        mutex.lock_owned().await
    }

    /// Number of keys currently held or awaited.
    #[cfg(test)]
    pub(crate) fn active(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        map.values().filter(|weak| weak.strong_count() > 0).count()
    }
}
