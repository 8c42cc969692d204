//! Per-key async mutex table.
//!
//! # Responsibilities
//! - Serialize read-modify-write sequences for one provider id
//! - Let different ids proceed independently
//! - Drop table entries once nobody holds or waits on them
//!
//! # Design Decisions
//! - Release is RAII: dropping the guard (including on panic or cancellation)
//!   unlocks and prunes the entry
//! - A bounded failsafe wait force-replaces an entry whose holder never
//!   settles, so one stuck operation cannot starve an id forever

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Table = DashMap<String, Arc<Mutex<()>>>;

/// Lazily-populated map of id -> mutex.
#[derive(Debug, Clone)]
pub struct KeyedLock {
    table: Arc<Table>,
    failsafe: Duration,
}

impl KeyedLock {
    pub fn new(failsafe: Duration) -> Self {
        Self {
            table: Arc::new(DashMap::new()),
            failsafe,
        }
    }

    /// Acquire the lock for `key`, waiting behind earlier holders.
    pub async fn acquire(&self, key: &str) -> KeyedLockGuard {
        let lock = self.entry(key);
        match tokio::time::timeout(self.failsafe, lock.clone().lock_owned()).await {
            Ok(guard) => KeyedLockGuard {
                key: key.to_string(),
                lock,
                guard: Some(guard),
                table: self.table.clone(),
            },
            Err(_) => {
                tracing::warn!(
                    key = %key,
                    failsafe_ms = self.failsafe.as_millis() as u64,
                    "Lock holder did not settle, force-clearing entry"
                );
                let fresh = Arc::new(Mutex::new(()));
                self.table.insert(key.to_string(), fresh.clone());
                let guard = fresh.clone().lock_owned().await;
                KeyedLockGuard {
                    key: key.to_string(),
                    lock: fresh,
                    guard: Some(guard),
                    table: self.table.clone(),
                }
            }
        }
    }

    /// Number of ids with a live entry.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn entry(&self, key: &str) -> Arc<Mutex<()>> {
        self.table
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl Default for KeyedLock {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

/// Held lock for one key. Unlocks on drop.
#[derive(Debug)]
pub struct KeyedLockGuard {
    key: String,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<Table>,
}

impl Drop for KeyedLockGuard {
    fn drop(&mut self) {
        // The owned guard holds its own Arc; release it before counting.
        drop(self.guard.take());
        // Table + this handle are the only references when nobody is queued.
        self.table.remove_if(&self.key, |_, current| {
            Arc::ptr_eq(current, &self.lock) && Arc::strong_count(current) == 2
        });
    }
}
