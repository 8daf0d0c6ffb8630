//! Per-resource write locks
//!
//! One async mutex per resource id, created on first use and evicted once no
//! request holds or waits for it. Cloning an entry and evicting one both
//! happen under the table mutex, so a waiter can never be left holding a
//! mutex that has been dropped from the table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::common::{Error, Result};

type Table = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

#[derive(Default)]
pub struct ResourceLocks {
    table: Arc<Table>,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `timeout` for exclusive access to `resource_id`.
    pub async fn acquire(&self, resource_id: &str, timeout: Duration) -> Result<ResourceLockGuard> {
        let mutex = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table
                .entry(resource_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                // the clone we held is gone; evict the entry if nobody else wants it
                evict_if_idle(&self.table, resource_id);
                return Err(Error::Busy(format!(
                    "write lock for {} not acquired within {:?}",
                    resource_id, timeout
                )));
            }
        };

        Ok(ResourceLockGuard {
            guard: Some(guard),
            table: self.table.clone(),
            resource_id: resource_id.to_string(),
        })
    }

    /// Number of resource ids that currently have a lock entry
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

fn evict_if_idle(table: &Table, resource_id: &str) {
    let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(entry) = table.get(resource_id) {
        if Arc::strong_count(entry) == 1 {
            table.remove(resource_id);
        }
    }
}

/// Exclusive access to one resource id; released on drop.
pub struct ResourceLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<Table>,
    resource_id: String,
}

impl ResourceLockGuard {
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }
}

impl Drop for ResourceLockGuard {
    fn drop(&mut self) {
        // unlock before the idle check so our own clone no longer counts
        drop(self.guard.take());
        evict_if_idle(&self.table, &self.resource_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exclusive_per_id() {
        let locks = ResourceLocks::new();
        let held = locks.acquire("p1", Duration::from_secs(1)).await.unwrap();

        let blocked = locks.acquire("p1", Duration::from_millis(50)).await;
        assert!(matches!(blocked, Err(Error::Busy(_))));

        // other ids are unaffected
        let other = locks.acquire("p2", Duration::from_millis(50)).await;
        assert!(other.is_ok());
        drop(other);

        drop(held);
        let again = locks.acquire("p1", Duration::from_millis(50)).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_entries_evicted_when_idle() {
        let locks = ResourceLocks::new();
        {
            let _a = locks.acquire("p1", Duration::from_secs(1)).await.unwrap();
            let _b = locks.acquire("p2", Duration::from_secs(1)).await.unwrap();
            assert_eq!(locks.len(), 2);
        }
        assert!(locks.is_empty());

        let held = locks.acquire("p1", Duration::from_secs(1)).await.unwrap();
        let _ = locks.acquire("p1", Duration::from_millis(10)).await;
        // the timed-out waiter must not evict the entry still held
        assert_eq!(locks.len(), 1);
        drop(held);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_waiter_proceeds_after_release() {
        let locks = Arc::new(ResourceLocks::new());
        let held = locks.acquire("p1", Duration::from_secs(1)).await.unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                locks
                    .acquire("p1", Duration::from_secs(5))
                    .await
                    .map(|g| g.resource_id().to_string())
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);
        assert_eq!(waiter.await.unwrap().unwrap(), "p1");
        assert!(locks.is_empty());
    }
}
