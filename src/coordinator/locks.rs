use crate::core::{ResourceId, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = Arc<Mutex<HashMap<ResourceId, Arc<AsyncMutex<()>>>>>;

/// Per-resource mutual exclusion
///
/// At most one lifecycle transition per id is in flight. Entries are
/// created on demand and dropped once nobody holds or waits on them.
#[derive(Default)]
pub struct KeyedLocks {
    table: LockTable,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, id: ResourceId) -> Result<KeyedGuard> {
        self.lock_many(&[id]).await
    }

    /// Lock several ids. Keys are taken in ascending order so two callers
    /// locking overlapping sets cannot deadlock.
    pub async fn lock_many(&self, ids: &[ResourceId]) -> Result<KeyedGuard> {
        let mut keys = ids.to_vec();
        keys.sort();
        keys.dedup();

        let mut guard = KeyedGuard {
            held: Vec::with_capacity(keys.len()),
            table: Arc::clone(&self.table),
        };

        for key in keys {
            let mutex = {
                let mut table = self.table.lock()?;
                Arc::clone(table.entry(key).or_default())
            };
            guard.held.push((key, mutex.lock_owned().await));
        }

        Ok(guard)
    }

    /// Number of ids with a live lock entry
    pub fn len(&self) -> usize {
        self.table.lock().map(|table| table.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases its locks on drop
pub struct KeyedGuard {
    held: Vec<(ResourceId, OwnedMutexGuard<()>)>,
    table: LockTable,
}

impl KeyedGuard {
    pub fn ids(&self) -> Vec<ResourceId> {
        self.held.iter().map(|(id, _)| *id).collect()
    }
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        let ids = self.ids();
        self.held.clear();

        if let Ok(mut table) = self.table.lock() {
            for id in ids {
                let idle = table
                    .get(&id)
                    .map(|entry| Arc::strong_count(entry) == 1)
                    .unwrap_or(false);
                if idle {
                    table.remove(&id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_id_is_serialized() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(ResourceId(1)).await.unwrap();
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_ids_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock(ResourceId(1)).await.unwrap();
        let b = tokio::time::timeout(Duration::from_millis(200), locks.lock(ResourceId(2))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_lock_many_dedups_and_releases() {
        let locks = KeyedLocks::new();
        {
            let guard = locks
                .lock_many(&[ResourceId(3), ResourceId(1), ResourceId(3)])
                .await
                .unwrap();
            assert_eq!(guard.ids(), vec![ResourceId(1), ResourceId(3)]);
            assert_eq!(locks.len(), 2);
        }
        assert!(locks.is_empty());
    }
}
