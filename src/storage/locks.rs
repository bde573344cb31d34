//! Per-alias mutual exclusion for read-transform-commit sequences

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

/// Table of async locks keyed by filename.
///
/// Each filename is an independent resource; there is no cross-alias
/// locking. Entries are created on first use and dropped once nobody holds
/// or waits on them.
#[derive(Default)]
pub struct AliasLocks {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

/// Held for the duration of one mutation of a single alias
pub struct AliasGuard {
    key: String,
    slots: Arc<Mutex<HashMap<String, Slot>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl AliasLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `key` is free and take it.
    ///
    /// The guard is `Send + 'static`, so it can be moved into the blocking
    /// task that performs the write and released only once that task ends.
    pub async fn acquire(&self, key: &str) -> AliasGuard {
        let slot = {
            let mut slots = self.slots.lock();
            // Entries left by waiters that were cancelled after the release
            slots.retain(|k, slot| k == key || Arc::strong_count(slot) > 1);
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = slot.lock_owned().await;

        AliasGuard {
            key: key.to_string(),
            slots: Arc::clone(&self.slots),
            guard: Some(guard),
        }
    }

    /// Take several keys in sorted order, so that two callers locking
    /// overlapping sets cannot deadlock. Duplicate keys are taken once.
    pub async fn acquire_all(&self, keys: &[&str]) -> Vec<AliasGuard> {
        let mut keys = keys.to_vec();
        keys.sort_unstable();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.acquire(key).await);
        }
        guards
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Check if no key is currently tracked
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl Drop for AliasGuard {
    fn drop(&mut self) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(&self.key) {
            // One reference in the table, one inside our guard: no waiters.
            if Arc::strong_count(slot) == 2 {
                slots.remove(&self.key);
            }
        }
        drop(self.guard.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let locks = AliasLocks::new();
        {
            let _guard = locks.acquire("a__current.pdf").await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = AliasLocks::new();
        let _a = locks.acquire("a.pdf").await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.acquire("b.pdf")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_key_is_serialized() {
        let locks = Arc::new(AliasLocks::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let active = Arc::clone(&active);
            let max_seen = Arc::clone(&max_seen);
            tasks.push(tokio::spawn(async move {
                let _guard = locks.acquire("shared__current.pdf").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_entry_is_pruned() {
        let locks = Arc::new(AliasLocks::new());
        let first = locks.acquire("k").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("k").await;
                std::future::pending::<()>().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The waiter still holds a reference, so the entry survives the release
        drop(first);
        waiter.abort();
        let _ = waiter.await;
        assert_eq!(locks.len(), 1);

        let _other = locks.acquire("other").await;
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_acquire_all_sorts_and_dedups() {
        let locks = Arc::new(AliasLocks::new());
        let guards = locks
            .acquire_all(&["b__current.pdf", "a.pdf", "b__current.pdf"])
            .await;
        assert_eq!(guards.len(), 2);
        assert_eq!(locks.len(), 2);

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire("a.pdf")).await;
        assert!(blocked.is_err());

        drop(guards);
        assert!(locks.is_empty());
    }

    #[test]
    fn test_guard_is_send_and_static() {
        fn assert_send_static<T: Send + 'static>() {}
        assert_send_static::<AliasGuard>();
    }

    #[tokio::test]
    async fn test_waiter_keeps_entry_alive() {
        let locks = Arc::new(AliasLocks::new());
        let first = locks.acquire("k").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("k").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
