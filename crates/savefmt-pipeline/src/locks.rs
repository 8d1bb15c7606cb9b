//! One apply at a time per buffer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identity of an open buffer, as named by the event source.
pub type BufferId = u64;

/// Hands out one mutex per buffer id.
///
/// A worker holds its buffer's lock from taking the snapshot until the replay is done, so
/// two saves of the same buffer never drive its cursor at the same time. Different buffers
/// do not contend.
#[derive(Debug, Clone, Default)]
pub struct BufferLocks {
    inner: Arc<Mutex<HashMap<BufferId, Arc<Mutex<()>>>>>,
}

impl BufferLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `id`, created on first use.
    pub fn lock_for(&self, id: BufferId) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // Drop entries nobody holds any more.
        map.retain(|key, lock| *key == id || Arc::strong_count(lock) > 1);
        map.entry(id).or_default().clone()
    }

    /// Number of buffers with a live lock entry.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no buffer has a lock entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Acquire `lock`, ignoring poisoning: a panicked worker leaves no state behind the mutex.
pub fn acquire(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_same_buffer_shares_a_lock() {
        let locks = BufferLocks::new();
        let a = locks.lock_for(7);
        let b = locks.lock_for(7);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &locks.lock_for(8)));
    }

    #[test]
    fn test_unused_entries_are_pruned() {
        let locks = BufferLocks::new();
        drop(locks.lock_for(1));
        drop(locks.lock_for(2));
        let _held = locks.lock_for(3);
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_at_most_one_holder_per_buffer() {
        let locks = BufferLocks::new();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let active = active.clone();
                let peak = peak.clone();
                thread::spawn(move || {
                    let lock = locks.lock_for(42);
                    let _guard = acquire(&lock);
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
