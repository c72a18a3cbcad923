//! Per-topic mutual exclusion
//!
//! Every read-decide-write-persist sequence on a topic runs inside
//! [`TopicLocks::with_topic`], so concurrent replies to the same topic cannot
//! interleave between reading its tags and saving them. Topics are independent.
//!
//! Lock order: a private-message topic may be held while its subject topic is
//! locked, never the reverse. Re-entering the same topic id deadlocks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{ForumError, ForumResult};
use crate::model::TopicId;

/// Mutex per topic id, created on demand and dropped when idle
#[derive(Debug, Default)]
pub struct TopicLocks {
    locks: Mutex<HashMap<TopicId, Arc<Mutex<()>>>>,
}

impl TopicLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `id`.
    pub fn with_topic<R>(&self, id: TopicId, f: impl FnOnce() -> R) -> ForumResult<R> {
        let lock = {
            let mut map = self.locks.lock().map_err(|_| ForumError::LockPoisoned)?;
            map.entry(id).or_default().clone()
        };

        // A panic inside `f` poisons a mutex that guards nothing; the topic stays usable.
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        self.release(id, &lock);
        Ok(result)
    }

    /// Number of topics currently locked or waited on.
    pub fn active(&self) -> usize {
        self.locks.lock().map(|m| m.len()).unwrap_or(0)
    }

    fn release(&self, id: TopicId, lock: &Arc<Mutex<()>>) {
        if let Ok(mut map) = self.locks.lock() {
            // The map and this caller hold the only references: nobody is waiting.
            if Arc::strong_count(lock) == 2 {
                map.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_same_topic_is_serialized() {
        let locks = Arc::new(TopicLocks::new());
        let counter = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    locks
                        .with_topic(7, || {
                            let seen = counter.load(Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(2));
                            counter.store(seen + 1, Ordering::SeqCst);
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 8);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn test_nested_distinct_topics() {
        let locks = TopicLocks::new();
        let value = locks
            .with_topic(1, || locks.with_topic(2, || 42).unwrap())
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn test_panic_inside_lock_leaves_topic_usable() {
        let locks = TopicLocks::new();
        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            locks.with_topic(7, || panic!("handler failed")).unwrap();
        }));
        assert!(panicked.is_err());

        assert_eq!(locks.with_topic(7, || 1).unwrap(), 1);
        assert_eq!(locks.active(), 0);
    }
}
