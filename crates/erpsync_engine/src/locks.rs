//! Per-object mutual exclusion.

use erpsync_core::LocalKey;
use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;

/// Serializes work on the same local object.
///
/// Held for the duration of a save, delete, replay or order confirmation,
/// so two threads cannot both decide a remote object is missing and
/// create it twice. Different objects proceed in parallel.
#[derive(Debug, Default)]
pub struct ObjectLocks {
    held: Mutex<HashSet<LocalKey>>,
    released: Condvar,
}

impl ObjectLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the object is free and takes it.
    ///
    /// Not reentrant: taking the same object twice on one thread deadlocks.
    pub fn lock(&self, key: LocalKey) -> ObjectGuard<'_> {
        let mut held = self.held.lock();
        while held.contains(&key) {
            self.released.wait(&mut held);
        }
        held.insert(key.clone());
        ObjectGuard { locks: self, key }
    }

    /// Returns true if some thread holds the object.
    pub fn is_locked(&self, key: &LocalKey) -> bool {
        self.held.lock().contains(key)
    }
}

/// Releases an object lock on drop.
#[derive(Debug)]
pub struct ObjectGuard<'a> {
    locks: &'a ObjectLocks,
    key: LocalKey,
}

impl ObjectGuard<'_> {
    /// The locked object.
    pub fn key(&self) -> &LocalKey {
        &self.key
    }
}

impl Drop for ObjectGuard<'_> {
    fn drop(&mut self) {
        self.locks.held.lock().remove(&self.key);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn guard_releases_on_drop() {
        let locks = ObjectLocks::new();
        let key = LocalKey::new("Product", 1);

        let guard = locks.lock(key.clone());
        assert_eq!(guard.key(), &key);
        assert!(locks.is_locked(&key));
        assert!(!locks.is_locked(&LocalKey::new("Product", 2)));

        drop(guard);
        assert!(!locks.is_locked(&key));
    }

    #[test]
    fn same_object_is_serialized() {
        let locks = Arc::new(ObjectLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let overlap = Arc::clone(&overlap);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let _guard = locks.lock(LocalKey::new("Order", 7));
                        if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                            overlap.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_micros(50));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn different_objects_do_not_block() {
        let locks = ObjectLocks::new();
        let _a = locks.lock(LocalKey::new("Order", 1));
        let _b = locks.lock(LocalKey::new("Order", 2));
        assert!(locks.is_locked(&LocalKey::new("Order", 1)));
        assert!(locks.is_locked(&LocalKey::new("Order", 2)));
    }
}
