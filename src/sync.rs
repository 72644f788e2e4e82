//! Synchronization primitives for the search engine.
//!
//! Provides the per-bucket spin lock used by the shared tables and the
//! shared "someone finished this depth" flag used by the workers.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A minimal test-and-set spin lock protecting a value.
///
/// Critical sections in this engine are a handful of loads and stores over
/// one cache line, so spinning beats parking. Not reentrant.
pub struct SpinLock<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>,
}

// The lock provides the required exclusion; the value is only reachable
// through a guard.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        SpinLock {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock, spinning until it is free.
    #[inline]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        while self.locked.swap(true, Ordering::Acquire) {
            std::hint::spin_loop();
        }
        SpinLockGuard { lock: self }
    }

    /// Access the value without locking. Requires exclusive access to the
    /// lock itself, so no other thread can hold a guard.
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        SpinLock::new(T::default())
    }
}

pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

/// Shared flag raced on by the workers of one iterative-deepening depth.
///
/// Wraps `Arc<AtomicBool>` so it can be handed to every worker thread.
/// The first worker to complete its root search claims the flag with
/// [`FinishFlag::finish_first`] and publishes the result; everyone else
/// observes it and unwinds.
#[derive(Clone, Debug)]
pub struct FinishFlag(Arc<AtomicBool>);

impl FinishFlag {
    /// Create a new flag (nobody finished yet).
    #[must_use]
    pub fn new() -> Self {
        FinishFlag(Arc::new(AtomicBool::new(false)))
    }

    /// Check whether some worker already finished.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Mark the search finished. Returns `true` for exactly one caller,
    /// the first one; only that caller may publish the result.
    #[inline]
    #[must_use]
    pub fn finish_first(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Clear the flag for the next depth.
    #[inline]
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for FinishFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn spin_lock_mutual_exclusion() {
        let counter = Arc::new(SpinLock::new(0u64));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    *counter.lock() += 1;
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*counter.lock(), 8000);
    }

    #[test]
    fn finish_flag_lifecycle() {
        let flag = FinishFlag::new();
        assert!(!flag.is_finished());

        assert!(flag.finish_first());
        assert!(flag.is_finished());

        flag.reset();
        assert!(!flag.is_finished());
    }

    #[test]
    fn finish_flag_first_wins_once() {
        let flag = FinishFlag::new();
        let clone = flag.clone();

        assert!(flag.finish_first());
        assert!(!clone.finish_first());
        assert!(clone.is_finished());
    }

    #[test]
    fn finish_flag_single_winner_across_threads() {
        let flag = FinishFlag::new();
        let mut handles = Vec::new();

        for _ in 0..8 {
            let flag = flag.clone();
            handles.push(thread::spawn(move || u32::from(flag.finish_first())));
        }
        let winners: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(winners, 1);
    }
}
