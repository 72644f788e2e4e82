//! Deferred-position cache for the simplified ABDADA search.
//!
//! A small open-addressed table marking positions some worker is searching
//! right now. Unlike full ABDADA this keeps the markers out of the
//! transposition table: a slot holds up to three hashes behind a spin
//! lock, and overflow simply tolerates the duplicated search.

use crate::constants::{DEFER_CACHE_SLOTS, DEFER_DEPTH, DEFER_SLOT_WIDTH};
use crate::sync::SpinLock;

#[repr(align(64))]
#[derive(Default)]
struct CacheSlot {
    hashes: SpinLock<[u64; DEFER_SLOT_WIDTH]>,
}

/// "Currently being searched" markers, keyed by `(hash, depth)`.
pub struct DeferCache {
    slots: Vec<CacheSlot>,
}

impl DeferCache {
    #[must_use]
    pub fn new() -> DeferCache {
        let mut slots = Vec::with_capacity(DEFER_CACHE_SLOTS);
        slots.resize_with(DEFER_CACHE_SLOTS, CacheSlot::default);
        DeferCache { slots }
    }

    #[inline]
    fn slot(&self, hash: u64, depth: u8) -> &CacheSlot {
        let index = (hash.wrapping_add(u64::from(depth)) as usize) & (self.slots.len() - 1);
        &self.slots[index]
    }

    /// Should the caller defer this position?
    ///
    /// Returns `true` when a peer already marked it. Otherwise marks it on
    /// the caller's behalf (if a slot entry is free) and returns `false`.
    /// Shallow nodes are never deferred.
    #[must_use]
    pub fn defer(&self, hash: u64, depth: u8) -> bool {
        if depth < DEFER_DEPTH {
            return false;
        }
        let mut hashes = self.slot(hash, depth).hashes.lock();
        if hashes.contains(&hash) {
            return true;
        }
        for stored in hashes.iter_mut() {
            if *stored == 0 {
                *stored = hash;
                break;
            }
        }
        // A full slot leaves the position unmarked; the occasional
        // duplicated search is cheaper than a bigger cache.
        false
    }

    /// Remove the caller's mark. Idempotent; unknown hashes are ignored.
    pub fn release(&self, hash: u64, depth: u8) {
        if depth < DEFER_DEPTH {
            return;
        }
        let mut hashes = self.slot(hash, depth).hashes.lock();
        for stored in hashes.iter_mut() {
            if *stored == hash {
                *stored = 0;
                return;
            }
        }
    }

    /// Number of marks currently held. Zero after all workers joined.
    #[must_use]
    pub fn marked_total(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| slot.hashes.lock().iter().filter(|&&h| h != 0).count())
            .sum()
    }
}

impl Default for DeferCache {
    fn default() -> Self {
        DeferCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_defer_marks_second_defers() {
        let cache = DeferCache::new();
        assert!(!cache.defer(0x1234, 5), "first visitor searches");
        assert!(cache.defer(0x1234, 5), "second visitor defers");

        cache.release(0x1234, 5);
        assert!(!cache.defer(0x1234, 5), "released mark can be re-taken");
    }

    #[test]
    fn shallow_depths_never_defer() {
        let cache = DeferCache::new();
        for _ in 0..3 {
            assert!(!cache.defer(0x42, DEFER_DEPTH - 1));
        }
        assert_eq!(cache.marked_total(), 0, "shallow calls leave no marks");
        // release below the threshold is a no-op as well
        cache.release(0x42, DEFER_DEPTH - 1);
    }

    #[test]
    fn release_is_idempotent() {
        let cache = DeferCache::new();
        assert!(!cache.defer(0x77, 4));
        cache.release(0x77, 4);
        cache.release(0x77, 4);
        assert_eq!(cache.marked_total(), 0);
    }

    #[test]
    fn distinct_depths_use_distinct_marks() {
        let cache = DeferCache::new();
        assert!(!cache.defer(0x99, 4));
        assert!(!cache.defer(0x99, 5), "same hash at another depth is free");
        assert!(cache.defer(0x99, 4));
        assert!(cache.defer(0x99, 5));
        assert_eq!(cache.marked_total(), 2);
    }

    #[test]
    fn slot_overflow_accepts_duplicates() {
        let cache = DeferCache::new();
        let stride = DEFER_CACHE_SLOTS as u64;
        // Same slot for all: hashes differ by a multiple of the slot count.
        let hashes: Vec<u64> = (0..DEFER_SLOT_WIDTH as u64 + 1)
            .map(|i| 0x8000 + i * stride)
            .collect();

        for &hash in &hashes[..DEFER_SLOT_WIDTH] {
            assert!(!cache.defer(hash, 6));
        }
        // Slot full: the extra position is searched without a mark, twice
        // if need be.
        let overflow = hashes[DEFER_SLOT_WIDTH];
        assert!(!cache.defer(overflow, 6));
        assert!(!cache.defer(overflow, 6));
        assert_eq!(cache.marked_total(), DEFER_SLOT_WIDTH);
    }
}
