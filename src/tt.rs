//! Shared transposition table.
//!
//! A fixed-size vector of cache-line-aligned buckets, each holding four
//! entries behind a single spin lock. Entries are keyed by the full Zobrist
//! hash and the search depth that produced them; within a bucket they are
//! kept in weak priority order (index 0 highest) so replacement can drop
//! the least valuable resident.
//!
//! The table doubles as the ABDADA coordination medium: `probe` can mark a
//! node as "being searched" by incrementing its `proc_number` or by
//! inserting an `Evaluating` placeholder, and `insert`/`decrement_proc`
//! release that reservation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::board::{Board, Move};
use crate::constants::{Eval, DEFER_DEPTH, ENTRIES_PER_BUCKET, MIN_EVAL};
use crate::sync::SpinLock;

/// What a stored evaluation means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundType {
    /// The stored eval is the exact minimax value of the subtree.
    Exact,
    /// The true value is at least the stored eval (fail high).
    LowerBound,
    /// The true value is at most the stored eval (no move raised alpha).
    UpperBound,
    /// Placeholder inserted by ABDADA before any bound is known.
    Evaluating,
}

/// Payload of one table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtInfo {
    pub eval: Eval,
    pub mv: Move,
    pub depth: u8,
    pub bound: BoundType,
    /// Number of workers currently searching this node (ABDADA only).
    pub proc_number: i8,
}

impl TtInfo {
    const EMPTY: TtInfo = TtInfo {
        eval: 0,
        mv: Move::null(),
        depth: 0,
        bound: BoundType::UpperBound,
        proc_number: 0,
    };

    /// Replacement ordering: does `self` rank below `other`?
    ///
    /// Entries under active search are never ranked below anything; Exact
    /// entries beat bounds; otherwise deeper wins. Ties keep the resident.
    fn ranks_below(&self, other: &TtInfo) -> bool {
        if self.proc_number > 0 {
            return false;
        }
        if other.proc_number > 0 {
            return true;
        }
        match (self.bound == BoundType::Exact, other.bound == BoundType::Exact) {
            (true, false) => false,
            (false, true) => true,
            _ => self.depth < other.depth,
        }
    }
}

#[derive(Clone, Copy)]
struct Slot {
    key: u64,
    info: TtInfo,
}

impl Slot {
    const EMPTY: Slot = Slot {
        key: 0,
        info: TtInfo::EMPTY,
    };

    /// Empty slots rank below every incoming entry.
    fn ranks_below(&self, incoming: &TtInfo) -> bool {
        self.key == 0 || self.info.ranks_below(incoming)
    }
}

/// One bucket: four slots behind one spin lock, aligned to a cache line.
#[repr(align(64))]
struct Bucket {
    slots: SpinLock<[Slot; ENTRIES_PER_BUCKET]>,
}

impl Bucket {
    fn new() -> Bucket {
        Bucket {
            slots: SpinLock::new([Slot::EMPTY; ENTRIES_PER_BUCKET]),
        }
    }
}

/// Replacement policy applied when a bucket has no slot for a new key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TtPolicy {
    /// Keep the highest-priority residents, drop the lowest.
    DepthFirst,
    /// Like `DepthFirst`, but the last slot always accepts the newcomer.
    #[default]
    ReplaceLastEntry,
    /// Two priority slots, two alternating always-replace slots.
    TwoTwoSplit,
    /// First empty slot, else overwrite `writes % 4`.
    RandomReplace,
}

/// Outcome of [`TranspositionTable::probe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Probe {
    /// Exact hit; the caller can cut off. No reservation was made.
    Cutoff(TtInfo),
    /// A peer is already searching this node exclusively; back off.
    Defer,
    /// Non-exact hit; the caller is expected to search, and its
    /// reservation (`proc_number` increment) has been recorded.
    Hit(TtInfo),
    /// Not present. `reserved` is true when an `Evaluating` placeholder
    /// was inserted on the caller's behalf.
    Miss { reserved: bool },
}

/// Occupancy snapshot, the original diagnostic output of `print_size`.
#[derive(Clone, Copy, Debug)]
pub struct TtStats {
    pub elements: u64,
    pub exact_entries: u64,
    pub writes: u64,
    pub buckets: usize,
}

impl TtStats {
    /// Fraction of slots in use, in permille.
    #[must_use]
    pub fn hashfull_per_mille(&self) -> u64 {
        let capacity = (self.buckets * ENTRIES_PER_BUCKET) as u64;
        if capacity == 0 {
            return 0;
        }
        self.elements * 1000 / capacity
    }
}

impl fmt::Display for TtStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "table elements: {}, exact entries: {}, total writes: {}, bucket count: {}",
            self.elements, self.exact_entries, self.writes, self.buckets
        )
    }
}

pub struct TranspositionTable {
    buckets: Vec<Bucket>,
    mask: u64,
    policy: TtPolicy,
    writes: AtomicU64,
}

impl TranspositionTable {
    /// Allocate a table of roughly `size_mb` megabytes (rounded down to a
    /// power of two). Memory is allocated once and never resized.
    #[must_use]
    pub fn new(size_mb: usize, policy: TtPolicy) -> TranspositionTable {
        let mb = size_mb.max(1);
        let mut mb_pow2 = mb.next_power_of_two();
        if mb_pow2 > mb {
            mb_pow2 /= 2;
        }
        let mut num_buckets = (mb_pow2 << 20) / std::mem::size_of::<Bucket>();
        if num_buckets == 0 {
            num_buckets = 1024;
        }

        let mut buckets = Vec::with_capacity(num_buckets);
        for _ in 0..num_buckets {
            buckets.push(Bucket::new());
        }

        TranspositionTable {
            buckets,
            mask: num_buckets as u64 - 1,
            policy,
            writes: AtomicU64::new(0),
        }
    }

    /// Bucket index for a key at a depth.
    ///
    /// Subtracting the depth spreads the per-depth entries of one position
    /// over distinct buckets, and puts depth d next to depth d-1: the
    /// search habitually looks up a depth and then the previous one, so
    /// the second probe lands on the neighboring bucket.
    #[inline]
    fn bucket_index(&self, key: u64, depth: u8) -> usize {
        (key.wrapping_sub(u64::from(depth)) & self.mask) as usize
    }

    /// The combined "look up, possibly mark as being searched" primitive
    /// used by ABDADA workers that are about to search this node.
    pub fn probe(&self, key: u64, depth: u8, exclusive: bool) -> Probe {
        let index = self.bucket_index(key, depth);
        let mut slots = self.buckets[index].slots.lock();

        for i in 0..ENTRIES_PER_BUCKET {
            if slots[i].key == key {
                let info = slots[i].info;
                debug_assert_eq!(info.depth, depth);

                if info.bound == BoundType::Evaluating && exclusive {
                    return Probe::Defer;
                }
                if info.bound == BoundType::Exact {
                    return Probe::Cutoff(info);
                }

                slots[i].info.proc_number = slots[i].info.proc_number.saturating_add(1);
                // The raised priority may move the slot up.
                let mut i = i;
                while i > 0 && slots[i - 1].ranks_below(&slots[i].info) {
                    slots.swap(i - 1, i);
                    i -= 1;
                }
                return Probe::Hit(info);
            }
        }

        if depth >= DEFER_DEPTH {
            let placeholder = TtInfo {
                eval: 0,
                mv: Move::null(),
                depth,
                bound: BoundType::Evaluating,
                proc_number: 1,
            };
            let writes = self.bump_writes();
            replace(self.policy, &mut slots, key, placeholder, writes);
            return Probe::Miss { reserved: true };
        }
        Probe::Miss { reserved: false }
    }

    /// Plain read without any reservation.
    #[must_use]
    pub fn lookup(&self, key: u64, depth: u8) -> Option<TtInfo> {
        let index = self.bucket_index(key, depth);
        let slots = self.buckets[index].slots.lock();
        for slot in slots.iter() {
            if slot.key == key {
                debug_assert_eq!(slot.info.depth, depth);
                return Some(slot.info);
            }
        }
        None
    }

    /// Insert or overwrite the final entry for a node.
    ///
    /// Overwriting preserves the resident `proc_number` minus one: the
    /// caller is finishing its search of this node and releases its
    /// reservation in the same locked section. New keys go through the
    /// replacement policy with the proc count supplied by the caller.
    pub fn insert(&self, key: u64, info: TtInfo) {
        debug_assert!(info.eval >= MIN_EVAL, "sentinel stored as real eval");

        let index = self.bucket_index(key, info.depth);
        let mut slots = self.buckets[index].slots.lock();

        for i in 0..ENTRIES_PER_BUCKET {
            if slots[i].key == key {
                debug_assert_eq!(slots[i].info.depth, info.depth);
                let proc = slots[i].info.proc_number;
                slots[i].info = TtInfo {
                    proc_number: if proc > 0 { proc - 1 } else { 0 },
                    ..info
                };
                // The lowered priority may move the slot down.
                let mut i = i;
                while i + 1 < ENTRIES_PER_BUCKET && slots[i].ranks_below(&slots[i + 1].info) {
                    slots.swap(i, i + 1);
                    i += 1;
                }
                return;
            }
        }

        let writes = self.bump_writes();
        replace(self.policy, &mut slots, key, info, writes);
    }

    /// Release a reservation without writing a result (early exit).
    /// Saturates at zero and ignores missing keys.
    pub fn decrement_proc(&self, key: u64, depth: u8) {
        let index = self.bucket_index(key, depth);
        let mut slots = self.buckets[index].slots.lock();
        for i in 0..ENTRIES_PER_BUCKET {
            if slots[i].key == key {
                let proc = slots[i].info.proc_number;
                slots[i].info.proc_number = if proc > 0 { proc - 1 } else { 0 };
                let mut i = i;
                while i + 1 < ENTRIES_PER_BUCKET && slots[i].ranks_below(&slots[i + 1].info) {
                    slots.swap(i, i + 1);
                    i += 1;
                }
                return;
            }
        }
    }

    /// Zero every slot and the write counter. Callers must ensure no
    /// search is running.
    pub fn clear(&self) {
        for bucket in &self.buckets {
            *bucket.slots.lock() = [Slot::EMPTY; ENTRIES_PER_BUCKET];
        }
        self.writes.store(0, Ordering::Relaxed);
    }

    /// Walk the principal variation stored for `board` at `depth`.
    ///
    /// Plays the stored moves on a copy, stepping the depth down; stops on
    /// a miss, a null move, or a stored move that is no longer legal
    /// (stale or collided entries are advisory only).
    #[must_use]
    pub fn pv_walk(&self, board: &Board, depth: u8) -> Vec<Move> {
        let mut copy = board.clone();
        let mut pv = Vec::new();
        let mut d = depth;
        while d >= 1 {
            let Some(info) = self.lookup(copy.hash_key(), d) else {
                break;
            };
            if info.mv.is_null() || !copy.generate_moves().contains(&info.mv) {
                break;
            }
            pv.push(info.mv);
            copy.make(info.mv);
            d -= 1;
        }
        pv
    }

    /// Occupancy snapshot. Scans the whole table; diagnostics only.
    #[must_use]
    pub fn stats(&self) -> TtStats {
        let mut elements = 0;
        let mut exact_entries = 0;
        for bucket in &self.buckets {
            let slots = bucket.slots.lock();
            for slot in slots.iter() {
                if slot.key != 0 {
                    elements += 1;
                    if slot.info.bound == BoundType::Exact {
                        exact_entries += 1;
                    }
                }
            }
        }
        TtStats {
            elements,
            exact_entries,
            writes: self.writes(),
            buckets: self.buckets.len(),
        }
    }

    /// Sum of all live proc counters. Zero whenever no worker holds a
    /// reservation, in particular after every join.
    #[must_use]
    pub fn proc_total(&self) -> u64 {
        let mut total = 0u64;
        for bucket in &self.buckets {
            let slots = bucket.slots.lock();
            for slot in slots.iter() {
                if slot.key != 0 && slot.info.proc_number > 0 {
                    total += slot.info.proc_number as u64;
                }
            }
        }
        total
    }

    #[inline]
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    #[inline]
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Post-increment write counter, relaxed: it only feeds the
    /// replacement tiebreakers.
    fn bump_writes(&self) -> u64 {
        self.writes.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    #[cfg(test)]
    fn assert_bucket_invariants(&self, check_order: bool) {
        for bucket in &self.buckets {
            let slots = bucket.slots.lock();
            for slot in slots.iter() {
                assert!(slot.info.proc_number >= 0);
            }
            if check_order {
                for i in 0..ENTRIES_PER_BUCKET - 1 {
                    if slots[i + 1].key != 0 {
                        assert!(
                            !slots[i].ranks_below(&slots[i + 1].info),
                            "bucket out of priority order"
                        );
                    }
                }
            }
        }
    }
}

/// Place `(key, info)` into a full-or-not bucket according to `policy`.
/// Walking with swaps keeps the bucket in priority order for the ordering
/// policies; the carried value ends up in the dropped entry.
fn replace(
    policy: TtPolicy,
    slots: &mut [Slot; ENTRIES_PER_BUCKET],
    key: u64,
    info: TtInfo,
    writes: u64,
) {
    let mut key = key;
    let mut info = info;
    match policy {
        TtPolicy::DepthFirst => {
            for slot in slots.iter_mut() {
                if slot.ranks_below(&info) {
                    std::mem::swap(&mut slot.key, &mut key);
                    std::mem::swap(&mut slot.info, &mut info);
                }
            }
        }
        TtPolicy::ReplaceLastEntry => {
            for (i, slot) in slots.iter_mut().enumerate() {
                if slot.ranks_below(&info) || i == ENTRIES_PER_BUCKET - 1 {
                    std::mem::swap(&mut slot.key, &mut key);
                    std::mem::swap(&mut slot.info, &mut info);
                }
            }
        }
        TtPolicy::TwoTwoSplit => {
            for slot in slots.iter_mut() {
                if slot.ranks_below(&info) {
                    std::mem::swap(&mut slot.key, &mut key);
                    std::mem::swap(&mut slot.info, &mut info);
                }
            }
            if key != 0 {
                // Nothing accepted the newcomer; overwrite one of the two
                // sacrificial slots, alternating by write parity.
                let slot = &mut slots[2 + (writes & 1) as usize];
                std::mem::swap(&mut slot.key, &mut key);
                std::mem::swap(&mut slot.info, &mut info);
            }
        }
        TtPolicy::RandomReplace => {
            for slot in slots.iter_mut() {
                if slot.key == 0 {
                    *slot = Slot { key, info };
                    return;
                }
            }
            slots[(writes % ENTRIES_PER_BUCKET as u64) as usize] = Slot { key, info };
        }
    }
}
