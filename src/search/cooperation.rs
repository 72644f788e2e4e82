//! The cooperation seam between search variants.
//!
//! Every node entry goes through a [`Cooperation`] policy: it probes the
//! shared table, may tighten the caller's window or cut off outright, may
//! tell the caller to defer the node to a peer, and on exit writes the
//! result back and releases whatever reservation was taken. The worker
//! body is identical across variants; only this seam differs.

use std::sync::Arc;

use crate::board::Move;
use crate::constants::{Eval, DEFER_DEPTH};
use crate::defer_cache::DeferCache;
use crate::tt::{BoundType, Probe, TranspositionTable, TtInfo};

/// What the policy decided at node entry.
pub(crate) enum Entered {
    /// The table already settles this node; return the eval.
    Cutoff(Eval),
    /// A peer is searching this node; the caller should come back later.
    Defer,
    /// Search it. `tt_move` orders the move list; `reserved` must be
    /// handed back to `exit_node`/`abort_node`.
    Search { tt_move: Move, reserved: bool },
}

pub(crate) trait Cooperation: Send + Sync {
    /// Probe (and possibly mark) a node before searching it. May shrink
    /// the `alpha`/`beta` window in place.
    fn enter_node(
        &self,
        tt: &TranspositionTable,
        key: u64,
        depth: u8,
        exclusive: bool,
        alpha: &mut Eval,
        beta: &mut Eval,
    ) -> Entered;

    /// Publish a finished node and release the entry reservation.
    fn exit_node(&self, tt: &TranspositionTable, key: u64, info: TtInfo, reserved: bool);

    /// Release-only path for a node abandoned because the depth finished.
    fn abort_node(&self, tt: &TranspositionTable, key: u64, depth: u8, reserved: bool);
}

/// Apply a stored bound to the window. Returns the cutoff value when the
/// window collapses. `Evaluating` placeholders carry no usable bound.
fn tighten_window(info: &TtInfo, alpha: &mut Eval, beta: &mut Eval) -> Option<Eval> {
    match info.bound {
        BoundType::Exact => return Some(info.eval),
        BoundType::UpperBound => *beta = (*beta).min(info.eval),
        BoundType::LowerBound => *alpha = (*alpha).max(info.eval),
        BoundType::Evaluating => {}
    }
    if *alpha >= *beta {
        Some(info.eval)
    } else {
        None
    }
}

/// When the entry itself had no move, try the same position one depth
/// shallower; iterative deepening usually left one there.
fn tt_move_or_previous_depth(
    tt: &TranspositionTable,
    key: u64,
    depth: u8,
    tt_move: Move,
) -> Move {
    if !tt_move.is_null() || depth == 0 {
        return tt_move;
    }
    match tt.lookup(key, depth - 1) {
        Some(previous) => previous.mv,
        None => Move::null(),
    }
}

/// Sequential and lazy-SMP cooperation: the shared table is consulted and
/// written, but nodes are never reserved and never deferred.
pub(crate) struct SharedTable;

impl Cooperation for SharedTable {
    fn enter_node(
        &self,
        tt: &TranspositionTable,
        key: u64,
        depth: u8,
        _exclusive: bool,
        alpha: &mut Eval,
        beta: &mut Eval,
    ) -> Entered {
        let mut tt_move = Move::null();
        if let Some(info) = tt.lookup(key, depth) {
            if let Some(eval) = tighten_window(&info, alpha, beta) {
                return Entered::Cutoff(eval);
            }
            tt_move = info.mv;
        }
        Entered::Search {
            tt_move: tt_move_or_previous_depth(tt, key, depth, tt_move),
            reserved: false,
        }
    }

    fn exit_node(&self, tt: &TranspositionTable, key: u64, info: TtInfo, _reserved: bool) {
        tt.insert(key, info);
    }

    fn abort_node(&self, _tt: &TranspositionTable, _key: u64, _depth: u8, _reserved: bool) {}
}

/// Full ABDADA: reservations live in the transposition table itself.
pub(crate) struct TtMarkers;

impl Cooperation for TtMarkers {
    fn enter_node(
        &self,
        tt: &TranspositionTable,
        key: u64,
        depth: u8,
        exclusive: bool,
        alpha: &mut Eval,
        beta: &mut Eval,
    ) -> Entered {
        match tt.probe(key, depth, exclusive) {
            Probe::Defer => Entered::Defer,
            Probe::Cutoff(info) => Entered::Cutoff(info.eval),
            Probe::Hit(info) => {
                if let Some(eval) = tighten_window(&info, alpha, beta) {
                    // The probe reserved the entry but the window is
                    // already empty; give the reservation back.
                    tt.decrement_proc(key, depth);
                    return Entered::Cutoff(eval);
                }
                Entered::Search {
                    tt_move: tt_move_or_previous_depth(tt, key, depth, info.mv),
                    reserved: true,
                }
            }
            Probe::Miss { reserved } => Entered::Search {
                tt_move: tt_move_or_previous_depth(tt, key, depth, Move::null()),
                reserved,
            },
        }
    }

    fn exit_node(&self, tt: &TranspositionTable, key: u64, info: TtInfo, _reserved: bool) {
        // insert releases the reservation under the same bucket lock.
        tt.insert(key, info);
    }

    fn abort_node(&self, tt: &TranspositionTable, key: u64, depth: u8, reserved: bool) {
        if reserved {
            tt.decrement_proc(key, depth);
        }
    }
}

/// Simplified ABDADA: reservations live in the deferred-position cache,
/// table traffic is identical to lazy SMP.
pub(crate) struct CachedMarkers {
    pub(crate) cache: Arc<DeferCache>,
}

impl Cooperation for CachedMarkers {
    fn enter_node(
        &self,
        tt: &TranspositionTable,
        key: u64,
        depth: u8,
        exclusive: bool,
        alpha: &mut Eval,
        beta: &mut Eval,
    ) -> Entered {
        let mut reserved = false;
        if exclusive {
            if self.cache.defer(key, depth) {
                return Entered::Defer;
            }
            reserved = depth >= DEFER_DEPTH;
        }

        let mut tt_move = Move::null();
        if let Some(info) = tt.lookup(key, depth) {
            if let Some(eval) = tighten_window(&info, alpha, beta) {
                if reserved {
                    self.cache.release(key, depth);
                }
                return Entered::Cutoff(eval);
            }
            tt_move = info.mv;
        }
        Entered::Search {
            tt_move: tt_move_or_previous_depth(tt, key, depth, tt_move),
            reserved,
        }
    }

    fn exit_node(&self, tt: &TranspositionTable, key: u64, info: TtInfo, reserved: bool) {
        if reserved {
            self.cache.release(key, info.depth);
        }
        tt.insert(key, info);
    }

    fn abort_node(&self, _tt: &TranspositionTable, key: u64, depth: u8, reserved: bool) {
        if reserved {
            self.cache.release(key, depth);
        }
    }
}
