//! The search worker: negamax with principal-variation search, null-window
//! re-searches, quiescence, and the deferred-move protocol.
//!
//! One worker runs per thread and owns a private board clone. All
//! cross-worker communication happens through the shared table (via the
//! cooperation policy) and the finish flag.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::board::{Board, Move};
use crate::constants::{Eval, MAX_EVAL, MIN_EVAL, ON_EVALUATION};
use crate::sync::FinishFlag;
use crate::tt::{BoundType, TranspositionTable, TtInfo};

use super::cooperation::{Cooperation, Entered};
use super::{DepthShared, SearchOptions, SearchResult};

pub(crate) struct Worker {
    board: Board,
    nodes: u64,
    deferred_retries: u64,
    tt: Arc<TranspositionTable>,
    coop: Arc<dyn Cooperation>,
    finished: FinishFlag,
    options: SearchOptions,
    rng: SmallRng,
}

impl Worker {
    pub(crate) fn new(
        board: Board,
        tt: Arc<TranspositionTable>,
        coop: Arc<dyn Cooperation>,
        finished: FinishFlag,
        options: SearchOptions,
        seed: u64,
    ) -> Worker {
        Worker {
            board,
            nodes: 0,
            deferred_retries: 0,
            tt,
            coop,
            finished,
            options,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Legal moves, shuffled for diversification, with the TT move hoisted
    /// to the front. Shuffling is what makes identical lazy-SMP workers
    /// explore different subtrees first.
    fn ordered_moves(&mut self, tt_move: Move) -> Vec<Move> {
        let mut moves = self.board.generate_moves();
        if self.options.shuffle {
            moves.shuffle(&mut self.rng);
        }
        if !tt_move.is_null() {
            if let Some(index) = moves.iter().position(|&m| m == tt_move) {
                moves.swap(0, index);
            }
        }
        moves
    }

    /// Capture-only quiescence search.
    fn q_search(&mut self, alpha: Eval, beta: Eval) -> Eval {
        let mut stand_pat = self.board.evaluate();
        if stand_pat < MIN_EVAL {
            // Keep every score negatable.
            stand_pat = MIN_EVAL;
        }
        self.nodes += 1;
        if !self.options.quiescence {
            return stand_pat;
        }

        if stand_pat >= beta {
            return stand_pat;
        }
        let mut alpha = alpha;
        if stand_pat > alpha {
            alpha = stand_pat;
        }

        let mut best = stand_pat;
        for mv in self.board.generate_captures() {
            self.board.make(mv);
            let inner = -self.q_search(-beta, -alpha);
            self.board.unmake(mv);
            if inner > best {
                best = inner;
                if best >= beta {
                    break;
                }
                if best > alpha {
                    alpha = best;
                }
            }
        }
        best
    }

    /// Null-window quiescence: fail-high test only, no alpha to maintain.
    fn nw_q_search(&mut self, beta: Eval) -> Eval {
        let mut stand_pat = self.board.evaluate();
        if stand_pat < MIN_EVAL {
            stand_pat = MIN_EVAL;
        }
        self.nodes += 1;
        if !self.options.quiescence {
            return stand_pat;
        }

        if stand_pat >= beta {
            return stand_pat;
        }

        let mut best = stand_pat;
        for mv in self.board.generate_captures() {
            self.board.make(mv);
            let inner = -self.nw_q_search(1 - beta);
            self.board.unmake(mv);
            if inner > best {
                best = inner;
                if best >= beta {
                    break;
                }
            }
        }
        best
    }

    /// Null-window search around `beta`: does the true value reach `beta`?
    ///
    /// Returns [`ON_EVALUATION`] when the node was deferred to a peer; the
    /// caller keeps the move aside and retries it after the main pass.
    fn null_window_search(&mut self, beta: Eval, depth: u8, exclusive: bool) -> Eval {
        debug_assert!(depth >= 1);
        let mut alpha = beta - 1;
        let mut beta = beta;
        let key = self.board.hash_key();
        let (tt_move, reserved) =
            match self
                .coop
                .enter_node(&self.tt, key, depth, exclusive, &mut alpha, &mut beta)
            {
                Entered::Cutoff(eval) => return eval,
                Entered::Defer => return ON_EVALUATION,
                Entered::Search { tt_move, reserved } => (tt_move, reserved),
            };

        let moves = self.ordered_moves(tt_move);
        let mut best = MIN_EVAL;
        // Keep the old TT move if no move improves on MIN_EVAL.
        let mut entry = TtInfo {
            eval: best,
            mv: tt_move,
            depth,
            bound: BoundType::UpperBound,
            proc_number: 0,
        };
        let mut deferred = Vec::new();

        for (index, &mv) in moves.iter().enumerate() {
            self.board.make(mv);
            let inner = if depth > 1 {
                // Children after the first are searched exclusively: if a
                // peer already owns one, postpone it.
                let child = self.null_window_search(1 - beta, depth - 1, index > 0);
                if child == ON_EVALUATION {
                    deferred.push(mv);
                    self.board.unmake(mv);
                    continue;
                }
                -child
            } else {
                -self.nw_q_search(1 - beta)
            };
            self.board.unmake(mv);

            if inner > best {
                best = inner;
                entry.mv = mv;
                if best >= beta {
                    entry.bound = BoundType::LowerBound;
                    break;
                }
            }
            if self.finished.is_finished() {
                self.coop.abort_node(&self.tt, key, depth, reserved);
                return best;
            }
        }

        // Second pass: revisit what peers were searching, non-exclusively
        // this time.
        for &mv in &deferred {
            self.deferred_retries += 1;
            self.board.make(mv);
            let child = self.null_window_search(1 - beta, depth - 1, false);
            let inner = -child;
            self.board.unmake(mv);

            if inner > best {
                best = inner;
                entry.mv = mv;
                if best >= beta {
                    entry.bound = BoundType::LowerBound;
                    break;
                }
            }
            if self.finished.is_finished() {
                self.coop.abort_node(&self.tt, key, depth, reserved);
                return best;
            }
        }

        entry.eval = best;
        self.coop.exit_node(&self.tt, key, entry, reserved);
        best
    }

    /// Principal-variation search: first move with the full window, the
    /// rest scouted with a null window and re-searched when they beat
    /// alpha.
    fn pv_search(&mut self, alpha: Eval, beta: Eval, depth: u8) -> Eval {
        debug_assert!(depth >= 1);
        let mut alpha = alpha;
        let mut beta = beta;
        let key = self.board.hash_key();
        let (tt_move, reserved) =
            match self
                .coop
                .enter_node(&self.tt, key, depth, false, &mut alpha, &mut beta)
            {
                Entered::Cutoff(eval) => return eval,
                Entered::Defer => return ON_EVALUATION,
                Entered::Search { tt_move, reserved } => (tt_move, reserved),
            };

        let moves = self.ordered_moves(tt_move);
        let mut best = MIN_EVAL;
        let mut entry = TtInfo {
            eval: best,
            mv: tt_move,
            depth,
            bound: BoundType::UpperBound,
            proc_number: 0,
        };
        let mut deferred = Vec::new();
        let mut search_full_window = true;

        for &mv in &moves {
            self.board.make(mv);
            let inner;
            if depth == 1 {
                inner = -self.q_search(-beta, -alpha);
            } else {
                // MAX_EVAL forces the full-window search when no scout ran.
                let mut scout = MAX_EVAL;
                if !search_full_window {
                    let child = self.null_window_search(-alpha, depth - 1, true);
                    if child == ON_EVALUATION {
                        deferred.push(mv);
                        self.board.unmake(mv);
                        continue;
                    }
                    scout = -child;
                }
                if scout > alpha {
                    inner = -self.pv_search(-beta, -alpha, depth - 1);
                    search_full_window = false;
                } else {
                    inner = scout;
                }
            }
            self.board.unmake(mv);

            if inner > best {
                best = inner;
                entry.mv = mv;
                if best >= beta {
                    entry.bound = BoundType::LowerBound;
                    break;
                }
                if best > alpha {
                    alpha = best;
                    entry.bound = BoundType::Exact;
                }
            }
            if self.finished.is_finished() {
                self.coop.abort_node(&self.tt, key, depth, reserved);
                return best;
            }
        }

        // Deferred moves never appear at depth 1 and are never deferred a
        // second time.
        for &mv in &deferred {
            self.deferred_retries += 1;
            self.board.make(mv);
            let child = self.null_window_search(-alpha, depth - 1, false);
            let mut inner = -child;
            if inner > alpha {
                inner = -self.pv_search(-beta, -alpha, depth - 1);
            }
            self.board.unmake(mv);

            if inner > best {
                best = inner;
                entry.mv = mv;
                if best >= beta {
                    entry.bound = BoundType::LowerBound;
                    break;
                }
                if best > alpha {
                    alpha = best;
                    entry.bound = BoundType::Exact;
                }
            }
            if self.finished.is_finished() {
                self.coop.abort_node(&self.tt, key, depth, reserved);
                return best;
            }
        }

        entry.eval = best;
        self.coop.exit_node(&self.tt, key, entry, reserved);
        best
    }

    /// Plain full-window negamax, used when PV search is disabled. Follows
    /// the same cooperation protocol as the PVS path.
    fn nega_max(&mut self, alpha: Eval, beta: Eval, depth: u8, exclusive: bool) -> Eval {
        debug_assert!(depth >= 1);
        let mut alpha = alpha;
        let mut beta = beta;
        let key = self.board.hash_key();
        let (tt_move, reserved) =
            match self
                .coop
                .enter_node(&self.tt, key, depth, exclusive, &mut alpha, &mut beta)
            {
                Entered::Cutoff(eval) => return eval,
                Entered::Defer => return ON_EVALUATION,
                Entered::Search { tt_move, reserved } => (tt_move, reserved),
            };

        let moves = self.ordered_moves(tt_move);
        let mut best = MIN_EVAL;
        let mut entry = TtInfo {
            eval: best,
            mv: tt_move,
            depth,
            bound: BoundType::UpperBound,
            proc_number: 0,
        };
        let mut deferred = Vec::new();

        for (index, &mv) in moves.iter().enumerate() {
            self.board.make(mv);
            let inner = if depth > 1 {
                let child = self.nega_max(-beta, -alpha, depth - 1, index > 0);
                if child == ON_EVALUATION {
                    deferred.push(mv);
                    self.board.unmake(mv);
                    continue;
                }
                -child
            } else {
                -self.q_search(-beta, -alpha)
            };
            self.board.unmake(mv);

            if inner > best {
                best = inner;
                entry.mv = mv;
                if best >= beta {
                    entry.bound = BoundType::LowerBound;
                    break;
                }
                if best > alpha {
                    alpha = best;
                    entry.bound = BoundType::Exact;
                }
            }
            if self.finished.is_finished() {
                self.coop.abort_node(&self.tt, key, depth, reserved);
                return best;
            }
        }

        for &mv in &deferred {
            self.deferred_retries += 1;
            self.board.make(mv);
            let child = self.nega_max(-beta, -alpha, depth - 1, false);
            let inner = -child;
            self.board.unmake(mv);

            if inner > best {
                best = inner;
                entry.mv = mv;
                if best >= beta {
                    entry.bound = BoundType::LowerBound;
                    break;
                }
                if best > alpha {
                    alpha = best;
                    entry.bound = BoundType::Exact;
                }
            }
            if self.finished.is_finished() {
                self.coop.abort_node(&self.tt, key, depth, reserved);
                return best;
            }
        }

        entry.eval = best;
        self.coop.exit_node(&self.tt, key, entry, reserved);
        best
    }

    /// Root search for one depth. The first worker to complete publishes
    /// the depth result; everyone else contributes node counts only.
    pub(crate) fn root_max(&mut self, alpha: Eval, beta: Eval, depth: u8, shared: &DepthShared) {
        let start = Instant::now();
        self.nodes = 0;
        self.deferred_retries = 0;
        debug_assert!(depth > 0);

        let mut alpha = alpha;
        let mut beta = beta;
        let key = self.board.hash_key();
        let (tt_move, reserved) =
            match self
                .coop
                .enter_node(&self.tt, key, depth, false, &mut alpha, &mut beta)
            {
                // A settled root means a peer already finished this depth
                // and published its result; nothing left to contribute.
                Entered::Cutoff(_) | Entered::Defer => return,
                Entered::Search { tt_move, reserved } => (tt_move, reserved),
            };

        let moves = self.ordered_moves(tt_move);
        let mut best = MIN_EVAL;
        let mut best_move = Move::null();
        let mut deferred = Vec::new();
        let mut search_full_window = true;

        for (index, &mv) in moves.iter().enumerate() {
            self.board.make(mv);
            let inner;
            if depth == 1 {
                inner = -self.q_search(-beta, -alpha);
            } else if !self.options.pv_search {
                let child = self.nega_max(-beta, -alpha, depth - 1, index > 0);
                if child == ON_EVALUATION {
                    deferred.push(mv);
                    self.board.unmake(mv);
                    continue;
                }
                inner = -child;
            } else {
                let mut scout = MAX_EVAL;
                if !search_full_window {
                    let child = self.null_window_search(-alpha, depth - 1, true);
                    if child == ON_EVALUATION {
                        deferred.push(mv);
                        self.board.unmake(mv);
                        continue;
                    }
                    scout = -child;
                }
                if scout > alpha {
                    inner = -self.pv_search(-beta, -alpha, depth - 1);
                    search_full_window = false;
                } else {
                    inner = scout;
                }
            }
            self.board.unmake(mv);

            if inner > best {
                best = inner;
                best_move = mv;
                if best >= beta {
                    break;
                }
                if best > alpha {
                    alpha = best;
                }
            }
            if self.finished.is_finished() {
                self.coop.abort_node(&self.tt, key, depth, reserved);
                self.flush_counters(shared);
                return;
            }
        }

        for &mv in &deferred {
            self.deferred_retries += 1;
            self.board.make(mv);
            let inner;
            if !self.options.pv_search {
                inner = -self.nega_max(-beta, -alpha, depth - 1, false);
            } else {
                let mut value = -self.null_window_search(-alpha, depth - 1, false);
                if value > alpha {
                    value = -self.pv_search(-beta, -alpha, depth - 1);
                }
                inner = value;
            }
            self.board.unmake(mv);

            if inner > best {
                best = inner;
                best_move = mv;
                if best >= beta {
                    break;
                }
                if best > alpha {
                    alpha = best;
                }
            }
            if self.finished.is_finished() {
                self.coop.abort_node(&self.tt, key, depth, reserved);
                self.flush_counters(shared);
                return;
            }
        }

        self.coop.exit_node(
            &self.tt,
            key,
            TtInfo {
                eval: best,
                mv: best_move,
                depth,
                bound: BoundType::Exact,
                proc_number: 0,
            },
            reserved,
        );

        let duration = start.elapsed();
        self.flush_counters(shared);

        if shared.finished.finish_first() {
            *shared.result.lock() = Some(SearchResult {
                best_move: if best_move.is_null() {
                    None
                } else {
                    Some(best_move)
                },
                eval: best,
                depth,
                // Per-worker count; the driver swaps in the shared total.
                nodes: self.nodes,
                duration,
                deferred_retries: self.deferred_retries,
            });
        }
    }

    fn flush_counters(&self, shared: &DepthShared) {
        shared.nodes.fetch_add(self.nodes, Ordering::Relaxed);
        shared
            .deferred_retries
            .fetch_add(self.deferred_retries, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::cooperation::SharedTable;
    use crate::tt::TtPolicy;

    fn worker(options: SearchOptions) -> Worker {
        Worker::new(
            Board::new(),
            Arc::new(TranspositionTable::new(1, TtPolicy::DepthFirst)),
            Arc::new(SharedTable),
            FinishFlag::new(),
            options,
            7,
        )
    }

    #[test]
    fn q_search_counts_one_node_per_leaf() {
        let mut worker = worker(SearchOptions::default().quiescence(false));
        let eval = worker.q_search(MIN_EVAL, MAX_EVAL);
        assert_eq!(eval, 0, "start position is balanced");
        assert_eq!(worker.nodes, 1);
    }

    #[test]
    fn nw_q_search_agrees_with_q_search_on_quiet_position() {
        let mut a = worker(SearchOptions::default());
        let mut b = worker(SearchOptions::default());
        let full = a.q_search(MIN_EVAL, MAX_EVAL);
        let null = b.nw_q_search(1);
        // Start position has no captures: both see the stand-pat.
        assert_eq!(full, 0);
        assert_eq!(null, 0);
    }

    #[test]
    fn root_publishes_result() {
        let shared = DepthShared::new();
        let mut w = Worker::new(
            Board::new(),
            Arc::new(TranspositionTable::new(1, TtPolicy::DepthFirst)),
            Arc::new(SharedTable),
            shared.finished.clone(),
            SearchOptions::default(),
            7,
        );
        w.root_max(MIN_EVAL, MAX_EVAL, 1, &shared);

        assert!(shared.finished.is_finished());
        let result = shared.result.lock().take().expect("root must publish");
        assert!(result.best_move.is_some());
        assert_eq!(result.depth, 1);
        assert_eq!(shared.nodes.load(Ordering::Relaxed), 20, "one leaf per root move");
    }
}
