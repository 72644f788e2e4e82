//! Parallel game-tree search over a shared transposition table.
//!
//! Four cooperation strategies share one principal-variation-search
//! worker body:
//!
//! - [`SearchMode::Sequential`]: single-threaded PVS baseline.
//! - [`SearchMode::LazySmp`]: identical workers racing the same tree with
//!   randomized move ordering; the shared table is the only coupling.
//! - [`SearchMode::Abdada`]: workers record "being searched" counters in
//!   the table and defer contested subtrees.
//! - [`SearchMode::SimplifiedAbdada`]: same idea, but the markers live in
//!   a small separate cache instead of the table.

mod cooperation;
mod driver;
mod worker;

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use parking_lot::Mutex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::board::Move;
use crate::constants::Eval;
use crate::sync::FinishFlag;

pub use driver::ParallelSearcher;

/// Which cooperation strategy the workers use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SearchMode {
    /// One worker, no coordination.
    Sequential,
    /// Shared table only; diversification through shuffled move order.
    LazySmp,
    /// "Being searched" counters inside the transposition table.
    Abdada,
    /// "Being searched" markers in the separate deferred-position cache.
    SimplifiedAbdada,
}

/// Search feature switches. The original engine fixed these at compile
/// time; here they are per-searcher configuration.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SearchOptions {
    /// Run capture-only quiescence at the leaves.
    pub quiescence: bool,
    /// Principal-variation search with null-window scouts; when off, every
    /// node is searched with the plain full-window negamax.
    pub pv_search: bool,
    /// Shuffle moves before TT-move hoisting.
    pub shuffle: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            quiescence: true,
            pv_search: true,
            shuffle: true,
        }
    }
}

impl SearchOptions {
    #[must_use]
    pub fn quiescence(mut self, on: bool) -> Self {
        self.quiescence = on;
        self
    }

    #[must_use]
    pub fn pv_search(mut self, on: bool) -> Self {
        self.pv_search = on;
        self
    }

    #[must_use]
    pub fn shuffle(mut self, on: bool) -> Self {
        self.shuffle = on;
        self
    }
}

/// Outcome of one searched depth, published by the first finisher.
#[derive(Clone, Copy, Debug)]
pub struct SearchResult {
    pub best_move: Option<Move>,
    pub eval: Eval,
    pub depth: u8,
    /// Leaf evaluations, summed over all workers of the depth.
    pub nodes: u64,
    pub duration: Duration,
    /// Deferred moves that were re-searched in a second pass (ABDADA
    /// variants only; 0 otherwise).
    pub deferred_retries: u64,
}

impl Default for SearchResult {
    fn default() -> Self {
        SearchResult {
            best_move: None,
            eval: 0,
            depth: 0,
            nodes: 0,
            duration: Duration::ZERO,
            deferred_retries: 0,
        }
    }
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mv = match self.best_move {
            Some(mv) => mv.to_string(),
            None => "0000".to_string(),
        };
        let secs = self.duration.as_secs_f64();
        let nps = if secs > 0.0 {
            (self.nodes as f64 / secs) as u64
        } else {
            0
        };
        write!(
            f,
            "depth {}: {} eval {} nodes {} time {:.3}s nps {}",
            self.depth, mv, self.eval, self.nodes, secs, nps
        )
    }
}

/// State shared by the workers of one iterative-deepening depth.
pub(crate) struct DepthShared {
    pub(crate) finished: FinishFlag,
    pub(crate) result: Mutex<Option<SearchResult>>,
    pub(crate) nodes: AtomicU64,
    pub(crate) deferred_retries: AtomicU64,
}

impl DepthShared {
    pub(crate) fn new() -> DepthShared {
        DepthShared {
            finished: FinishFlag::new(),
            result: Mutex::new(None),
            nodes: AtomicU64::new(0),
            deferred_retries: AtomicU64::new(0),
        }
    }
}
