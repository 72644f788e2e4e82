//! Iterative-deepening driver.
//!
//! For each depth, spawns `T` identical workers on private board clones,
//! joins them, and keeps the result published by the depth's first
//! finisher. The transposition table is shared across workers and persists
//! across depths; that persistence is what makes iterative deepening pay.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info};

use crate::board::Board;
use crate::constants::{MAX_EVAL, MIN_EVAL};
use crate::defer_cache::DeferCache;
use crate::tt::TranspositionTable;

use super::cooperation::{CachedMarkers, Cooperation, SharedTable, TtMarkers};
use super::worker::Worker;
use super::{DepthShared, SearchMode, SearchOptions, SearchResult};

/// Worker thread stack size; the search recursion runs one frame per ply
/// with move lists on the stack.
const SEARCH_STACK_SIZE: usize = 32 * 1024 * 1024;

/// The engine-facing search driver.
pub struct ParallelSearcher {
    num_threads: usize,
    board: Board,
    tt: Arc<TranspositionTable>,
    mode: SearchMode,
    options: SearchOptions,
    defer_cache: Arc<DeferCache>,
    seed: u64,
}

impl ParallelSearcher {
    /// A searcher over `board` with `num_threads` workers sharing `tt`.
    /// Defaults to lazy SMP with all features on; adjust with the builder
    /// setters.
    #[must_use]
    pub fn new(num_threads: usize, board: Board, tt: Arc<TranspositionTable>) -> ParallelSearcher {
        ParallelSearcher {
            num_threads: num_threads.max(1),
            board,
            tt,
            mode: SearchMode::LazySmp,
            options: SearchOptions::default(),
            defer_cache: Arc::new(DeferCache::new()),
            seed: 0,
        }
    }

    #[must_use]
    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// Base seed for the workers' shuffle PRNGs. Fixed by default so runs
    /// are reproducible; vary it between benchmark iterations.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The deferred-position cache (Simplified-ABDADA markers).
    #[must_use]
    pub fn defer_cache(&self) -> &DeferCache {
        &self.defer_cache
    }

    fn effective_threads(&self) -> usize {
        match self.mode {
            SearchMode::Sequential => 1,
            _ => self.num_threads,
        }
    }

    fn cooperation(&self) -> Arc<dyn Cooperation> {
        match self.mode {
            SearchMode::Sequential | SearchMode::LazySmp => Arc::new(SharedTable),
            SearchMode::Abdada => Arc::new(TtMarkers),
            SearchMode::SimplifiedAbdada => Arc::new(CachedMarkers {
                cache: Arc::clone(&self.defer_cache),
            }),
        }
    }

    /// Search depths 1 to `up_to_depth` and return the deepest published
    /// result. Call [`TranspositionTable::clear`] between unrelated
    /// searches, not between depths.
    #[must_use]
    pub fn parallel_search(&self, up_to_depth: u8) -> SearchResult {
        let coop = self.cooperation();
        let num_threads = self.effective_threads();
        let mut last = SearchResult::default();

        for depth in 1..=up_to_depth {
            let shared = Arc::new(DepthShared::new());
            let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(num_threads);

            for worker_id in 0..num_threads {
                let shared = Arc::clone(&shared);
                let mut worker = Worker::new(
                    self.board.clone(),
                    Arc::clone(&self.tt),
                    Arc::clone(&coop),
                    shared.finished.clone(),
                    self.options,
                    worker_seed(self.seed, worker_id as u64, depth),
                );
                let handle = thread::Builder::new()
                    .name(format!("search-{worker_id}"))
                    .stack_size(SEARCH_STACK_SIZE)
                    .spawn(move || worker.root_max(MIN_EVAL, MAX_EVAL, depth, &shared))
                    .expect("failed to spawn search worker");
                handles.push(handle);
            }
            for handle in handles {
                let _ = handle.join();
            }

            let taken = shared.result.lock().take();
            if let Some(mut result) = taken {
                result.nodes = shared.nodes.load(Ordering::Relaxed);
                result.deferred_retries = shared.deferred_retries.load(Ordering::Relaxed);
                info!("{result}");
                debug!("{}", self.tt.stats());
                last = result;
            }
        }
        last
    }
}

/// Decorrelate worker PRNGs across workers and depths (splitmix64 mix).
fn worker_seed(seed: u64, worker_id: u64, depth: u8) -> u64 {
    let mut x = seed
        ^ worker_id.wrapping_mul(0x9e37_79b9_7f4a_7c15)
        ^ (u64::from(depth) << 32);
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^= x >> 31;
    x
}
