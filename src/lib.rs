//! hivemind: parallel chess search over a shared transposition table.
//!
//! The crate implements three ways for search workers to cooperate:
//! lazy SMP (shared table, randomized move order), ABDADA ("being
//! searched" counters in the table) and a simplified ABDADA that keeps
//! those markers in a small separate cache; a sequential PVS baseline
//! uses the same worker body. See [`search::ParallelSearcher`] for the
//! entry point.

pub mod board;
pub mod constants;
pub mod defer_cache;
pub mod search;
pub mod sync;
pub mod tt;
pub(crate) mod zobrist;

pub use board::{Board, Color, FenError, Move, Piece, Square};
pub use defer_cache::DeferCache;
pub use search::{ParallelSearcher, SearchMode, SearchOptions, SearchResult};
pub use tt::{BoundType, Probe, TranspositionTable, TtInfo, TtPolicy, TtStats};
