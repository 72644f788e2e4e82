//! Engine-wide constants shared by the search and the transposition table.

/// Evaluation score type. All scores are from the side-to-move's perspective.
pub type Eval = i16;

/// Lower bound for real evaluations. Kept above `i16::MIN` so that negating
/// a score in the negamax recursion can never overflow.
pub const MIN_EVAL: Eval = -30000;

/// Upper bound for real evaluations.
pub const MAX_EVAL: Eval = 30000;

/// Sentinel returned by a child search that deferred to a peer instead of
/// searching. Never stored in the table, never negated.
pub const ON_EVALUATION: Eval = i16::MIN;

/// Minimum remaining depth at which workers bother marking nodes as
/// "currently searched". Below this, duplicated work is cheaper than the
/// coordination.
pub const DEFER_DEPTH: u8 = 3;

/// Slots per transposition-table bucket.
pub const ENTRIES_PER_BUCKET: usize = 4;

/// Number of slots in the deferred-position cache. Must be a power of two.
pub const DEFER_CACHE_SLOTS: usize = 32768;

/// Concurrently marked positions a single deferred-cache slot can hold.
pub const DEFER_SLOT_WIDTH: usize = 3;
