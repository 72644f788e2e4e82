//! Chess board representation and game logic.
//!
//! Mailbox board with incremental Zobrist hashing and incremental
//! piece-square evaluation. Supports full chess rules including castling,
//! en passant, and promotions. Each search worker owns a private clone;
//! nothing in here is shared between threads.

mod eval;
mod fen;
mod make_unmake;
mod movegen;
mod moves;
mod types;

#[cfg(test)]
mod tests;

pub use fen::{FenError, START_FEN};
pub use moves::Move;
pub use types::{CastlingRights, Color, Piece, Square};

use crate::zobrist::{ZERO_KEY_SUBSTITUTE, ZOBRIST};

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_OFFSETS: [(i8, i8); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ROOK_DIRECTIONS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// A chess position with the bookkeeping needed for search: incremental
/// hash, incremental evaluation terms, and an undo stack for unmake.
#[derive(Clone)]
pub struct Board {
    pub(crate) squares: [Option<(Color, Piece)>; 64],
    pub(crate) side_to_move: Color,
    pub(crate) castling: CastlingRights,
    pub(crate) en_passant: Option<Square>,
    pub(crate) halfmove_clock: u16,
    pub(crate) fullmove_number: u16,
    pub(crate) hash: u64,
    pub(crate) kings: [Square; 2],
    pub(crate) mg: i32,
    pub(crate) eg: i32,
    pub(crate) phase: i32,
    undo_stack: Vec<make_unmake::Unmake>,
}

impl Board {
    /// The standard starting position.
    #[must_use]
    pub fn new() -> Board {
        Board::from_fen(START_FEN).expect("start position FEN is valid")
    }

    #[inline]
    #[must_use]
    pub fn piece_at(&self, square: Square) -> Option<(Color, Piece)> {
        self.squares[square.index()]
    }

    #[inline]
    #[must_use]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    #[must_use]
    pub fn king_square(&self, color: Color) -> Square {
        self.kings[color.index()]
    }

    /// The Zobrist key of this position. Key 0 is reserved for empty
    /// transposition-table slots, so the (astronomically unlikely) zero
    /// hash is remapped to a fixed substitute.
    #[inline]
    #[must_use]
    pub fn hash_key(&self) -> u64 {
        if self.hash == 0 {
            ZERO_KEY_SUBSTITUTE
        } else {
            self.hash
        }
    }

    /// Is `square` attacked by any piece of `by`?
    #[must_use]
    pub fn square_attacked(&self, square: Square, by: Color) -> bool {
        // A pawn of `by` attacks from one rank toward its own side.
        let pawn_rank_delta: i8 = match by {
            Color::White => -1,
            Color::Black => 1,
        };
        for file_delta in [-1, 1] {
            if let Some(from) = square.offset(file_delta, pawn_rank_delta) {
                if self.piece_at(from) == Some((by, Piece::Pawn)) {
                    return true;
                }
            }
        }

        for (file_delta, rank_delta) in KNIGHT_OFFSETS {
            if let Some(from) = square.offset(file_delta, rank_delta) {
                if self.piece_at(from) == Some((by, Piece::Knight)) {
                    return true;
                }
            }
        }

        for (file_delta, rank_delta) in KING_OFFSETS {
            if let Some(from) = square.offset(file_delta, rank_delta) {
                if self.piece_at(from) == Some((by, Piece::King)) {
                    return true;
                }
            }
        }

        for direction in BISHOP_DIRECTIONS {
            if self.ray_hits_slider(square, direction, by, Piece::Bishop) {
                return true;
            }
        }
        for direction in ROOK_DIRECTIONS {
            if self.ray_hits_slider(square, direction, by, Piece::Rook) {
                return true;
            }
        }

        false
    }

    /// Walk a ray from `from`; true if the first occupied square holds a
    /// `by`-colored `slider` or queen.
    fn ray_hits_slider(
        &self,
        from: Square,
        (file_delta, rank_delta): (i8, i8),
        by: Color,
        slider: Piece,
    ) -> bool {
        let mut square = from;
        while let Some(next) = square.offset(file_delta, rank_delta) {
            square = next;
            if let Some((color, piece)) = self.piece_at(square) {
                return color == by && (piece == slider || piece == Piece::Queen);
            }
        }
        false
    }

    #[inline]
    #[must_use]
    pub fn in_check(&self, color: Color) -> bool {
        self.square_attacked(self.king_square(color), color.opponent())
    }

    /// Put a piece on an empty square, updating hash, evaluation terms and
    /// king bookkeeping.
    pub(crate) fn place_piece(&mut self, color: Color, piece: Piece, square: Square) {
        debug_assert!(self.squares[square.index()].is_none());
        self.squares[square.index()] = Some((color, piece));
        self.hash ^= ZOBRIST.piece(color, piece, square);
        let (mg, eg) = eval::piece_square(color, piece, square);
        self.mg += mg;
        self.eg += eg;
        self.phase += eval::PHASE_INFLUENCE[piece.index()];
        if piece == Piece::King {
            self.kings[color.index()] = square;
        }
    }

    /// Inverse of [`Board::place_piece`].
    pub(crate) fn remove_piece(&mut self, color: Color, piece: Piece, square: Square) {
        debug_assert_eq!(self.squares[square.index()], Some((color, piece)));
        self.squares[square.index()] = None;
        self.hash ^= ZOBRIST.piece(color, piece, square);
        let (mg, eg) = eval::piece_square(color, piece, square);
        self.mg -= mg;
        self.eg -= eg;
        self.phase -= eval::PHASE_INFLUENCE[piece.index()];
    }

    /// Full-board hash recomputation; the incremental hash must always
    /// agree with this.
    #[must_use]
    pub fn calculate_hash(&self) -> u64 {
        let mut hash = 0;
        for square in Square::all() {
            if let Some((color, piece)) = self.piece_at(square) {
                hash ^= ZOBRIST.piece(color, piece, square);
            }
        }
        if self.side_to_move == Color::Black {
            hash ^= ZOBRIST.black_to_move_key;
        }
        hash ^= ZOBRIST.castling(self.castling.bits());
        if let Some(ep) = self.en_passant {
            hash ^= ZOBRIST.en_passant_keys[ep.file() as usize];
        }
        hash
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::new()
    }
}
