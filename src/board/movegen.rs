//! Legal move generation.
//!
//! Pseudo-legal moves are generated from the mailbox and filtered through
//! make / in-check / unmake. Captures-only generation feeds the quiescence
//! search.

use super::moves::Move;
use super::types::{CastlingRights, Color, Piece, Square};
use super::{Board, BISHOP_DIRECTIONS, KING_OFFSETS, KNIGHT_OFFSETS, ROOK_DIRECTIONS};

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum GenKind {
    All,
    Captures,
}

impl Board {
    /// All legal moves for the side to move.
    #[must_use]
    pub fn generate_moves(&mut self) -> Vec<Move> {
        self.generate_legal(GenKind::All)
    }

    /// Legal captures only (en passant and capture-promotions included).
    #[must_use]
    pub fn generate_captures(&mut self) -> Vec<Move> {
        self.generate_legal(GenKind::Captures)
    }

    fn generate_legal(&mut self, kind: GenKind) -> Vec<Move> {
        let mover = self.side_to_move;
        let pseudo = self.generate_pseudo(kind);
        let mut legal = Vec::with_capacity(pseudo.len());
        for mv in pseudo {
            self.make(mv);
            if !self.in_check(mover) {
                legal.push(mv);
            }
            self.unmake(mv);
        }
        legal
    }

    fn generate_pseudo(&self, kind: GenKind) -> Vec<Move> {
        let us = self.side_to_move;
        let mut moves = Vec::with_capacity(64);
        for square in Square::all() {
            match self.piece_at(square) {
                Some((color, piece)) if color == us => match piece {
                    Piece::Pawn => self.pawn_moves(square, kind, &mut moves),
                    Piece::Knight => self.leaper_moves(square, &KNIGHT_OFFSETS, kind, &mut moves),
                    Piece::King => self.leaper_moves(square, &KING_OFFSETS, kind, &mut moves),
                    Piece::Bishop => {
                        self.slider_moves(square, &BISHOP_DIRECTIONS, kind, &mut moves);
                    }
                    Piece::Rook => self.slider_moves(square, &ROOK_DIRECTIONS, kind, &mut moves),
                    Piece::Queen => {
                        self.slider_moves(square, &BISHOP_DIRECTIONS, kind, &mut moves);
                        self.slider_moves(square, &ROOK_DIRECTIONS, kind, &mut moves);
                    }
                },
                _ => {}
            }
        }
        if kind == GenKind::All {
            self.castle_moves(&mut moves);
        }
        moves
    }

    fn pawn_moves(&self, from: Square, kind: GenKind, moves: &mut Vec<Move>) {
        let us = self.side_to_move;
        let (rank_delta, start_rank, promo_rank): (i8, u8, u8) = match us {
            Color::White => (1, 1, 7),
            Color::Black => (-1, 6, 0),
        };

        if kind == GenKind::All {
            if let Some(one) = from.offset(0, rank_delta) {
                if self.piece_at(one).is_none() {
                    if one.rank() == promo_rank {
                        for piece in [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight] {
                            moves.push(Move::promotion(from, one, piece));
                        }
                    } else {
                        moves.push(Move::quiet(from, one));
                        if from.rank() == start_rank {
                            if let Some(two) = one.offset(0, rank_delta) {
                                if self.piece_at(two).is_none() {
                                    moves.push(Move::double_pawn_push(from, two));
                                }
                            }
                        }
                    }
                }
            }
        }

        for file_delta in [-1, 1] {
            let Some(to) = from.offset(file_delta, rank_delta) else {
                continue;
            };
            match self.piece_at(to) {
                Some((color, _)) if color != us => {
                    if to.rank() == promo_rank {
                        for piece in [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight] {
                            moves.push(Move::promotion_capture(from, to, piece));
                        }
                    } else {
                        moves.push(Move::capture(from, to));
                    }
                }
                None if self.en_passant == Some(to) => {
                    moves.push(Move::en_passant(from, to));
                }
                _ => {}
            }
        }
    }

    fn leaper_moves(
        &self,
        from: Square,
        offsets: &[(i8, i8)],
        kind: GenKind,
        moves: &mut Vec<Move>,
    ) {
        let us = self.side_to_move;
        for &(file_delta, rank_delta) in offsets {
            let Some(to) = from.offset(file_delta, rank_delta) else {
                continue;
            };
            match self.piece_at(to) {
                None => {
                    if kind == GenKind::All {
                        moves.push(Move::quiet(from, to));
                    }
                }
                Some((color, _)) if color != us => moves.push(Move::capture(from, to)),
                _ => {}
            }
        }
    }

    fn slider_moves(
        &self,
        from: Square,
        directions: &[(i8, i8)],
        kind: GenKind,
        moves: &mut Vec<Move>,
    ) {
        let us = self.side_to_move;
        for &(file_delta, rank_delta) in directions {
            let mut square = from;
            while let Some(to) = square.offset(file_delta, rank_delta) {
                square = to;
                match self.piece_at(to) {
                    None => {
                        if kind == GenKind::All {
                            moves.push(Move::quiet(from, to));
                        }
                    }
                    Some((color, _)) => {
                        if color != us {
                            moves.push(Move::capture(from, to));
                        }
                        break;
                    }
                }
            }
        }
    }

    fn castle_moves(&self, moves: &mut Vec<Move>) {
        let us = self.side_to_move;
        let them = us.opponent();
        let rank = match us {
            Color::White => 0,
            Color::Black => 7,
        };
        let king_from = Square::new(4, rank);
        if self.piece_at(king_from) != Some((us, Piece::King)) {
            return;
        }

        if self.castling.has(CastlingRights::kingside(us)) {
            let f = Square::new(5, rank);
            let g = Square::new(6, rank);
            if self.piece_at(f).is_none()
                && self.piece_at(g).is_none()
                && self.piece_at(Square::new(7, rank)) == Some((us, Piece::Rook))
                && !self.square_attacked(king_from, them)
                && !self.square_attacked(f, them)
                && !self.square_attacked(g, them)
            {
                moves.push(Move::castle_kingside(king_from, g));
            }
        }

        if self.castling.has(CastlingRights::queenside(us)) {
            let d = Square::new(3, rank);
            let c = Square::new(2, rank);
            let b = Square::new(1, rank);
            if self.piece_at(d).is_none()
                && self.piece_at(c).is_none()
                && self.piece_at(b).is_none()
                && self.piece_at(Square::new(0, rank)) == Some((us, Piece::Rook))
                && !self.square_attacked(king_from, them)
                && !self.square_attacked(d, them)
                && !self.square_attacked(c, them)
            {
                moves.push(Move::castle_queenside(king_from, c));
            }
        }
    }

    /// Count leaf nodes of the legal move tree to `depth`. Movegen
    /// validation only.
    #[must_use]
    pub fn perft(&mut self, depth: u32) -> u64 {
        if depth == 0 {
            return 1;
        }
        let moves = self.generate_moves();
        if depth == 1 {
            return moves.len() as u64;
        }
        let mut nodes = 0;
        for mv in moves {
            self.make(mv);
            nodes += self.perft(depth - 1);
            self.unmake(mv);
        }
        nodes
    }
}
