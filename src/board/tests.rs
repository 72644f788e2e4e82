//! Board unit and property tests.

use proptest::prelude::*;
use rand::prelude::*;
use rand::Rng as _;

use super::{Board, Color, Piece, Square, START_FEN};

#[test]
fn start_position_basics() {
    let mut board = Board::new();
    assert_eq!(board.side_to_move(), Color::White);
    assert_eq!(board.to_fen(), START_FEN);
    assert_eq!(board.generate_moves().len(), 20);
    assert_eq!(board.generate_captures().len(), 0);
    assert!(!board.in_check(Color::White));
    assert_ne!(board.hash_key(), 0);
}

#[test]
fn fen_round_trip_known_positions() {
    let fens = [
        START_FEN,
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 3 17",
        "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    ];
    for fen in fens {
        let board = Board::from_fen(fen).unwrap();
        assert_eq!(board.to_fen(), fen, "round trip failed for {fen}");
        assert_eq!(board.hash, board.calculate_hash());
    }
}

#[test]
fn from_fen_rejects_garbage() {
    assert!(Board::from_fen("").is_err());
    assert!(Board::from_fen("8/8/8/8/8/8/8/8 w - - 0 1").is_err(), "no kings");
    assert!(Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1").is_err());
    assert!(Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQxq - 0 1").is_err());
    assert!(Board::from_fen("rnbqkbnr/pppppppp/8/9/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").is_err());
}

#[test]
fn check_detection() {
    let board = Board::from_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3")
        .unwrap();
    assert!(board.in_check(Color::White));
    assert!(!board.in_check(Color::Black));
}

#[test]
fn en_passant_capture_is_generated_and_reversible() {
    // White pawn on e5, black just played d7d5.
    let mut board =
        Board::from_fen("rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 3").unwrap();
    let moves = board.generate_moves();
    let ep = moves
        .iter()
        .copied()
        .find(|m| m.is_en_passant())
        .expect("en passant should be available");
    assert_eq!(ep.to_string(), "e5d6");

    let fen_before = board.to_fen();
    board.make(ep);
    assert_eq!(
        board.piece_at(Square::from_algebraic("d5").unwrap()),
        None,
        "captured pawn removed"
    );
    board.unmake(ep);
    assert_eq!(board.to_fen(), fen_before);
}

#[test]
fn castling_both_sides() {
    let mut board =
        Board::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
    let moves: Vec<String> = board.generate_moves().iter().map(|m| m.to_string()).collect();
    assert!(moves.contains(&"e1g1".to_string()), "white O-O");
    assert!(moves.contains(&"e1c1".to_string()), "white O-O-O");

    // Rook move forfeits the matching right.
    let rook_move = board
        .generate_moves()
        .into_iter()
        .find(|m| m.to_string() == "h1g1")
        .unwrap();
    board.make(rook_move);
    let reply = board
        .generate_moves()
        .into_iter()
        .find(|m| m.to_string() == "a7a6")
        .unwrap();
    board.make(reply);
    let moves: Vec<String> = board.generate_moves().iter().map(|m| m.to_string()).collect();
    assert!(!moves.contains(&"e1g1".to_string()), "kingside right gone");
    assert!(moves.contains(&"e1c1".to_string()), "queenside right kept");
}

#[test]
fn promotions_are_generated() {
    let mut board = Board::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
    let promotions: Vec<String> = board.generate_moves().iter().map(|m| m.to_string()).collect();
    for target in ["a7a8q", "a7a8r", "a7a8b", "a7a8n"] {
        assert!(promotions.contains(&target.to_string()));
    }

    let promo = board
        .generate_moves()
        .into_iter()
        .find(|m| m.promotion_piece() == Some(Piece::Queen))
        .unwrap();
    board.make(promo);
    assert_eq!(
        board.piece_at(Square::from_algebraic("a8").unwrap()),
        Some((Color::White, Piece::Queen))
    );
    board.unmake(promo);
    assert_eq!(
        board.piece_at(Square::from_algebraic("a7").unwrap()),
        Some((Color::White, Piece::Pawn))
    );
}

#[test]
fn pinned_piece_moves_are_illegal() {
    // The e-file knight is pinned against the king by the rook.
    let mut board = Board::from_fen("4r2k/8/8/8/8/8/4N3/4K3 w - - 0 1").unwrap();
    let moves = board.generate_moves();
    assert!(
        moves
            .iter()
            .all(|m| m.from() != Square::from_algebraic("e2").unwrap()),
        "pinned knight must not move"
    );
}

proptest! {
    /// make followed by unmake restores the position exactly.
    #[test]
    fn prop_make_unmake_restores_state(seed in any::<u64>(), num_moves in 1..=24usize) {
        let mut board = Board::new();
        let mut rng = StdRng::seed_from_u64(seed);

        let initial_fen = board.to_fen();
        let initial_hash = board.hash_key();

        let mut line = Vec::new();
        for _ in 0..num_moves {
            let moves = board.generate_moves();
            if moves.is_empty() {
                break;
            }
            let mv = moves[rng.gen_range(0..moves.len())];
            board.make(mv);
            line.push(mv);
        }
        while let Some(mv) = line.pop() {
            board.unmake(mv);
        }

        prop_assert_eq!(board.to_fen(), initial_fen);
        prop_assert_eq!(board.hash_key(), initial_hash);
    }

    /// The incremental hash always matches a full recomputation.
    #[test]
    fn prop_incremental_hash_consistency(seed in any::<u64>(), num_moves in 1..=24usize) {
        let mut board = Board::new();
        let mut rng = StdRng::seed_from_u64(seed);

        for _ in 0..num_moves {
            let moves = board.generate_moves();
            if moves.is_empty() {
                break;
            }
            let mv = moves[rng.gen_range(0..moves.len())];
            board.make(mv);
            prop_assert_eq!(board.hash, board.calculate_hash());
        }
    }

    /// FEN emit/parse round-trips through arbitrary reachable positions.
    #[test]
    fn prop_fen_round_trip(seed in any::<u64>(), num_moves in 1..=24usize) {
        let mut board = Board::new();
        let mut rng = StdRng::seed_from_u64(seed);

        for _ in 0..num_moves {
            let moves = board.generate_moves();
            if moves.is_empty() {
                break;
            }
            let mv = moves[rng.gen_range(0..moves.len())];
            board.make(mv);
        }

        let fen = board.to_fen();
        let reparsed = Board::from_fen(&fen).unwrap();
        prop_assert_eq!(reparsed.to_fen(), fen);
        prop_assert_eq!(reparsed.hash_key(), board.hash_key());
    }
}
