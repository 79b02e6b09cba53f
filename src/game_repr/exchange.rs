// Static exchange evaluation
//
// Estimates the material outcome of the capture sequence a move starts on
// its destination square. Both sides always recapture with their least
// valuable attacker and may stop at any point (stand pat). Pins are
// ignored; x-ray attackers appear once the pieces in front of them have
// been used, because sliding attacks are recomputed against the shrinking
// occupancy.

use chess::{
    get_bishop_moves, get_king_moves, get_knight_moves, get_pawn_attacks, get_rook_moves, BitBoard,
    Board, ChessMove, Color, Piece, Square, ALL_PIECES, EMPTY,
};

use super::moves::{captured, is_underpromotion, piece};

/// Exchange values in centipawns.
pub fn piece_mat(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => 100,
        Piece::Knight => 325,
        Piece::Bishop => 325,
        Piece::Rook => 500,
        Piece::Queen => 1000,
        Piece::King => 10000,
    }
}

/// Neither side loses material on the exchange.
pub fn move_is_safe(mv: ChessMove, board: &Board) -> bool {
    if is_underpromotion(mv) {
        return false;
    }

    let pc = piece(mv, board);

    if pc == Piece::King {
        return true;
    }

    if let Some(cp) = captured(mv, board) {
        if piece_mat(cp) >= piece_mat(pc) {
            return true;
        }
    }

    see(mv, board) >= 0
}

/// The exchange strictly gains material.
pub fn move_is_win(mv: ChessMove, board: &Board) -> bool {
    if is_underpromotion(mv) {
        return false;
    }

    let pc = piece(mv, board);

    if pc == Piece::King {
        return true;
    }

    if let Some(cp) = captured(mv, board) {
        if piece_mat(cp) > piece_mat(pc) {
            return true;
        }
    }

    see(mv, board) > 0
}

/// Signed material delta of the exchange started by `mv`.
pub fn see(mv: ChessMove, board: &Board) -> i32 {
    let from = mv.get_source();
    let to = mv.get_dest();

    let mut pc = piece(mv, board);
    let side = board.side_to_move();

    let mut sc = 0;

    if let Some(cp) = captured(mv, board) {
        sc += piece_mat(cp);
    }

    if let Some(prom) = mv.get_promotion() {
        pc = prom;
        sc += piece_mat(prom) - piece_mat(Piece::Pawn);
    }

    let pieces = *board.combined() & !BitBoard::from_square(from);
    sc - see_rec(board, !side, to, pieces, pc)
}

/// Optimistic gain of `mv`: the capture plus the promotion bonus.
pub fn see_max(mv: ChessMove, board: &Board) -> i32 {
    let mut sc = 0;

    if let Some(cp) = captured(mv, board) {
        sc += piece_mat(cp);
    }

    if let Some(prom) = mv.get_promotion() {
        sc += piece_mat(prom) - piece_mat(Piece::Pawn);
    }

    sc
}

fn see_rec(board: &Board, side: Color, to: Square, pieces: BitBoard, cp: Piece) -> i32 {
    let mut bs = 0; // stand pat

    if let Some(from) = pick_lva(board, side, to, pieces) {
        let pc = piece_on(board, from);

        let mut sc = piece_mat(cp);
        if cp != Piece::King {
            sc -= see_rec(board, !side, to, pieces & !BitBoard::from_square(from), pc);
        }

        bs = bs.max(sc);
    }

    debug_assert!(bs >= 0);
    bs
}

fn piece_on(board: &Board, sq: Square) -> Piece {
    match board.piece_on(sq) {
        Some(piece) => piece,
        None => unreachable!("attacker square {sq} is empty in {board}"),
    }
}

/// Least valuable piece of `side` among `pieces` that attacks `to`.
fn pick_lva(board: &Board, side: Color, to: Square, pieces: BitBoard) -> Option<Square> {
    let own = *board.color_combined(side) & pieces;

    for pc in ALL_PIECES {
        let froms = *board.pieces(pc) & own & attacks_to(pc, side, to, pieces);
        if froms != EMPTY {
            return froms.into_iter().next();
        }
    }

    None
}

/// Squares from which a `side` piece of type `pc` would attack `to`.
fn attacks_to(pc: Piece, side: Color, to: Square, pieces: BitBoard) -> BitBoard {
    match pc {
        Piece::Pawn => get_pawn_attacks(to, !side, !EMPTY),
        Piece::Knight => get_knight_moves(to),
        Piece::Bishop => get_bishop_moves(to, pieces),
        Piece::Rook => get_rook_moves(to, pieces),
        Piece::Queen => get_bishop_moves(to, pieces) | get_rook_moves(to, pieces),
        Piece::King => get_king_moves(to),
    }
}
