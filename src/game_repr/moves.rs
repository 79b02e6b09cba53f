// Move helpers and move lists
//
// Predicates over `chess::ChessMove` that the search needs but the `chess`
// crate does not provide directly (tactical/conversion tests, check
// detection, move indices for the ordering tables, a compact 16-bit
// encoding for the transposition table), plus the scored move list used
// by move ordering.

use chess::{Board, ChessMove, Color, MoveGen, Piece, Square, ALL_SQUARES, EMPTY};
use smallvec::SmallVec;

use super::exchange::move_is_win;
use super::position::Pos;

/// Number of distinct `side/piece/to` move indices.
pub const MOVE_INDEX_SIZE: usize = 1 << 10;

pub type MoveIndex = usize;

/// A move together with its ordering score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredMove {
    pub mv: ChessMove,
    pub score: i32,
}

/// Move list with scores; stays on the stack for typical positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveList {
    moves: SmallVec<[ScoredMove; 64]>,
}

impl MoveList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mv: ChessMove) {
        self.moves.push(ScoredMove { mv, score: 0 });
    }

    pub fn clear(&mut self) {
        self.moves.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> ChessMove {
        self.moves[i].mv
    }

    #[inline]
    pub fn score(&self, i: usize) -> i32 {
        self.moves[i].score
    }

    #[inline]
    pub fn set_score(&mut self, i: usize, score: i32) {
        self.moves[i].score = score;
    }

    /// Stable sort, best score first.
    pub fn sort(&mut self) {
        self.moves.sort_by(|a, b| b.score.cmp(&a.score));
    }

    /// Move entry `i` to the front, keeping the relative order of the rest.
    pub fn move_to_front(&mut self, i: usize) {
        self.moves[..=i].rotate_right(1);
    }

    pub fn find(&self, mv: ChessMove) -> Option<usize> {
        self.moves.iter().position(|sm| sm.mv == mv)
    }

    pub fn contains(&self, mv: ChessMove) -> bool {
        self.find(mv).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = ChessMove> + '_ {
        self.moves.iter().map(|sm| sm.mv)
    }
}

impl FromIterator<ChessMove> for MoveList {
    fn from_iter<I: IntoIterator<Item = ChessMove>>(iter: I) -> Self {
        let mut list = MoveList::new();
        for mv in iter {
            list.push(mv);
        }
        list
    }
}

/// Piece standing on the source square of `mv`.
#[inline]
pub fn piece(mv: ChessMove, board: &Board) -> Piece {
    match board.piece_on(mv.get_source()) {
        Some(piece) => piece,
        None => unreachable!("no piece on {} for move {mv} in {board}", mv.get_source()),
    }
}

pub fn is_en_passant(mv: ChessMove, board: &Board) -> bool {
    piece(mv, board) == Piece::Pawn
        && mv.get_source().get_file() != mv.get_dest().get_file()
        && board.piece_on(mv.get_dest()).is_none()
}

pub fn is_castling(mv: ChessMove, board: &Board) -> bool {
    piece(mv, board) == Piece::King
        && mv.get_source().get_file().to_index().abs_diff(mv.get_dest().get_file().to_index()) == 2
}

pub fn is_capture(mv: ChessMove, board: &Board) -> bool {
    board.piece_on(mv.get_dest()).is_some() || is_en_passant(mv, board)
}

/// Captured piece, `Pawn` for en passant.
pub fn captured(mv: ChessMove, board: &Board) -> Option<Piece> {
    match board.piece_on(mv.get_dest()) {
        Some(piece) => Some(piece),
        None if is_en_passant(mv, board) => Some(Piece::Pawn),
        None => None,
    }
}

#[inline]
pub fn is_promotion(mv: ChessMove) -> bool {
    mv.get_promotion().is_some()
}

pub fn is_underpromotion(mv: ChessMove) -> bool {
    matches!(mv.get_promotion(), Some(Piece::Knight | Piece::Bishop | Piece::Rook))
}

pub fn is_tactical(mv: ChessMove, board: &Board) -> bool {
    is_capture(mv, board) || is_promotion(mv)
}

/// Moves that reset the fifty-move counter.
pub fn is_conversion(mv: ChessMove, board: &Board) -> bool {
    piece(mv, board) == Piece::Pawn || is_capture(mv, board)
}

pub fn is_check(mv: ChessMove, board: &Board) -> bool {
    *board.make_move_new(mv).checkers() != EMPTY
}

/// Winning capture on the square where the opponent just captured.
pub fn is_recapture(mv: ChessMove, pos: &Pos) -> bool {
    pos.cap_sq() == Some(mv.get_dest())
        && is_tactical(mv, pos.board())
        && move_is_win(mv, pos.board())
}

#[inline]
fn make_index(side: Color, piece: Piece, to: Square) -> MoveIndex {
    (side.to_index() << 9) | (piece.to_index() << 6) | to.to_index()
}

pub fn index(mv: ChessMove, board: &Board) -> MoveIndex {
    make_index(board.side_to_move(), piece(mv, board), mv.get_dest())
}

/// Index of the opponent's last move, `None` at the root of a game or
/// after a null move.
pub fn index_last_move(pos: &Pos) -> Option<MoveIndex> {
    let mv = pos.last_move()?;
    let piece = pos.board().piece_on(mv.get_dest())?;

    Some(make_index(!pos.turn(), piece, mv.get_dest()))
}

/// 16-bit move code: `promotion << 12 | from << 6 | to`, 0 for no move.
pub fn encode(mv: Option<ChessMove>) -> u16 {
    let Some(mv) = mv else { return 0 };

    let promotion: u16 = match mv.get_promotion() {
        None => 0,
        Some(Piece::Knight) => 1,
        Some(Piece::Bishop) => 2,
        Some(Piece::Rook) => 3,
        Some(_) => 4,
    };

    (promotion << 12) | ((mv.get_source().to_index() as u16) << 6) | mv.get_dest().to_index() as u16
}

pub fn decode(code: u16) -> Option<ChessMove> {
    if code == 0 {
        return None;
    }

    let from = ALL_SQUARES[usize::from((code >> 6) & 0o77)];
    let to = ALL_SQUARES[usize::from(code & 0o77)];
    let promotion = match code >> 12 {
        1 => Some(Piece::Knight),
        2 => Some(Piece::Bishop),
        3 => Some(Piece::Rook),
        4 => Some(Piece::Queen),
        _ => None,
    };

    Some(ChessMove::new(from, to, promotion))
}

pub fn gen_legals(board: &Board) -> MoveList {
    MoveGen::new_legal(board).collect()
}

/// Legal captures and promotions. In check this is the set of evasions
/// that capture or promote.
pub fn gen_tacticals(board: &Board) -> MoveList {
    MoveGen::new_legal(board)
        .filter(|&mv| is_tactical(mv, board))
        .collect()
}

/// Append the legal quiet moves that give check.
pub fn add_checks(list: &mut MoveList, board: &Board) {
    for mv in MoveGen::new_legal(board) {
        if !is_tactical(mv, board) && is_check(mv, board) {
            list.push(mv);
        }
    }
}

/// Captures and promotions the opponent could play if it were their turn,
/// captures first. Empty when the side to move is in check.
pub fn gen_opponent_threats(board: &Board) -> (MoveList, MoveList) {
    let Some(flipped) = board.null_move() else {
        return (MoveList::new(), MoveList::new());
    };

    let mut captures = MoveList::new();
    let mut promotions = MoveList::new();

    for mv in MoveGen::new_legal(&flipped) {
        if is_capture(mv, &flipped) {
            captures.push(mv);
        } else if is_promotion(mv) {
            promotions.push(mv);
        }
    }

    (captures, promotions)
}
