// Static evaluation
//
// Tapered material, piece-square tables, pawn structure, mobility and rook
// placement. Scores are centipawns from the side to move, clamped to the
// eval range so they never look like mate scores.

use chess::{
    get_adjacent_files, get_bishop_moves, get_file, get_king_moves, get_knight_moves, get_rank,
    get_rook_moves, BitBoard, Board, Color, Piece, Rank, Square, ALL_PIECES, EMPTY,
};

use super::piece_square_tables::pst;
use super::score::{clamp, EVAL_INF};
use crate::game_repr::Pos;

const PAWN_VALUE: i32 = 100;
const KNIGHT_VALUE: i32 = 300;
const BISHOP_VALUE: i32 = 320;
const ROOK_VALUE: i32 = 500;
const QUEEN_VALUE: i32 = 900;

// Phase weights; the full phase is reached with all pieces on the board
const KNIGHT_PHASE: i32 = 1;
const BISHOP_PHASE: i32 = 1;
const ROOK_PHASE: i32 = 2;
const QUEEN_PHASE: i32 = 4;
const TOTAL_PHASE: i32 = KNIGHT_PHASE * 4 + BISHOP_PHASE * 4 + ROOK_PHASE * 4 + QUEEN_PHASE * 2;

/// Middlegame and endgame halves of a term.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaperedScore {
    pub mg: i32,
    pub eg: i32,
}

impl TaperedScore {
    pub const fn new(mg: i32, eg: i32) -> Self {
        Self { mg, eg }
    }

    /// Blend by `phase`, 256 in the opening down to 0 in a bare ending.
    pub fn interpolate(&self, phase: i32) -> i32 {
        ((self.mg * phase) + (self.eg * (256 - phase))) / 256
    }

    pub fn add(&mut self, other: TaperedScore) {
        self.mg += other.mg;
        self.eg += other.eg;
    }

    pub fn sub(&mut self, other: TaperedScore) {
        self.mg -= other.mg;
        self.eg -= other.eg;
    }

    fn scaled(self, n: i32) -> TaperedScore {
        TaperedScore::new(self.mg * n, self.eg * n)
    }
}

// Pawn structure
const DOUBLED_PAWN_PENALTY: TaperedScore = TaperedScore::new(15, 20);
const ISOLATED_PAWN_PENALTY: TaperedScore = TaperedScore::new(20, 25);
const PASSED_PAWN_BONUS: TaperedScore = TaperedScore::new(40, 70);
const PAWN_SHIELD_BONUS: TaperedScore = TaperedScore::new(15, 5);

// Mobility bonuses per reachable square
const KNIGHT_MOBILITY: TaperedScore = TaperedScore::new(4, 4);
const BISHOP_MOBILITY: TaperedScore = TaperedScore::new(5, 5);
const ROOK_MOBILITY: TaperedScore = TaperedScore::new(2, 4);
const QUEEN_MOBILITY: TaperedScore = TaperedScore::new(1, 2);
const KING_MOBILITY: TaperedScore = TaperedScore::new(0, 3);

// Rooks and bishops
const BISHOP_PAIR_BONUS: TaperedScore = TaperedScore::new(40, 50);
const ROOK_ON_OPEN_FILE: TaperedScore = TaperedScore::new(25, 25);
const ROOK_ON_SEMI_OPEN_FILE: TaperedScore = TaperedScore::new(12, 12);
const ROOK_ON_SEVENTH: TaperedScore = TaperedScore::new(18, 25);
const CONNECTED_ROOKS: TaperedScore = TaperedScore::new(15, 15);

fn piece_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => PAWN_VALUE,
        Piece::Knight => KNIGHT_VALUE,
        Piece::Bishop => BISHOP_VALUE,
        Piece::Rook => ROOK_VALUE,
        Piece::Queen => QUEEN_VALUE,
        Piece::King => 0,
    }
}

#[inline]
fn pieces_of(board: &Board, piece: Piece, color: Color) -> BitBoard {
    *board.pieces(piece) & *board.color_combined(color)
}

/// Game phase from 0 (endgame) to 256 (opening)
fn game_phase(pos: &Pos) -> i32 {
    let force = (pos.force(Color::White) + pos.force(Color::Black)) as i32;
    ((force * 256 + TOTAL_PHASE / 2) / TOTAL_PHASE).clamp(0, 256)
}

/// Material plus piece-square tables
fn evaluate_material_and_position(board: &Board, color: Color) -> TaperedScore {
    let mut score = TaperedScore::default();

    for piece in ALL_PIECES {
        for sq in pieces_of(board, piece, color) {
            let value = piece_value(piece);
            score.add(TaperedScore::new(value, value));
            score.add(pst(piece, sq, color));
        }
    }

    score
}

/// Squares strictly in front of `sq` from `color`'s point of view.
fn front_ranks(sq: Square, color: Color) -> BitBoard {
    let rank = sq.get_rank().to_index();

    (0..8)
        .filter(|&r| match color {
            Color::White => r > rank,
            Color::Black => r < rank,
        })
        .fold(EMPTY, |acc, r| acc | get_rank(Rank::from_index(r)))
}

/// Pawn structure (doubled, isolated, passed pawns)
fn evaluate_pawn_structure(board: &Board, color: Color) -> TaperedScore {
    let mut score = TaperedScore::default();

    let own = pieces_of(board, Piece::Pawn, color);
    let enemy = pieces_of(board, Piece::Pawn, !color);

    for sq in own {
        let file = sq.get_file();

        if (own & get_file(file)).popcnt() > 1 {
            score.sub(DOUBLED_PAWN_PENALTY);
        }

        if own & get_adjacent_files(file) == EMPTY {
            score.sub(ISOLATED_PAWN_PENALTY);
        }

        let span = (get_file(file) | get_adjacent_files(file)) & front_ranks(sq, color);
        if enemy & span == EMPTY {
            score.add(PASSED_PAWN_BONUS);
        }
    }

    score
}

/// Pawn shield: own pawns on the three files around the king, one or two
/// ranks in front of it
fn evaluate_king_safety(board: &Board, color: Color) -> TaperedScore {
    let king = board.king_square(color);
    let file = king.get_file();
    let rank = king.get_rank().to_index() as i32;

    let ahead = match color {
        Color::White => [rank + 1, rank + 2],
        Color::Black => [rank - 1, rank - 2],
    };

    let zone = ahead
        .into_iter()
        .filter(|r| (0..8).contains(r))
        .fold(EMPTY, |acc, r| acc | get_rank(Rank::from_index(r as usize)));

    let shield = pieces_of(board, Piece::Pawn, color) & zone & (get_file(file) | get_adjacent_files(file));

    PAWN_SHIELD_BONUS.scaled(shield.popcnt() as i32)
}

/// Reachable squares not occupied by own pieces
fn evaluate_mobility(board: &Board, color: Color) -> TaperedScore {
    let mut mobility = TaperedScore::default();
    let occupied = *board.combined();
    let targets = !*board.color_combined(color);

    for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen, Piece::King] {
        for sq in pieces_of(board, piece, color) {
            let (attacks, weight) = match piece {
                Piece::Knight => (get_knight_moves(sq), KNIGHT_MOBILITY),
                Piece::Bishop => (get_bishop_moves(sq, occupied), BISHOP_MOBILITY),
                Piece::Rook => (get_rook_moves(sq, occupied), ROOK_MOBILITY),
                Piece::Queen => (
                    get_bishop_moves(sq, occupied) | get_rook_moves(sq, occupied),
                    QUEEN_MOBILITY,
                ),
                _ => (get_king_moves(sq), KING_MOBILITY),
            };

            mobility.add(weight.scaled((attacks & targets).popcnt() as i32));
        }
    }

    mobility
}

fn evaluate_bishop_pair(board: &Board, color: Color) -> TaperedScore {
    if pieces_of(board, Piece::Bishop, color).popcnt() >= 2 {
        BISHOP_PAIR_BONUS
    } else {
        TaperedScore::default()
    }
}

/// Rooks on open/semi-open files, on the 7th rank, and defending each other
fn evaluate_rook_features(board: &Board, color: Color) -> TaperedScore {
    let mut score = TaperedScore::default();

    let rooks = pieces_of(board, Piece::Rook, color);
    let own_pawns = pieces_of(board, Piece::Pawn, color);
    let enemy_pawns = pieces_of(board, Piece::Pawn, !color);
    let seventh = match color {
        Color::White => Rank::Seventh,
        Color::Black => Rank::Second,
    };

    for sq in rooks {
        let file = get_file(sq.get_file());

        if own_pawns & file == EMPTY {
            if enemy_pawns & file == EMPTY {
                score.add(ROOK_ON_OPEN_FILE);
            } else {
                score.add(ROOK_ON_SEMI_OPEN_FILE);
            }
        }

        if sq.get_rank() == seventh {
            score.add(ROOK_ON_SEVENTH);
        }
    }

    let connected = rooks
        .into_iter()
        .any(|sq| get_rook_moves(sq, *board.combined()) & rooks != EMPTY);
    if connected {
        score.add(CONNECTED_ROOKS);
    }

    score
}

fn evaluate_side(board: &Board, color: Color) -> TaperedScore {
    let mut score = evaluate_material_and_position(board, color);

    score.add(evaluate_king_safety(board, color));
    score.add(evaluate_pawn_structure(board, color));
    score.add(evaluate_mobility(board, color));
    score.add(evaluate_bishop_pair(board, color));
    score.add(evaluate_rook_features(board, color));

    score
}

/// Static evaluation from the side to move, within [-EVAL_INF, EVAL_INF]
pub fn evaluate(pos: &Pos) -> i32 {
    let board = pos.board();
    let phase = game_phase(pos);

    let mut score = evaluate_side(board, pos.turn());
    score.sub(evaluate_side(board, !pos.turn()));

    let sc = clamp(score.interpolate(phase));
    debug_assert!(sc.abs() <= EVAL_INF);
    sc
}
