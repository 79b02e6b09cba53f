// Move ordering: killer, counter-move and history heuristics
//
// The tables are shared by every search thread and updated without
// synchronisation beyond relaxed atomics. Lost updates only cost ordering
// quality, never correctness.

use std::sync::atomic::{AtomicI32, AtomicU16, Ordering};

use chess::{Board, ChessMove, Piece};

use super::score::PLY_SIZE;
use crate::game_repr::exchange::move_is_safe;
use crate::game_repr::moves::{self, captured, decode, encode, index, index_last_move, is_promotion, piece};
use crate::game_repr::{MoveList, Pos, MOVE_INDEX_SIZE};

/// History probabilities are 12-bit fixed point.
const PROB_BIT: i32 = 12;
const PROB_ONE: i32 = 1 << PROB_BIT;
const PROB_HALF: i32 = PROB_ONE / 2;
const PROB_SHIFT: i32 = 5;

const SCORE_TT: i32 = 2 * PROB_ONE - 1;
const SCORE_TACTICAL: i32 = PROB_ONE;
const SCORE_KILLER: i32 = PROB_ONE - 1;
const SCORE_COUNTER: i32 = PROB_ONE - 2;

/// Shared ordering tables, cleared at the start of every search.
pub struct OrderTables {
    killer: [AtomicU16; PLY_SIZE],
    counter: [AtomicU16; MOVE_INDEX_SIZE],
    history: [AtomicI32; MOVE_INDEX_SIZE],
}

impl OrderTables {
    pub fn new() -> Self {
        let tables = Self {
            killer: std::array::from_fn(|_| AtomicU16::new(0)),
            counter: std::array::from_fn(|_| AtomicU16::new(0)),
            history: std::array::from_fn(|_| AtomicI32::new(PROB_HALF)),
        };
        tables.clear();
        tables
    }

    pub fn clear(&self) {
        for killer in &self.killer {
            killer.store(0, Ordering::Relaxed);
        }
        for counter in &self.counter {
            counter.store(0, Ordering::Relaxed);
        }
        for history in &self.history {
            history.store(PROB_HALF, Ordering::Relaxed);
        }
    }

    pub fn killer(&self, ply: i32) -> Option<ChessMove> {
        decode(self.killer[ply as usize].load(Ordering::Relaxed))
    }

    /// Refutation of the opponent's last move in `pos`.
    pub fn counter(&self, pos: &Pos) -> Option<ChessMove> {
        let index = index_last_move(pos)?;
        decode(self.counter[index].load(Ordering::Relaxed))
    }

    /// History probability of `mv`, in [0, 4096].
    pub fn history(&self, mv: ChessMove, board: &Board) -> i32 {
        self.history[index(mv, board)].load(Ordering::Relaxed)
    }

    /// Quiet `mv` was the best move of a node at `ply`.
    pub fn good_move(&self, mv: ChessMove, pos: &Pos, ply: i32) {
        self.killer[ply as usize].store(encode(Some(mv)), Ordering::Relaxed);

        if let Some(last) = index_last_move(pos) {
            self.counter[last].store(encode(Some(mv)), Ordering::Relaxed);
        }

        let entry = &self.history[index(mv, pos.board())];
        let h = entry.load(Ordering::Relaxed);
        entry.store(h + ((PROB_ONE - h) >> PROB_SHIFT), Ordering::Relaxed);
    }

    /// Quiet `mv` was searched before the best move and did not improve.
    pub fn bad_move(&self, mv: ChessMove, pos: &Pos) {
        let entry = &self.history[index(mv, pos.board())];
        let h = entry.load(Ordering::Relaxed);
        entry.store(h - (h >> PROB_SHIFT), Ordering::Relaxed);
    }

    /// Score and sort every move of `list`.
    pub fn sort_all(&self, list: &mut MoveList, pos: &Pos, tt_move: Option<ChessMove>, ply: i32) {
        let board = pos.board();
        let killer = self.killer(ply);
        let counter = self.counter(pos);

        for i in 0..list.len() {
            let mv = list.get(i);

            let sc = if Some(mv) == tt_move {
                SCORE_TT
            } else if moves::is_tactical(mv, board) {
                let mut sc = SCORE_TACTICAL + capture_score(mv, board);
                if !move_is_safe(mv, board) {
                    sc -= 2 * PROB_ONE;
                }
                sc
            } else if Some(mv) == killer {
                SCORE_KILLER
            } else if Some(mv) == counter {
                SCORE_COUNTER
            } else {
                self.history(mv, board)
            };

            list.set_score(i, sc);
        }

        list.sort();
    }
}

impl Default for OrderTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Rank captures and evasions by MVV/LVA alone.
pub fn sort_mvv_lva(list: &mut MoveList, board: &Board) {
    for i in 0..list.len() {
        let sc = capture_score(list.get(i), board);
        list.set_score(i, sc);
    }

    list.sort();
}

/// Move the cache move (if present) to the front.
pub fn sort_tt_move(list: &mut MoveList, tt_move: Option<ChessMove>) {
    if let Some(i) = tt_move.and_then(|mv| list.find(mv)) {
        list.move_to_front(i);
    }
}

/// Most valuable victim, then least valuable attacker; promotions rank
/// one victim class higher.
pub fn capture_score(mv: ChessMove, board: &Board) -> i32 {
    let mut sc = captured(mv, board).map_or(0, victim_score) * 8 + attacker_score(piece(mv, board));

    if is_promotion(mv) {
        sc += 8;
    }

    sc
}

fn victim_score(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => 2,
        Piece::Knight => 3,
        Piece::Bishop => 4,
        Piece::Rook => 5,
        Piece::Queen => 6,
        Piece::King => 7,
    }
}

fn attacker_score(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => 5,
        Piece::Knight => 4,
        Piece::Bishop => 3,
        Piece::Rook => 2,
        Piece::Queen => 1,
        Piece::King => 0,
    }
}
