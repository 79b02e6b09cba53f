//! Immutable search position built on top of [`chess::Board`].
//!
//! `chess::Board` already handles piece placement, legality and the
//! Zobrist fingerprint. The search additionally needs the draw-rule
//! bookkeeping that a bare board does not carry: the fifty-move counter,
//! the keys of earlier positions for repetition detection, the last move
//! (for counter-move ordering) and the square of the last capture (for
//! recapture extensions and the quiescence depth floor).
//!
//! A [`Pos`] is never mutated once built. [`Pos::succ`] and [`Pos::null`]
//! return fresh values, so workers can share positions freely.

use std::fmt;
use std::str::FromStr;

use chess::{Board, BoardStatus, ChessMove, Color, MoveGen, Piece, Square, EMPTY};
use smallvec::SmallVec;
use thiserror::Error;

use super::moves::{self, MoveList};

/// Position fingerprint.
pub type Key = u64;

/// Plies in a repetition window that fit inline before spilling.
const HISTORY_INLINE: usize = 32;

/// Total force at the start of the game (both sides), used for the phase.
pub const STAGE_SIZE: u32 = 24;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PosError {
    #[error("invalid FEN `{fen}`: {reason}")]
    InvalidFen { fen: String, reason: String },
    #[error("illegal move `{mv}` in position `{fen}`")]
    IllegalMove { mv: String, fen: String },
}

#[derive(Clone, Debug)]
pub struct Pos {
    board: Board,
    /// Plies since the last capture or pawn move.
    rule50: u32,
    /// Keys of the ancestors since the last irreversible move, oldest first.
    history: SmallVec<[Key; HISTORY_INLINE]>,
    last_move: Option<ChessMove>,
    cap_sq: Option<Square>,
}

impl Pos {
    pub fn new(board: Board) -> Self {
        Self {
            board,
            rule50: 0,
            history: SmallVec::new(),
            last_move: None,
            cap_sq: None,
        }
    }

    /// Parse a FEN string. The halfmove clock field seeds the fifty-move
    /// counter; earlier positions are unknown so no repetition is detected
    /// before the first reversible moves.
    pub fn from_fen(fen: &str) -> Result<Self, PosError> {
        let board = Board::from_str(fen).map_err(|e| PosError::InvalidFen {
            fen: fen.to_string(),
            reason: format!("{e:?}"),
        })?;

        let rule50 = fen
            .split_whitespace()
            .nth(4)
            .and_then(|field| field.parse::<u32>().ok())
            .unwrap_or(0);

        let mut pos = Self::new(board);
        pos.rule50 = rule50;
        Ok(pos)
    }

    /// Replay a game from `fen` through a list of UCI moves, keeping the
    /// history needed for repetition detection.
    pub fn from_moves(fen: &str, uci_moves: &[&str]) -> Result<Self, PosError> {
        let mut pos = Self::from_fen(fen)?;

        for text in uci_moves {
            let mv = pos
                .legal_moves()
                .iter()
                .find(|mv| mv.to_string() == *text)
                .ok_or_else(|| PosError::IllegalMove {
                    mv: text.to_string(),
                    fen: pos.board.to_string(),
                })?;
            pos = pos.succ(mv);
        }

        Ok(pos)
    }

    /// Position after `mv`, which must be legal here.
    pub fn succ(&self, mv: ChessMove) -> Pos {
        debug_assert!(self.board.legal(mv), "illegal move {mv} in {}", self.board);

        let conversion = moves::is_conversion(mv, &self.board);
        let capture = moves::is_capture(mv, &self.board);

        let history = if conversion {
            SmallVec::new()
        } else {
            let mut history = self.history.clone();
            history.push(self.key());
            history
        };

        let cap_sq = if capture || mv.get_promotion().is_some() {
            Some(mv.get_dest())
        } else {
            None
        };

        Pos {
            board: self.board.make_move_new(mv),
            rule50: if conversion { 0 } else { self.rule50 + 1 },
            history,
            last_move: Some(mv),
            cap_sq,
        }
    }

    /// Position with the turn passed, or `None` when in check.
    ///
    /// Repetitions are never detected across a null move.
    pub fn null(&self) -> Option<Pos> {
        let board = self.board.null_move()?;

        Some(Pos {
            board,
            rule50: self.rule50 + 1,
            history: SmallVec::new(),
            last_move: None,
            cap_sq: None,
        })
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn key(&self) -> Key {
        self.board.get_hash()
    }

    #[inline]
    pub fn turn(&self) -> Color {
        self.board.side_to_move()
    }

    #[inline]
    pub fn in_check(&self) -> bool {
        *self.board.checkers() != EMPTY
    }

    #[inline]
    pub fn rule50(&self) -> u32 {
        self.rule50
    }

    #[inline]
    pub fn last_move(&self) -> Option<ChessMove> {
        self.last_move
    }

    #[inline]
    pub fn cap_sq(&self) -> Option<Square> {
        self.cap_sq
    }

    pub fn legal_moves(&self) -> MoveList {
        moves::gen_legals(&self.board)
    }

    pub fn is_mate(&self) -> bool {
        self.board.status() == BoardStatus::Checkmate
    }

    pub fn is_stalemate(&self) -> bool {
        self.board.status() == BoardStatus::Stalemate
    }

    /// Fifty-move rule (unless the last move mated) or repetition.
    pub fn is_draw(&self) -> bool {
        if self.rule50 >= 100 {
            !self.is_mate()
        } else if self.history.len() >= 4 {
            self.is_rep()
        } else {
            false
        }
    }

    /// Same key two, four, six... plies back inside the reversible window.
    fn is_rep(&self) -> bool {
        let key = self.key();
        self.history.iter().rev().skip(1).step_by(2).any(|&k| k == key)
    }

    /// Minor pieces count 1, rooks 2, queens 4.
    pub fn force(&self, side: Color) -> u32 {
        let own = *self.board.color_combined(side);
        let count = |piece: Piece| (*self.board.pieces(piece) & own).popcnt();

        count(Piece::Knight) + count(Piece::Bishop) + count(Piece::Rook) * 2 + count(Piece::Queen) * 4
    }

    pub fn pawns(&self, side: Color) -> u32 {
        (*self.board.pieces(Piece::Pawn) & *self.board.color_combined(side)).popcnt()
    }

    /// 0 with full material, `STAGE_SIZE` with bare kings and pawns.
    pub fn stage(&self) -> u32 {
        STAGE_SIZE.saturating_sub(self.force(Color::White) + self.force(Color::Black))
    }

    /// Game phase in [0, 1], 0 = opening, 1 = endgame.
    pub fn phase(&self) -> f64 {
        f64::from(self.stage()) / f64::from(STAGE_SIZE)
    }

    pub fn legal_count(&self) -> usize {
        MoveGen::new_legal(&self.board).len()
    }
}

impl Default for Pos {
    fn default() -> Self {
        Self::new(Board::default())
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.board)
    }
}
