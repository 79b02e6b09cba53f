// Principal variation lines

use std::fmt;

use chess::ChessMove;
use smallvec::SmallVec;

use super::score::PLY_SIZE;

/// A bounded sequence of moves, the principal variation below a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    moves: SmallVec<[ChessMove; PLY_SIZE]>,
}

impl Line {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.moves.clear();
    }

    /// Replace this line by `mv` followed by `rest`, truncated to
    /// `PLY_SIZE` moves.
    pub fn concat(&mut self, mv: ChessMove, rest: &Line) {
        self.moves.clear();
        self.moves.push(mv);
        let room = PLY_SIZE - 1;
        self.moves.extend(rest.moves.iter().take(room).copied());
    }

    /// Single-move line.
    pub fn set(&mut self, mv: ChessMove) {
        self.moves.clear();
        self.moves.push(mv);
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn first(&self) -> Option<ChessMove> {
        self.moves.first().copied()
    }

    /// Expected reply to the first move (the ponder move).
    pub fn answer(&self) -> Option<ChessMove> {
        self.moves.get(1).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = ChessMove> + '_ {
        self.moves.iter().copied()
    }

    /// Space separated UCI moves.
    pub fn to_uci(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, mv) in self.moves.iter().enumerate() {
            if i != 0 {
                f.write_str(" ")?;
            }
            write!(f, "{mv}")?;
        }
        Ok(())
    }
}
