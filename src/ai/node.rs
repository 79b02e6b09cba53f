// Search node state
//
// Everything the move loop of one node needs, kept in a plain value so a
// split point can hold a copy and hand it to helping workers.

use chess::ChessMove;

use super::line::Line;
use super::score::NONE;
use super::transposition_table::NodeType;
use crate::game_repr::MoveList;

#[derive(Debug, Clone)]
pub struct Node {
    pub alpha: i32,
    pub beta: i32,
    pub depth: i32,
    pub ply: i32,
    pub root: bool,

    pub pv_node: bool,
    pub in_check: bool,
    pub eval: i32,
    pub skip_move: Option<ChessMove>,
    pub sing_move: Option<ChessMove>,
    pub sing_score: i32,
    pub futile: bool,

    pub list: MoveList,
    /// Next move of `list` to hand out.
    pub i: usize,
    /// Moves searched so far (pruned moves are not counted).
    pub j: usize,
    pub searched: MoveList,

    pub mv: Option<ChessMove>,
    pub score: i32,
    pub pv: Line,
}

impl Node {
    pub fn new(alpha: i32, beta: i32, depth: i32, ply: i32, root: bool) -> Self {
        debug_assert!(alpha < beta, "empty window ({alpha}, {beta})");

        Self {
            alpha,
            beta,
            depth,
            ply,
            root,
            pv_node: beta != alpha + 1,
            in_check: false,
            eval: NONE,
            skip_move: None,
            sing_move: None,
            sing_score: NONE,
            futile: false,
            list: MoveList::new(),
            i: 0,
            j: 0,
            searched: MoveList::new(),
            mv: None,
            score: NONE,
            pv: Line::new(),
        }
    }

    pub fn node_type(&self) -> NodeType {
        NodeType::from_window(self.score, self.alpha, self.beta)
    }

    /// Record a searched move. Returns true when a root node found a new
    /// best move the driver must hear about.
    pub fn update(&mut self, mv: ChessMove, sc: i32, pv: &Line) -> bool {
        self.searched.push(mv);
        self.j += 1;

        if sc > self.score {
            self.mv = Some(mv);
            self.score = sc;
            self.pv.concat(mv, pv);

            return self.root && (self.j == 1 || sc > self.alpha);
        }

        false
    }
}
