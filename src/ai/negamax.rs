// Negamax Search with Alpha-Beta Pruning
//
// Principal variation search over `Pos`, scores from the side to move.
//
// Per node:
// - mate distance pruning and draw detection
// - transposition table cutoffs in non-PV nodes, singular candidate seeding
// - static pruning when not in check: reverse futility, null move (static
//   verification at low depth), futility
// - move loop with late move pruning, SEE pruning, check and recapture
//   extensions, singular extension and late move reductions
// - splitting the move loop with idle workers at high depth

use chess::ChessMove;
use once_cell::sync::Lazy;

use super::evaluation::evaluate;
use super::line::Line;
use super::move_ordering::{sort_mvv_lva, sort_tt_move};
use super::node::Node;
use super::score::{add_safe, from_tt, is_eval, is_loss, is_win, loss, to_tt, win, EVAL_INF, INF, NONE, PLY_MAX};
use super::split_point::{SpId, POOL_SIZE};
use super::transposition_table::TtEntry;
use super::worker::{SearchResult, Searcher};
use crate::game_repr::exchange::move_is_safe;
use crate::game_repr::moves::{add_checks, encode, gen_tacticals, is_check, is_recapture, is_tactical};
use crate::game_repr::{MoveList, Pos};

/// Minimum depth for a split.
const SPLIT_DEPTH: i32 = 6;

/// Moves that must remain in the list for a split to pay off.
const SPLIT_MOVES: usize = 5;

/// Late move reductions indexed by `[depth][searched moves]`.
static LMR: Lazy<[[i32; 64]; 32]> = Lazy::new(|| {
    let mut table = [[0; 64]; 32];

    for (depth, row) in table.iter_mut().enumerate().skip(1) {
        for (moves, red) in row.iter_mut().enumerate().skip(1) {
            *red = ((moves as f64).log2() * (depth as f64).log2() * 0.4) as i32;
        }
    }

    table
});

impl Searcher<'_> {
    /// Score every move of `list` with a full window and sort the list.
    pub(super) fn search_all(&self, pos: &Pos, list: &mut MoveList, depth: i32) -> SearchResult<()> {
        for i in 0..list.len() {
            let mv = list.get(i);
            self.inc_node()?;

            let mut pv = Line::new();
            let sc = -self.search(&pos.succ(mv), -INF, INF, depth - 1, 1, None, &mut pv)?;
            list.set_score(i, sc);
        }

        list.sort();
        Ok(())
    }

    /// Root search with an aspiration window around the previous score.
    pub(super) fn search_asp(&self, pos: &Pos, depth: i32) -> SearchResult<()> {
        let last = self.global.last_score();

        if depth >= 4 && is_eval(last) {
            let mut alpha_margin = 10;
            let mut beta_margin = 10;

            while alpha_margin.max(beta_margin) < 500 {
                let alpha = add_safe(last, -alpha_margin);
                let beta = add_safe(last, beta_margin);

                self.search_root(pos, alpha, beta, depth)?;
                let sc = self.global.score();

                if is_win(sc) || is_loss(sc) {
                    break;
                } else if sc <= alpha {
                    alpha_margin *= 2;
                } else if sc >= beta {
                    beta_margin *= 2;
                } else {
                    return Ok(());
                }
            }
        }

        self.search_root(pos, -INF, INF, depth)
    }

    fn search_root(&self, pos: &Pos, alpha: i32, beta: i32, depth: i32) -> SearchResult<()> {
        let mut node = Node::new(alpha, beta, depth, 0, true);
        node.in_check = pos.in_check();
        if !node.in_check {
            node.eval = evaluate(pos);
        }
        node.list = self.global.root_list();

        self.move_loop(pos, &mut node)
    }

    /// Alpha-beta search of `pos`. `skip` excludes a move (singular
    /// verification); `pv` receives the principal variation.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn search(
        &self,
        pos: &Pos,
        alpha: i32,
        beta: i32,
        depth: i32,
        ply: i32,
        skip: Option<ChessMove>,
        pv: &mut Line,
    ) -> SearchResult<i32> {
        debug_assert!(-INF <= alpha && alpha < beta && beta <= INF);

        if depth <= 0 {
            return self.qs(pos, alpha, beta, 0, ply, pv);
        }

        pv.clear();

        let sc = win(ply + 1);
        if sc <= alpha {
            return Ok(self.leaf(sc, ply));
        }

        if pos.is_draw() {
            return Ok(self.leaf(0, ply));
        }

        let mut node = Node::new(alpha, beta, depth, ply, ply == 0 && skip.is_none());
        node.skip_move = skip;

        let key = match skip {
            Some(_) => pos.key() ^ u64::from(encode(skip)),
            None => pos.key(),
        };

        let mut tt_move = None;

        if let Some(entry) = self.global.tt.probe(key) {
            tt_move = entry.mv;
            node.eval = entry.eval;

            let sc = from_tt(entry.score, ply);
            let proven = (entry.node_type.is_lower() && sc >= beta) || (entry.node_type.is_upper() && sc <= alpha);

            if !node.pv_node && entry.depth >= depth && proven {
                return Ok(self.leaf(sc, ply));
            }

            if entry.depth >= depth - 4 && entry.node_type.is_lower() && is_eval(sc) {
                node.sing_move = entry.mv;
                node.sing_score = sc;
            }
        }

        if ply >= PLY_MAX {
            let eval = if node.eval == NONE { evaluate(pos) } else { node.eval };
            return Ok(self.leaf(eval, ply));
        }

        node.in_check = pos.in_check();

        let sc = loss(ply + 2);
        if !node.in_check && sc >= beta {
            return Ok(self.leaf(sc, ply));
        }

        if node.eval == NONE && !node.in_check {
            node.eval = evaluate(pos);
        }

        let cutoff = !node.in_check && self.static_prune(pos, &mut node)?;

        if !cutoff {
            self.gen_moves(pos, &mut node, tt_move);
            self.move_loop(pos, &mut node)?;
        }

        // No move searched: mate, stalemate or the excluded move was the only one.
        if node.score == NONE {
            debug_assert!(node.mv.is_none());

            return Ok(if !node.in_check && node.skip_move.is_none() {
                debug_assert!(pos.legal_moves().is_empty(), "no move searched in {pos}");
                self.leaf(0, ply)
            } else {
                self.leaf(loss(ply), ply)
            });
        }

        debug_assert!(node.score >= -INF && node.score <= INF);

        self.global.tt.store(
            key,
            TtEntry {
                mv: if node.score > alpha { node.mv } else { None },
                score: to_tt(node.score, ply),
                eval: node.eval,
                depth,
                node_type: node.node_type(),
            },
        );

        if node.score > alpha && node.skip_move.is_none() {
            self.history_feedback(pos, &node);
        }

        *pv = node.pv;
        Ok(node.score)
    }

    /// Reverse futility, null move and futility. Returns true when the node
    /// is cut off with `node.score` set.
    fn static_prune(&self, pos: &Pos, node: &mut Node) -> SearchResult<bool> {
        let depth = node.depth;
        let eval = node.eval;

        if depth <= 2 {
            let sc = add_safe(eval, -100 * depth);
            if sc >= node.beta {
                node.score = sc;
                node.pv.clear();
                return Ok(true);
            }
        }

        if self.global.null_move && !node.pv_node && is_eval(node.beta) && eval >= node.beta && !null_bad(pos) {
            let sc = if depth <= 3 {
                self.snmp(pos, node.beta, eval)
            } else {
                let Some(null) = pos.null() else {
                    unreachable!("null move refused outside check in {pos}")
                };

                self.inc_node()?;

                let mut pv = Line::new();
                let new_depth = depth - (depth / 4 + 2) - 1;
                -self.search(&null, -node.beta, -node.beta + 1, new_depth, node.ply + 1, None, &mut pv)?
            };

            if sc >= node.beta {
                node.score = sc.min(EVAL_INF);
                node.pv.clear();
                return Ok(true);
            }
        }

        if depth <= 4 {
            let sc = add_safe(eval, 60 * depth);
            if sc <= node.alpha {
                node.score = sc;
                node.futile = true;
            }
        }

        Ok(false)
    }

    fn gen_moves(&self, pos: &Pos, node: &mut Node, tt_move: Option<ChessMove>) {
        let board = pos.board();

        if node.futile {
            node.list = gen_tacticals(board);
            sort_mvv_lva(&mut node.list, board);
            add_checks(&mut node.list, board);
            sort_tt_move(&mut node.list, tt_move);
        } else {
            node.list = pos.legal_moves();
            self.global.tables.sort_all(&mut node.list, pos, tt_move, node.ply);
        }
    }

    /// Killer, counter and history updates after a quiet best move.
    fn history_feedback(&self, pos: &Pos, node: &Node) {
        let board = pos.board();
        let Some(best) = node.mv else { return };

        if is_tactical(best, board) {
            return;
        }

        let tables = self.global.tables;
        tables.good_move(best, pos, node.ply);

        for mv in node.searched.iter().take_while(|&mv| mv != best) {
            if !is_tactical(mv, board) {
                tables.bad_move(mv, pos);
            }
        }
    }

    fn move_loop(&self, pos: &Pos, node: &mut Node) -> SearchResult<()> {
        node.searched.clear();
        node.i = 0;
        node.j = 0;

        while node.score < node.beta && node.i < node.list.len() {
            let searched = node.j;

            if self.global.smp
                && node.depth >= SPLIT_DEPTH
                && searched != 0
                && node.list.len() - searched >= SPLIT_MOVES
                && self.global.has_worker()
                && self.slot().pool_size() < POOL_SIZE
            {
                return self.split(pos, node);
            }

            let mv = node.list.get(node.i);
            node.i += 1;

            if node.root {
                self.global.search_move(mv, searched);
            }

            if !prune(pos, mv, node) {
                let mut pv = Line::new();
                let sc = self.search_move(pos, mv, node, &mut pv)?;

                if node.update(mv, sc, &pv) {
                    self.global.new_best_move(node);
                }
            }
        }

        Ok(())
    }

    /// Move loop of a worker attached to split point `sp`.
    pub(super) fn split_move_loop(&self, sp: SpId) -> SearchResult<()> {
        let split_point = &self.global.split_points[sp];
        let (pos, mut node) = split_point.snapshot();

        while let Some(mv) = split_point.get_move(&mut node) {
            if prune(&pos, mv, &node) {
                continue;
            }

            let mut pv = Line::new();
            let sc = self.search_move(&pos, mv, &node, &mut pv)?;

            split_point.update(mv, sc, &pv, |shared| self.global.new_best_move(shared));
        }

        Ok(())
    }

    /// Search one move of `node` with extensions, reductions and PVS.
    fn search_move(&self, pos: &Pos, mv: ChessMove, node: &Node, pv: &mut Line) -> SearchResult<i32> {
        let mut ext = extend(pos, mv, node);
        let mut red = reduce(pos, mv, node);
        debug_assert!(ext == 0 || red == 0);

        if node.pv_node
            && node.depth >= 6
            && Some(mv) == node.sing_move
            && node.skip_move.is_none()
            && ext == 0
        {
            let new_alpha = add_safe(node.sing_score, -50);
            let mut new_pv = Line::new();
            let sc = self.search(pos, new_alpha, new_alpha + 1, node.depth - 4, node.ply, Some(mv), &mut new_pv)?;

            if sc <= new_alpha {
                ext = 1;
            }
        }

        let new_alpha = node.alpha.max(node.score);
        let new_depth = node.depth + ext - 1;
        let ply = node.ply + 1;

        if red != 0 && new_depth - red <= 0 {
            red = new_depth - 1;
        }

        let succ = pos.succ(mv);
        self.inc_node()?;

        let sc = if (node.pv_node && node.j != 0) || red != 0 {
            let sc = -self.search(&succ, -new_alpha - 1, -new_alpha, new_depth - red, ply, None, pv)?;

            if sc > new_alpha {
                if node.root {
                    self.global.set_high();
                }
                let result = self.search(&succ, -node.beta, -new_alpha, new_depth, ply, None, pv);
                if node.root {
                    self.global.clear_high();
                }
                -result?
            } else {
                sc
            }
        } else {
            -self.search(&succ, -node.beta, -new_alpha, new_depth, ply, None, pv)?
        };

        debug_assert!(sc > -INF && sc < INF);
        Ok(sc)
    }
}

/// Tactical moves, evasions and checks are never pruned or reduced by
/// move count.
fn move_is_dangerous(mv: ChessMove, pos: &Pos, node: &Node) -> bool {
    node.in_check || is_tactical(mv, pos.board()) || is_check(mv, pos.board())
}

fn prune(pos: &Pos, mv: ChessMove, node: &Node) -> bool {
    let board = pos.board();

    if Some(mv) == node.skip_move {
        return true;
    }

    if node.futile && !move_is_safe(mv, board) {
        return true;
    }

    if node.score < -EVAL_INF {
        return false;
    }

    let depth = node.depth;
    let dangerous = move_is_dangerous(mv, pos, node);

    if depth <= 2 && node.j >= 6 * depth as usize && !dangerous {
        return true;
    }

    if depth <= 4 && !dangerous && !move_is_safe(mv, board) {
        return true;
    }

    depth <= 1 && is_tactical(mv, board) && !move_is_safe(mv, board)
}

fn extend(pos: &Pos, mv: ChessMove, node: &Node) -> i32 {
    let check = is_check(mv, pos.board());
    let mut ext = 0;

    if node.depth <= 2 && check {
        ext += 1;
    }

    if node.pv_node && (check || is_recapture(mv, pos)) {
        ext += 1;
    }

    ext.min(1)
}

fn reduce(pos: &Pos, mv: ChessMove, node: &Node) -> i32 {
    if node.depth < 3 {
        return 0;
    }

    let dangerous = move_is_dangerous(mv, pos, node);

    if node.j >= 1 && !dangerous {
        let red = LMR[node.depth.min(31) as usize][node.j.min(63)];
        return if node.pv_node { red / 2 } else { red };
    }

    if !node.pv_node && node.j >= 3 && dangerous && !move_is_safe(mv, pos.board()) {
        return 1;
    }

    0
}

/// Null-move pruning is unsound for a side with (almost) no pieces or no
/// pawns, where zugzwang is common.
pub fn null_bad(pos: &Pos) -> bool {
    let side = pos.turn();
    pos.force(side) <= 1 || pos.pawns(side) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::engine::EngineConfig;
    use crate::ai::score::mate_in;
    use crate::ai::search::tests::{with_config_searcher, with_searcher};
    use chess::Square;

    /// Mutual zugzwang: whoever moves gives up the opposition.
    const ZUGZWANG: [&str; 2] = ["8/8/3k4/3P4/3K4/8/8/8 w - - 0 1", "8/8/3k4/3P4/3K4/8/8/8 b - - 0 1"];

    fn mv(from: Square, to: Square) -> ChessMove {
        ChessMove::new(from, to, None)
    }

    #[test]
    fn test_lmr_table() {
        assert_eq!(LMR[1][63], 0);
        assert_eq!(LMR[8][1], 0);
        // log2(8) * log2(8) * 0.4 = 3.6
        assert_eq!(LMR[8][8], 3);
        assert!(LMR[31][63] > LMR[8][8]);
    }

    #[test]
    fn test_null_bad() {
        // Rook and pawns: null move allowed.
        assert!(!null_bad(&Pos::from_fen("4k3/pp6/8/8/8/8/PP6/R3K3 w - - 0 1").unwrap()));
        // Only a knight.
        assert!(null_bad(&Pos::from_fen("4k3/pp6/8/8/8/8/PP6/N3K3 w - - 0 1").unwrap()));
        // Pieces but no pawns.
        assert!(null_bad(&Pos::from_fen("4k3/pp6/8/8/8/8/8/R3K3 w - - 0 1").unwrap()));
        // Judged for the side to move only.
        assert!(null_bad(&Pos::from_fen("4k3/pp6/8/8/8/8/PP6/R3K3 b - - 0 1").unwrap()));
    }

    #[test]
    fn test_search_finds_mate_in_one() {
        let pos = Pos::from_fen("7k/8/6K1/8/8/8/8/R7 w - - 0 1").unwrap();
        let mut pv = Line::new();

        let sc = with_searcher(&pos, |s| s.search(&pos, -INF, INF, 2, 0, None, &mut pv)).unwrap();

        assert_eq!(sc, win(1));
        assert_eq!(pv.first(), Some(mv(Square::A1, Square::A8)));
    }

    #[test]
    fn test_search_scores_stalemate_as_draw() {
        // Black to move has no legal move and is not in check.
        let pos = Pos::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        let mut pv = Line::new();

        let sc = with_searcher(&pos, |s| s.search(&pos, -INF, INF, 3, 0, None, &mut pv)).unwrap();
        assert_eq!(sc, 0);
        assert!(pv.is_empty());
    }

    #[test]
    fn test_search_scores_mated_side() {
        let pos = Pos::from_fen("R6k/8/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        let mut pv = Line::new();

        let sc = with_searcher(&pos, |s| s.search(&pos, -INF, INF, 2, 3, None, &mut pv)).unwrap();
        assert_eq!(sc, loss(3));
    }

    #[test]
    fn test_excluding_the_only_move_is_a_loss() {
        // Kg8 is the only legal move; with it excluded the node has no move.
        let pos = Pos::from_fen("7k/8/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        let only = pos.legal_moves();
        assert_eq!(only.len(), 1);

        let mut pv = Line::new();
        let sc = with_searcher(&pos, |s| s.search(&pos, -INF, INF, 2, 4, Some(only.get(0)), &mut pv)).unwrap();
        assert_eq!(sc, loss(4));
    }

    #[test]
    fn test_search_is_deterministic_single_threaded() {
        let pos = Pos::from_fen("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3").unwrap();

        let run = || {
            let mut pv = Line::new();
            let sc = with_searcher(&pos, |s| s.search(&pos, -INF, INF, 4, 0, None, &mut pv)).unwrap();
            (sc, pv)
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_prune_never_skips_first_move() {
        let pos = Pos::default();
        let node = Node::new(-INF, INF, 1, 3, false);

        for mv in pos.legal_moves().iter() {
            assert!(!prune(&pos, mv, &node));
        }
    }

    #[test]
    fn test_late_quiet_moves_pruned_at_low_depth() {
        let pos = Pos::default();
        let mut node = Node::new(-100, 100, 1, 3, false);
        node.score = -20;
        node.j = 6;

        assert!(prune(&pos, mv(Square::A2, Square::A3), &node));

        node.skip_move = Some(mv(Square::E2, Square::E4));
        node.j = 0;
        assert!(prune(&pos, mv(Square::E2, Square::E4), &node));
        assert!(!prune(&pos, mv(Square::D2, Square::D4), &node));
    }

    #[test]
    fn test_reductions() {
        let pos = Pos::default();
        let quiet = mv(Square::A2, Square::A3);

        let mut node = Node::new(-1, 0, 8, 3, false);
        node.j = 8;
        assert_eq!(reduce(&pos, quiet, &node), 3);

        let mut pv_node = Node::new(-100, 100, 8, 3, false);
        pv_node.j = 8;
        assert_eq!(reduce(&pos, quiet, &pv_node), 1);

        node.j = 0;
        assert_eq!(reduce(&pos, quiet, &node), 0);
    }

    #[test]
    fn test_check_extension() {
        let pos = Pos::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
        let check = mv(Square::A1, Square::A8);
        let quiet = mv(Square::A1, Square::A2);

        let shallow = Node::new(-1, 0, 2, 5, false);
        assert_eq!(extend(&pos, check, &shallow), 1);
        assert_eq!(extend(&pos, quiet, &shallow), 0);

        let deep = Node::new(-1, 0, 6, 5, false);
        assert_eq!(extend(&pos, check, &deep), 0);

        let deep_pv = Node::new(-100, 100, 6, 5, false);
        assert_eq!(extend(&pos, check, &deep_pv), 1);
    }

    #[test]
    fn test_null_move_skipped_in_zugzwang() {
        let pos = Pos::from_fen(ZUGZWANG[1]).unwrap();
        assert!(null_bad(&pos));

        let eval = evaluate(&pos);
        let mut node = Node::new(eval - 51, eval - 50, 5, 2, false);
        node.eval = eval;

        let cutoff = with_searcher(&pos, |s| s.static_prune(&pos, &mut node)).unwrap();
        assert!(!cutoff);
        assert_eq!(node.score, NONE);
    }

    #[test]
    fn test_null_move_cuts_with_material() {
        let pos = Pos::from_fen("4k3/8/8/8/8/8/PP6/R3K3 w - - 0 1").unwrap();
        assert!(!null_bad(&pos));

        let eval = evaluate(&pos);
        let node = || {
            let mut node = Node::new(eval - 301, eval - 300, 5, 2, false);
            node.eval = eval;
            node
        };

        let mut with_null = node();
        let cutoff = with_searcher(&pos, |s| s.static_prune(&pos, &mut with_null)).unwrap();
        assert!(cutoff);
        assert!(with_null.score >= eval - 300);

        let mut without_null = node();
        let config = EngineConfig::default().with_null_move(false);
        let cutoff = with_config_searcher(&pos, &config, |s| s.static_prune(&pos, &mut without_null)).unwrap();
        assert!(!cutoff);
        assert_eq!(without_null.score, NONE);
    }

    #[test]
    fn test_zugzwang_search_matches_search_without_null_move() {
        let run = |pos: &Pos, null_move: bool| {
            let config = EngineConfig::default().with_null_move(null_move);
            with_config_searcher(pos, &config, |s| {
                let mut pv = Line::new();
                let sc = s.search(pos, -INF, INF, 6, 0, None, &mut pv).unwrap();
                (sc, pv, s.slot().nodes())
            })
        };

        for fen in ZUGZWANG {
            let pos = Pos::from_fen(fen).unwrap();
            assert_eq!(run(&pos, true), run(&pos, false), "{fen}");
        }
    }

    #[test]
    fn test_cached_mate_is_rebased_to_the_probing_ply() {
        // Ra8 mates: a mate at ply 3 when this is reached at ply 2.
        let pos = Pos::from_fen("6k1/8/6K1/8/8/8/8/R7 w - - 0 1").unwrap();

        let (deep, entry, root, deeper) = with_searcher(&pos, |s| {
            let mut pv = Line::new();
            let deep = s.search(&pos, -INF, INF, 3, 2, None, &mut pv).unwrap();
            let entry = s.global.tt.probe(pos.key());

            // Null windows, answered by the cache entry above.
            let root = s.search(&pos, 0, 1, 3, 0, None, &mut pv).unwrap();
            let deeper = s.search(&pos, 0, 1, 3, 4, None, &mut pv).unwrap();
            (deep, entry, root, deeper)
        });

        assert_eq!(deep, win(3));
        // Stored as the distance from the node itself.
        assert_eq!(entry.map(|entry| entry.score), Some(win(1)));
        assert_eq!(root, win(1));
        assert_eq!(deeper, win(5));
        assert!(root > deep && deep > deeper);
        assert_eq!(mate_in(root), Some(1));
        assert_eq!(mate_in(deep), Some(2));
    }

    #[test]
    fn test_terminal_nodes_are_not_cached() {
        let mated = Pos::from_fen("R6k/8/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        let stalemated = Pos::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();

        with_searcher(&mated, |s| {
            let mut pv = Line::new();
            assert_eq!(s.search(&mated, -INF, INF, 2, 1, None, &mut pv).unwrap(), loss(1));
            assert_eq!(s.search(&stalemated, -INF, INF, 2, 1, None, &mut pv).unwrap(), 0);
            assert!(s.global.tt.probe(mated.key()).is_none());
            assert!(s.global.tt.probe(stalemated.key()).is_none());
        });
    }
}
