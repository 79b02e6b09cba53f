// Quiescence Search
//
// Extends the search past the horizon with tactical moves only, so that
// positions are never evaluated in the middle of an exchange. The side to
// move may always "stand pat" on the static evaluation unless in check.
//
// `depth` counts down from 0. At depth 0 quiet checks are searched too and
// the transposition table is used; evasions are generated while depth > -2;
// from depth -4 only recaptures on the last capture square remain.
//
// Also home of the static null-move verification used by the main search
// at low depth.

use chess::{BitBoard, EMPTY};

use super::evaluation::evaluate;
use super::line::Line;
use super::move_ordering::{sort_mvv_lva, sort_tt_move};
use super::score::{add_safe, from_tt, loss, to_tt, win, NONE, PLY_MAX};
use super::transposition_table::{NodeType, TtEntry};
use super::worker::{SearchResult, Searcher};
use crate::game_repr::exchange::{move_is_safe, see, see_max};
use crate::game_repr::moves::{add_checks, gen_opponent_threats, gen_tacticals, is_check};
use crate::game_repr::Pos;

/// Delta pruning margin on top of the best possible gain.
const DELTA_MARGIN: i32 = 200;

/// Stand-pat penalty for passing in static null-move verification.
const SNMP_TEMPO: i32 = 28;

/// Extra margin charged for each opponent threat.
const SNMP_THREAT: i32 = 100;

impl Searcher<'_> {
    pub(super) fn qs(&self, pos: &Pos, alpha: i32, beta: i32, depth: i32, ply: i32, pv: &mut Line) -> SearchResult<i32> {
        debug_assert!(depth <= 0);
        debug_assert!(alpha < beta);

        pv.clear();

        let sc = win(ply + 1);
        if sc <= alpha {
            return Ok(self.leaf(sc, ply));
        }

        if pos.is_draw() {
            return Ok(self.leaf(0, ply));
        }

        let key = pos.key();
        let board = pos.board();

        let mut tt_move = None;
        let mut eval = NONE;

        if depth == 0 {
            if let Some(entry) = self.global.tt.probe(key) {
                tt_move = entry.mv;
                eval = entry.eval;

                let sc = from_tt(entry.score, ply);
                let node_type = entry.node_type;

                if (node_type.is_lower() && sc >= beta)
                    || (node_type.is_upper() && sc <= alpha)
                    || node_type == NodeType::Exact
                {
                    return Ok(self.leaf(sc, ply));
                }
            }
        }

        if ply >= PLY_MAX {
            let eval = if eval == NONE { evaluate(pos) } else { eval };
            return Ok(self.leaf(eval, ply));
        }

        let in_check = depth > -2 && pos.in_check();

        let sc = loss(ply + 2);
        if !in_check && sc >= beta {
            return Ok(self.leaf(sc, ply));
        }

        let mut bs = NONE;
        let mut bm = None;

        let mut list = if in_check {
            let mut list = pos.legal_moves();
            sort_mvv_lva(&mut list, board);
            list
        } else {
            if eval == NONE {
                eval = evaluate(pos);
            }
            bs = eval;

            let mut list = gen_tacticals(board);
            sort_mvv_lva(&mut list, board);
            if depth == 0 {
                add_checks(&mut list, board);
            }
            list
        };

        let mut is_leaf = true;

        if bs < beta {
            sort_tt_move(&mut list, tt_move);

            for mv in list.iter() {
                if !in_check {
                    if depth <= -4 && Some(mv.get_dest()) != pos.cap_sq() {
                        continue;
                    }

                    if eval + see_max(mv, board) + DELTA_MARGIN <= alpha && !(depth == 0 && is_check(mv, board)) {
                        continue;
                    }

                    if !move_is_safe(mv, board) {
                        continue;
                    }
                }

                is_leaf = false;
                self.inc_node()?;

                let mut new_pv = Line::new();
                let sc = -self.qs(&pos.succ(mv), -beta, -alpha.max(bs), depth - 1, ply + 1, &mut new_pv)?;

                if sc > bs {
                    bm = Some(mv);
                    bs = sc;
                    pv.concat(mv, &new_pv);

                    if sc >= beta {
                        break;
                    }
                }
            }
        }

        if is_leaf {
            self.mark_leaf(ply);
        }

        if bs == NONE {
            debug_assert!(in_check && bm.is_none());
            bs = loss(ply);
        }

        if depth == 0 {
            self.global.tt.store(
                key,
                TtEntry {
                    mv: if bs > alpha { bm } else { None },
                    score: to_tt(bs, ply),
                    eval,
                    depth: 0,
                    node_type: NodeType::from_window(bs, alpha, beta),
                },
            );
        }

        Ok(bs)
    }

    /// Static null-move verification: the stand-pat score after passing,
    /// lowered by the best opponent threat. Stops as soon as it falls
    /// below `beta`.
    pub(super) fn snmp(&self, pos: &Pos, beta: i32, eval: i32) -> i32 {
        let eval = add_safe(eval, -SNMP_TEMPO);
        if eval < beta {
            return eval;
        }

        let Some(flipped) = pos.board().null_move() else {
            return eval;
        };

        let (mut captures, promotions) = gen_opponent_threats(pos.board());
        sort_mvv_lva(&mut captures, &flipped);

        let mut done = EMPTY;
        let mut bs = eval;

        for mv in captures.iter().chain(promotions.iter()) {
            let to = BitBoard::from_square(mv.get_dest());

            // Least valuable attacker only, captures come MVV/LVA ordered.
            if done & to != EMPTY {
                continue;
            }
            done |= to;

            let gain = see(mv, &flipped);
            if gain <= 0 {
                continue;
            }

            let sc = eval - gain - SNMP_THREAT;
            if sc < bs {
                bs = sc;
                if sc < beta {
                    break;
                }
            }
        }

        bs
    }
}
