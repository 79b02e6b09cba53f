// Score constants and mate-distance arithmetic
//
// Scores are centipawns from the side to move. Mate scores live at the
// extremes of the range and encode the distance to mate in plies, so a
// shorter mate always outranks a longer one.

/// Largest possible score (mate on the board).
pub const INF: i32 = 10000;

/// Bound of every non-mate score.
pub const EVAL_INF: i32 = INF - 100;

/// "No score yet", below every real score.
pub const NONE: i32 = -INF - 1;

pub const DEPTH_MAX: i32 = 64;
pub const PLY_MAX: i32 = 63;
pub const PLY_SIZE: usize = PLY_MAX as usize + 1;

/// Mate delivered `ply` plies from the root.
#[inline]
pub const fn win(ply: i32) -> i32 {
    debug_assert!(ply >= 0 && ply <= PLY_MAX + 1);
    INF - ply
}

/// Mated `ply` plies from the root.
#[inline]
pub const fn loss(ply: i32) -> i32 {
    -win(ply)
}

#[inline]
pub const fn is_win(sc: i32) -> bool {
    sc > EVAL_INF
}

#[inline]
pub const fn is_loss(sc: i32) -> bool {
    sc < -EVAL_INF
}

/// A heuristic score, neither a mate nor [`NONE`].
#[inline]
pub const fn is_eval(sc: i32) -> bool {
    sc >= -EVAL_INF && sc <= EVAL_INF
}

/// Full moves until mate, signed (positive: we mate).
pub fn mate_in(sc: i32) -> Option<i32> {
    if is_win(sc) {
        Some((INF - sc + 1) / 2)
    } else if is_loss(sc) {
        Some(-(INF + sc + 1) / 2)
    } else {
        None
    }
}

/// Rebase a mate score from "distance to the root" to "distance to this
/// node" before it goes into the transposition table.
#[inline]
pub fn to_tt(sc: i32, ply: i32) -> i32 {
    if is_win(sc) {
        sc + ply
    } else if is_loss(sc) {
        sc - ply
    } else {
        sc
    }
}

/// Inverse of [`to_tt`].
#[inline]
pub fn from_tt(sc: i32, ply: i32) -> i32 {
    if is_win(sc) {
        sc - ply
    } else if is_loss(sc) {
        sc + ply
    } else {
        sc
    }
}

/// Add a margin to an eval score, leaving mate scores alone.
#[inline]
pub fn add_safe(sc: i32, inc: i32) -> i32 {
    if is_eval(sc) {
        clamp(sc + inc)
    } else {
        sc
    }
}

#[inline]
pub fn clamp(sc: i32) -> i32 {
    sc.clamp(-EVAL_INF, EVAL_INF)
}
