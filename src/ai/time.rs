// Time allocation
//
// Smart timing (a clock with optional moves-to-go and increment) derives
// three limits from the remaining time:
// - t0: normal allocation, checked while the first root move is searched
// - t1: extended allocation, checked unless the root is under pressure
// - t2: hard limit, never exceeded
// Fixed timing (move time, depth or infinite search) uses the given time
// for all three.

use super::search::SearchInput;
use crate::game_repr::Pos;

/// Moves to plan for when no moves-to-go is given, opening and ending.
const MOVES_OPENING: f64 = 30.0;
const MOVES_ENDING: f64 = 10.0;

/// Safety margin for communication and thread start-up, in seconds.
const LAG: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeBudget {
    pub t0: f64,
    pub t1: f64,
    pub t2: f64,
}

impl TimeBudget {
    pub fn new(input: &SearchInput, pos: &Pos, ponder_option: bool) -> Self {
        if !input.smart {
            return Self {
                t0: input.time,
                t1: input.time,
                t2: input.time,
            };
        }

        let moves = input.moves.min(30);
        let moves_left = alloc_moves(pos, moves);

        let mut factor = 1.3;
        if ponder_option {
            factor *= 1.2;
        }

        let mut total = (input.time + input.inc * moves_left).max(0.0);
        let alloc = total / moves_left * factor;

        // Keep enough time for the remaining moves of the period.
        if moves > 1 {
            let moves = f64::from(moves);
            let safe = ((input.time / (moves - 1.0) + input.inc
                - (input.time / moves + input.inc) * 0.5)
                * (moves - 1.0))
                .max(0.0);
            total = total.min(safe);
        }

        let max = lag(total.min(input.time + input.inc) * 0.95);

        Self {
            t0: lag(alloc).min(max),
            t1: lag(alloc * 4.0).min(max),
            t2: max,
        }
    }
}

/// Moves the remaining time is spread over; `moves` is the moves-to-go
/// count, 0 when unknown.
pub fn alloc_moves(pos: &Pos, moves: u32) -> f64 {
    let moves_left = lerp(MOVES_OPENING, MOVES_ENDING, pos.phase());

    if moves != 0 {
        moves_left.min(f64::from(moves))
    } else {
        moves_left
    }
}

/// Share of the allocation after which a new iteration is not started.
pub fn alloc_early(pos: &Pos) -> f64 {
    lerp(0.4, 0.8, pos.phase())
}

#[inline]
pub fn lerp(mg: f64, eg: f64, phase: f64) -> f64 {
    mg + (eg - mg) * phase
}

#[inline]
fn lag(time: f64) -> f64 {
    (time - LAG).max(0.0)
}
