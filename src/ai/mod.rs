// Search core
//
// Parallel alpha-beta search with iterative deepening:
// - shared lockless transposition table
// - killer, counter-move and history move ordering
// - principal variation search with pruning, extensions and reductions
// - quiescence search
// - young-brothers-wait splitting across worker threads
// - time management with aspiration windows and easy-move detection

mod engine;
mod evaluation;
mod line;
mod move_ordering;
mod negamax;
mod node;
mod piece_square_tables;
mod quiescence;
pub mod score;
mod search;
mod split_point;
mod time;
mod transposition_table;
mod worker;

pub use engine::{Engine, EngineConfig, EngineError, MAX_THREADS};
pub use evaluation::evaluate;
pub use line::Line;
pub use move_ordering::OrderTables;
pub use negamax::null_bad;
pub use search::{quick_move, quick_score, InfoCallback, SearchInput, SearchOutput, SearchSignals};
pub use time::TimeBudget;
pub use transposition_table::{NodeType, TranspositionTable, TtEntry};
