pub mod exchange;
pub mod moves;
mod position;

pub use moves::{MoveIndex, MoveList, ScoredMove, MOVE_INDEX_SIZE};
pub use position::*;
