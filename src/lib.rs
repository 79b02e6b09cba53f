//! Parallel chess search core.
//!
//! [`ai::Engine`] searches a [`game_repr::Pos`] with iterative deepening,
//! a shared transposition table and any number of worker threads:
//!
//! ```no_run
//! use chess_search::ai::{Engine, EngineConfig, SearchInput, SearchOutput};
//! use chess_search::game_repr::Pos;
//!
//! let mut engine = Engine::new(EngineConfig::default().with_threads(4))?;
//! let mut output = SearchOutput::new();
//! engine.search(&mut output, &Pos::default(), &SearchInput::depth(8))?;
//! println!("bestmove {}", output.best_move.unwrap());
//! # Ok::<(), chess_search::ai::EngineError>(())
//! ```

pub mod ai;
pub mod game_repr;

pub use ai::{Engine, EngineConfig, EngineError, SearchInput, SearchOutput, SearchSignals};
pub use game_repr::{Pos, PosError};
