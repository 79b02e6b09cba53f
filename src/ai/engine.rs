// Engine facade
//
// Owns what outlives a single search: the transposition table, the move
// ordering tables and the configuration.

use chess::ChessMove;
use log::debug;
use thiserror::Error;

use super::move_ordering::OrderTables;
use super::search::{self, SearchInput, SearchOutput};
use super::transposition_table::TranspositionTable;
use crate::game_repr::{Pos, PosError};

/// Workers are tracked in a 64-bit mask.
pub const MAX_THREADS: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("thread count must be between 1 and {MAX_THREADS}, got {0}")]
    InvalidThreads(usize),
    #[error("hash size must be at least 1 MiB")]
    InvalidHash,
    #[error("the position has no legal moves")]
    NoLegalMoves,
    #[error(transparent)]
    Position(#[from] PosError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub threads: usize,
    /// Transposition table size in MiB, rounded down to a power of two.
    pub hash_mb: usize,
    /// The caller ponders; normal allocations may be a little longer.
    pub ponder: bool,
    /// Null-move pruning. Only worth turning off to check its verdicts.
    pub null_move: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            hash_mb: 64,
            ponder: false,
            null_move: true,
        }
    }
}

impl EngineConfig {
    /// One worker per logical core.
    pub fn all_cores() -> Self {
        Self {
            threads: num_cpus::get().clamp(1, MAX_THREADS),
            ..Self::default()
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_hash_mb(mut self, hash_mb: usize) -> Self {
        self.hash_mb = hash_mb;
        self
    }

    pub fn with_ponder(mut self, ponder: bool) -> Self {
        self.ponder = ponder;
        self
    }

    pub fn with_null_move(mut self, null_move: bool) -> Self {
        self.null_move = null_move;
        self
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.threads == 0 || self.threads > MAX_THREADS {
            return Err(EngineError::InvalidThreads(self.threads));
        }
        if self.hash_mb == 0 {
            return Err(EngineError::InvalidHash);
        }
        Ok(())
    }
}

pub struct Engine {
    config: EngineConfig,
    tt: TranspositionTable,
    tables: OrderTables,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        debug!("engine: {} threads, {} MiB hash", config.threads, config.hash_mb);

        Ok(Self {
            config,
            tt: TranspositionTable::with_megabytes(config.hash_mb),
            tables: OrderTables::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tt(&self) -> &TranspositionTable {
        &self.tt
    }

    /// Search `pos` within the limits of `input`. Progress and the result
    /// are written to `output`.
    pub fn search(&mut self, output: &mut SearchOutput, pos: &Pos, input: &SearchInput) -> Result<(), EngineError> {
        search::run(&mut self.tt, &self.tables, &self.config, output, pos, input)
    }

    /// Parse `fen` and search it.
    pub fn search_fen(&mut self, output: &mut SearchOutput, fen: &str, input: &SearchInput) -> Result<(), EngineError> {
        let pos = Pos::from_fen(fen)?;
        self.search(output, &pos, input)
    }

    /// Move to play without searching: the cached best move if it is legal,
    /// or the only legal move.
    pub fn quick_move(&self, pos: &Pos) -> Option<ChessMove> {
        search::quick_move(&self.tt, pos)
    }

    /// Cached score of `pos`, or `score::NONE`.
    pub fn quick_score(&self, pos: &Pos) -> i32 {
        search::quick_score(&self.tt, pos)
    }

    /// Forget everything learned so far (new game).
    pub fn clear(&mut self) {
        self.tt.clear();
        self.tables.clear();
    }

    pub fn set_threads(&mut self, threads: usize) -> Result<(), EngineError> {
        let config = self.config.with_threads(threads);
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Resize (and clear) the transposition table.
    pub fn set_hash_mb(&mut self, hash_mb: usize) -> Result<(), EngineError> {
        let config = self.config.with_hash_mb(hash_mb);
        config.validate()?;
        self.config = config;
        self.tt.set_size(TranspositionTable::entries_for_megabytes(hash_mb));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(Engine::new(EngineConfig::default()).is_ok());
        assert_eq!(
            Engine::new(EngineConfig::default().with_threads(0)).err(),
            Some(EngineError::InvalidThreads(0))
        );
        assert_eq!(
            Engine::new(EngineConfig::default().with_threads(65)).err(),
            Some(EngineError::InvalidThreads(65))
        );
        assert_eq!(
            Engine::new(EngineConfig::default().with_hash_mb(0)).err(),
            Some(EngineError::InvalidHash)
        );
    }

    #[test]
    fn test_all_cores_is_valid() {
        let config = EngineConfig::all_cores();
        assert!(config.threads >= 1);
        assert!(Engine::new(config.with_hash_mb(1)).is_ok());
    }

    #[test]
    fn test_set_hash_rounds_down() {
        let mut engine = Engine::new(EngineConfig::default().with_hash_mb(1)).unwrap();
        engine.set_hash_mb(3).unwrap();
        assert_eq!(engine.tt().size(), TranspositionTable::entries_for_megabytes(2));
        assert!(engine.set_hash_mb(0).is_err());
        assert_eq!(engine.config().hash_mb, 3);
    }

    #[test]
    fn test_bad_fen_is_reported() {
        let mut engine = Engine::new(EngineConfig::default().with_hash_mb(1)).unwrap();
        let mut output = SearchOutput::new();
        let err = engine
            .search_fen(&mut output, "garbage", &SearchInput::depth(1))
            .unwrap_err();
        assert!(matches!(err, EngineError::Position(PosError::InvalidFen { .. })));
    }
}
