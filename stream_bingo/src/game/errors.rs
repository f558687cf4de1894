//! Game error types.

use thiserror::Error;

/// Errors raised by the game engine and session operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameError {
    /// Mutating action attempted on an ended session
    #[error("the game has ended")]
    GameEnded,

    /// Call attempted with no remaining balls
    #[error("all numbers have been called")]
    PoolExhausted,

    /// Lookup by name or token matched nothing
    #[error("game not found")]
    GameNotFound,

    /// Card lookup matched nothing
    #[error("card not found")]
    CardNotFound,

    /// Mutating action attempted by a non-owner
    #[error("you do not own this game")]
    Unauthorized,

    /// Create attempted while a live session already exists for the name
    #[error("a game with this name is already running")]
    DuplicateGame,

    /// Persistence failed; the in-memory session was not advanced
    #[error("storage failure: {0}")]
    Storage(String),
}
