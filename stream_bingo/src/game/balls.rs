//! Ball pool and call history for a single bingo session.
//!
//! The engine owns the 75-ball pool as a shuffled stack and the append-only
//! call history. At every point `pool ∪ history == {1..=75}` and the two are
//! disjoint; `call_next` is the only mutating entry point.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::errors::GameError;

/// A single ball value in 1..=75
pub type Ball = u8;

/// Total number of balls in a bingo pool
pub const BALL_COUNT: usize = 75;

/// The shuffled ball pool and ordered call history for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallEngine {
    /// Values not yet called, drawn from the end
    pool: Vec<Ball>,

    /// Values already called, in call order
    history: Vec<Ball>,
}

impl BallEngine {
    /// Create an engine with a freshly shuffled pool and an empty history
    pub fn new() -> Self {
        Self::with_rng(&mut rand::rng())
    }

    /// Create an engine using the provided RNG for the shuffle
    pub fn with_rng<R: Rng>(rng: &mut R) -> Self {
        let mut pool: Vec<Ball> = (1..=BALL_COUNT as Ball).collect();
        pool.shuffle(rng);

        Self {
            pool,
            history: Vec::new(),
        }
    }

    /// Rebuild an engine from a persisted pool and history
    ///
    /// The caller guarantees the two lists came from a row this engine wrote,
    /// so together they form a permutation of 1..=75.
    pub fn from_parts(pool: Vec<Ball>, history: Vec<Ball>) -> Self {
        Self { pool, history }
    }

    /// Remove one value from the pool and append it to the call history
    ///
    /// # Errors
    ///
    /// Returns [`GameError::PoolExhausted`] if all values have been called.
    pub fn call_next(&mut self) -> Result<Ball, GameError> {
        let number = self.pool.pop().ok_or(GameError::PoolExhausted)?;
        self.history.push(number);

        Ok(number)
    }

    /// The column letter for a ball value
    ///
    /// 1-15 is B, 16-30 is I, 31-45 is N, 46-60 is G, 61-75 is O.
    pub fn letter_for(number: Ball) -> char {
        match number {
            1..=15 => 'B',
            16..=30 => 'I',
            31..=45 => 'N',
            46..=60 => 'G',
            _ => 'O',
        }
    }

    /// True when every value has been called
    pub fn is_exhausted(&self) -> bool {
        self.pool.is_empty()
    }

    /// Values not yet called
    pub fn pool(&self) -> &[Ball] {
        &self.pool
    }

    /// Values called so far, in call order
    pub fn history(&self) -> &[Ball] {
        &self.history
    }
}

impl Default for BallEngine {
    fn default() -> Self {
        Self::new()
    }
}
