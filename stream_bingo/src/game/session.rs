//! The authoritative state machine for one live game session.
//!
//! A session is `live` until it transitions to `ended`; there is no in-place
//! restart. Restart is create-over-existing: a fresh session supersedes the
//! ended one, carrying forward only the settings attached to the game name.
//!
//! The session is a short-lived in-memory projection of a durable snapshot.
//! Rebuilding from [`GameSnapshot`] is lossless for pool, history, ended
//! state, and winner fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::balls::{Ball, BallEngine};
use super::cards::{Card, WinMode};
use super::errors::GameError;

/// The persisted representation of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub owner_id: i64,
    pub name: String,
    pub pool: Vec<Ball>,
    pub history: Vec<Ball>,
    pub ended: bool,
    pub winner_card_id: Option<i64>,
    pub winner_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One live bingo session
#[derive(Debug, Clone)]
pub struct GameSession {
    /// Identifier of the owning user, immutable for the session's lifetime
    owner_id: i64,

    /// Unique game name, the session's lookup key
    name: String,

    /// Ball pool and call history
    balls: BallEngine,

    /// Once set, no further calls are accepted until a restart supersedes
    /// this session
    ended: bool,

    /// Winning card, set at most once while transitioning to ended
    winner_card_id: Option<i64>,

    /// Name of the winning player
    winner_name: Option<String>,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GameSession {
    /// Create a fresh live session with a newly shuffled pool
    pub fn create(owner_id: i64, name: &str) -> Self {
        let now = Utc::now();

        Self {
            owner_id,
            name: name.to_string(),
            balls: BallEngine::new(),
            ended: false,
            winner_card_id: None,
            winner_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a session from its persisted snapshot
    pub fn from_snapshot(snapshot: GameSnapshot) -> Self {
        Self {
            owner_id: snapshot.owner_id,
            name: snapshot.name,
            balls: BallEngine::from_parts(snapshot.pool, snapshot.history),
            ended: snapshot.ended,
            winner_card_id: snapshot.winner_card_id,
            winner_name: snapshot.winner_name,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        }
    }

    /// The persisted representation of this session
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            owner_id: self.owner_id,
            name: self.name.clone(),
            pool: self.balls.pool().to_vec(),
            history: self.balls.history().to_vec(),
            ended: self.ended,
            winner_card_id: self.winner_card_id,
            winner_name: self.winner_name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Draw the next number
    ///
    /// # Errors
    ///
    /// Returns [`GameError::GameEnded`] on an ended session and
    /// [`GameError::PoolExhausted`] when all numbers have been called; in
    /// both cases the pool and history are untouched.
    pub fn call_number(&mut self) -> Result<Ball, GameError> {
        if self.ended {
            return Err(GameError::GameEnded);
        }

        let number = self.balls.call_next()?;
        self.updated_at = Utc::now();

        Ok(number)
    }

    /// Check a card against the authoritative call history
    ///
    /// On the first win the session transitions to ended and records the
    /// winner. Checking an already-ended session is a no-op returning false,
    /// so duplicate late-arriving win signals are safe.
    pub fn check_for_winner(&mut self, card: &Card, mode: WinMode) -> bool {
        if self.ended {
            return false;
        }

        if !card.grid.check_win(self.balls.history(), mode) {
            return false;
        }

        self.ended = true;
        self.winner_card_id = Some(card.id);
        self.winner_name = Some(card.holder_name.clone());
        self.updated_at = Utc::now();

        true
    }

    /// Force the session to ended without a winner; idempotent
    pub fn end(&mut self) {
        if self.ended {
            return;
        }

        self.ended = true;
        self.updated_at = Utc::now();
    }

    pub fn owner_id(&self) -> i64 {
        self.owner_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn is_exhausted(&self) -> bool {
        self.balls.is_exhausted()
    }

    pub fn history(&self) -> &[Ball] {
        self.balls.history()
    }

    pub fn winner_card_id(&self) -> Option<i64> {
        self.winner_card_id
    }

    pub fn winner_name(&self) -> Option<&str> {
        self.winner_name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::balls::BALL_COUNT;
    use crate::game::cards::{CENTER_CELL, Cell, GRID_SIZE, Grid};

    fn card_with_grid(grid: Grid) -> Card {
        Card {
            id: 7,
            game_name: "demo1".to_string(),
            holder_id: 42,
            holder_name: "viewer".to_string(),
            grid,
        }
    }

    /// A grid whose first row matches the first five history values
    fn winning_card(session: &GameSession) -> Card {
        let mut cells = [Cell::Free; GRID_SIZE];
        for (index, value) in session.history().iter().take(5).enumerate() {
            cells[index] = Cell::Number(*value);
        }
        // Fill the rest with values that can never be called.
        for (index, cell) in cells.iter_mut().enumerate().skip(5) {
            if index != CENTER_CELL {
                *cell = Cell::Number(0);
            }
        }
        card_with_grid(Grid(cells))
    }

    #[test]
    fn test_call_sequence() {
        let mut session = GameSession::create(1, "demo1");

        let first = session.call_number().unwrap();
        assert!((1..=75).contains(&first));
        assert_eq!(session.history(), &[first]);

        let second = session.call_number().unwrap();
        assert_ne!(first, second);
        assert_eq!(session.history(), &[first, second]);
    }

    #[test]
    fn test_call_after_end_fails_without_mutation() {
        let mut session = GameSession::create(1, "demo1");
        session.call_number().unwrap();
        session.end();

        let before = session.snapshot();
        assert_eq!(session.call_number(), Err(GameError::GameEnded));

        let after = session.snapshot();
        assert_eq!(after.pool, before.pool);
        assert_eq!(after.history, before.history);
    }

    #[test]
    fn test_winner_transition_is_terminal() {
        let mut session = GameSession::create(1, "demo1");
        for _ in 0..5 {
            session.call_number().unwrap();
        }

        let card = winning_card(&session);
        assert!(session.check_for_winner(&card, WinMode::Line));
        assert!(session.is_ended());
        assert_eq!(session.winner_card_id(), Some(card.id));
        assert_eq!(session.winner_name(), Some("viewer"));

        // A duplicate late-arriving win signal is a no-op, not an error.
        let mut other = card.clone();
        other.id = 8;
        other.holder_name = "latecomer".to_string();
        assert!(!session.check_for_winner(&other, WinMode::Line));
        assert_eq!(session.winner_card_id(), Some(card.id));
        assert_eq!(session.winner_name(), Some("viewer"));
    }

    #[test]
    fn test_end_is_idempotent() {
        let mut session = GameSession::create(1, "demo1");
        session.end();
        session.end();
        assert!(session.is_ended());
        assert_eq!(session.winner_name(), None);
    }

    #[test]
    fn test_snapshot_round_trip_is_lossless() {
        let mut session = GameSession::create(3, "demo1");
        for _ in 0..10 {
            session.call_number().unwrap();
        }
        session.end();

        let rebuilt = GameSession::from_snapshot(session.snapshot());
        assert_eq!(rebuilt.owner_id(), 3);
        assert_eq!(rebuilt.name(), "demo1");
        assert_eq!(rebuilt.history(), session.history());
        assert!(rebuilt.is_ended());
        assert_eq!(rebuilt.winner_name(), None);
    }

    #[test]
    fn test_exhaustion_reached_after_seventy_five_calls() {
        let mut session = GameSession::create(1, "demo1");
        for _ in 0..BALL_COUNT {
            session.call_number().unwrap();
        }
        assert!(session.is_exhausted());
        assert_eq!(session.call_number(), Err(GameError::PoolExhausted));
    }
}
