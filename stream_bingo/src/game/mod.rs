//! Bingo game engine - ball pool, cards, and the session state machine.
//!
//! This module provides the pure game logic with no I/O:
//! - [`balls`]: the shuffled 75-ball pool and append-only call history
//! - [`cards`]: 5x5 card generation and server-side win checking
//! - [`session`]: the authoritative live/ended state machine for one game
//! - [`settings`]: host configuration attached to a game name

pub mod balls;
pub mod cards;
pub mod errors;
pub mod session;
pub mod settings;

pub use balls::{BALL_COUNT, Ball, BallEngine};
pub use cards::{Card, Cell, Grid, WinMode};
pub use errors::GameError;
pub use session::{GameSession, GameSnapshot};
pub use settings::{GameSettings, GameSettingsPatch};
