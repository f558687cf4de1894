//! Core engine for a streaming bingo service.
//!
//! A broadcaster hosts a 75-ball bingo game under a unique game name;
//! viewers hold generated cards and follow the calls in realtime. This crate
//! provides the game rules ([`game`]), the per-game room actors and registry
//! ([`room`]), durable storage ([`db`]), and token resolution ([`auth`]).
//! Serving HTTP and WebSocket traffic is the binary crate's job.

pub mod auth;
pub mod db;
pub mod game;
pub mod room;

pub use auth::{AuthError, AuthManager};
pub use db::{Database, DatabaseConfig, GameStore, MemoryStore, PgGameStore, UserStore};
pub use game::{
    BALL_COUNT, Ball, BallEngine, Card, Cell, GameError, GameSession, GameSettings,
    GameSettingsPatch, GameSnapshot, Grid, WinMode,
};
pub use room::{
    CalledNumber, ConnId, GameEvent, GameStats, Role, RoomHandle, RoomMessage, RoomRegistry,
    RoomSnapshot, TimerKind,
};
