//! Room actor message and event types.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};

use crate::game::balls::Ball;
use crate::game::cards::{Card, WinMode};
use crate::game::errors::GameError;
use crate::game::settings::{GameSettings, GameSettingsPatch};

use super::timers::TimerKind;

/// Process-unique identifier for one realtime connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl ConnId {
    /// Allocate the next connection id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The role a connection plays in a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// May originate timer status frames; its presence arms automation
    Host,
    /// Read-only observer
    Player,
}

/// Messages that can be sent to a room actor
#[derive(Debug)]
pub enum RoomMessage {
    /// Join the room; the snapshot is returned synchronously so a
    /// reconnecting client catches up without event replay
    Join {
        conn_id: ConnId,
        role: Role,
        user_id: i64,
        sender: mpsc::Sender<GameEvent>,
        response: oneshot::Sender<Result<RoomSnapshot, GameError>>,
    },

    /// Leave the room; host departure cancels automation timers
    Leave { conn_id: ConnId },

    /// Draw the next number (host action)
    CallNumber {
        user_id: i64,
        response: oneshot::Sender<Result<CalledNumber, GameError>>,
    },

    /// Force the game to ended without a winner (host action)
    EndGame {
        user_id: i64,
        response: oneshot::Sender<Result<(), GameError>>,
    },

    /// Supersede the ended session with a fresh one (host action)
    Restart {
        user_id: i64,
        response: oneshot::Sender<Result<RoomSnapshot, GameError>>,
    },

    /// Validate a card against the authoritative call history
    CheckCard {
        card: Card,
        mode: WinMode,
        response: oneshot::Sender<Result<bool, GameError>>,
    },

    /// Merge a partial settings update (host action)
    UpdateSettings {
        user_id: i64,
        patch: GameSettingsPatch,
        response: oneshot::Sender<Result<GameSettings, GameError>>,
    },

    /// Fetch the current room snapshot
    GetSnapshot {
        response: oneshot::Sender<RoomSnapshot>,
    },

    /// Mirror a host-side countdown to the room (informational only)
    TimerStatus {
        conn_id: ConnId,
        kind: TimerKind,
        enabled: bool,
        remaining_secs: u32,
    },
}

/// Events broadcast to room members, in commit order
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GameEvent {
    /// A number was drawn
    NumberCalled { letter: char, number: Ball },

    /// The game ended, with a winner when one was validated
    GameOver { winner_name: Option<String> },

    /// A restart superseded the session; discard local call history and marks
    ResetGame,

    /// A player joined the room
    AddPlayer { player_count: usize },

    /// Host-side countdown mirror, not authoritative
    Timer {
        kind: TimerKind,
        enabled: bool,
        remaining_secs: u32,
    },
}

/// The full catch-up state delivered on join
#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub game_name: String,
    pub settings: GameSettings,
    pub history: Vec<Ball>,
    pub ended: bool,
    pub winner_name: Option<String>,
    pub player_count: usize,
}

/// The result of a successful call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalledNumber {
    pub number: Ball,
    pub letter: char,
}

/// Aggregate game statistics
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GameStats {
    pub card_count: i64,
}
