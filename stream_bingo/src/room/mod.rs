//! Realtime room layer.
//!
//! Every game name maps to at most one [`GameRoomActor`], spawned lazily by
//! the [`RoomRegistry`]. The actor serializes all mutations for its game and
//! broadcasts the resulting [`GameEvent`]s to connected members; clients that
//! reconnect catch up from a [`RoomSnapshot`] instead of replayed events.

pub mod actor;
pub mod messages;
pub mod registry;
pub mod timers;

pub use actor::{GameRoomActor, RoomHandle};
pub use messages::{CalledNumber, ConnId, GameEvent, GameStats, Role, RoomMessage, RoomSnapshot};
pub use registry::RoomRegistry;
pub use timers::{AutomationScheduler, RESTART_GRACE, TimerKind};

use crate::db::StoreError;
use crate::game::errors::GameError;

impl From<StoreError> for GameError {
    fn from(e: StoreError) -> Self {
        GameError::Storage(e.to_string())
    }
}
