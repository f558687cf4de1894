//! Registry of live game rooms, keyed by game name.
//!
//! The registry owns room lifecycle: it spawns an actor lazily when a
//! persisted game is first addressed after a process start, routes operations
//! to the owning actor, and rehydrates session and settings from the store so
//! a restart of the process loses no committed state.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::db::GameStore;
use crate::game::cards::{Card, Grid, WinMode};
use crate::game::errors::GameError;
use crate::game::session::GameSession;
use crate::game::settings::{GameSettings, GameSettingsPatch};

use super::actor::{GameRoomActor, RoomHandle};
use super::messages::{
    CalledNumber, ConnId, GameEvent, GameStats, Role, RoomMessage, RoomSnapshot,
};

/// Registry routing operations to per-game room actors
pub struct RoomRegistry {
    store: Arc<dyn GameStore>,
    rooms: RwLock<HashMap<String, RoomHandle>>,
}

impl RoomRegistry {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self {
            store,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new game owned by `owner_id`, or restart their ended one
    ///
    /// A live game under the same name fails with [`GameError::DuplicateGame`].
    /// Restarting through the existing actor keeps the room membership, so
    /// connected players see the reset rather than a dead room.
    pub async fn create_game(
        &self,
        owner_id: i64,
        name: &str,
    ) -> Result<RoomSnapshot, GameError> {
        // The lookup-load-save-spawn sequence holds the write lock so
        // concurrent creates for one name serialize: the second caller sees
        // the first one's actor and fails, and the persisted row always
        // matches the session the spawned actor owns.
        let mut rooms = self.rooms.write().await;

        if let Some(handle) = rooms.get(name).cloned() {
            drop(rooms);

            let snapshot = handle.snapshot().await?;
            if snapshot.ended {
                return self.request(&handle, |tx| RoomMessage::Restart {
                    user_id: owner_id,
                    response: tx,
                })
                .await?;
            }
            return Err(GameError::DuplicateGame);
        }

        // No live actor. A persisted row under this name belongs to its
        // owner; anyone else is creating a name collision.
        if let Some(existing) = self
            .store
            .load_game(name)
            .await
            .map_err(|e| GameError::Storage(e.to_string()))?
            && existing.owner_id != owner_id
        {
            return Err(GameError::DuplicateGame);
        }

        let session = GameSession::create(owner_id, name);
        self.store
            .save_game(&session.snapshot())
            .await
            .map_err(|e| GameError::Storage(e.to_string()))?;

        let settings = self
            .store
            .load_settings(name)
            .await
            .map_err(|e| GameError::Storage(e.to_string()))?;

        let handle = self.spawn_into(&mut rooms, session, settings);
        drop(rooms);

        handle.snapshot().await
    }

    /// Resolve the room for a game name, rehydrating from the store if needed
    pub async fn ensure_room(&self, name: &str) -> Result<RoomHandle, GameError> {
        if let Some(handle) = self.lookup(name).await {
            return Ok(handle);
        }

        let snapshot = self
            .store
            .load_game(name)
            .await
            .map_err(|e| GameError::Storage(e.to_string()))?
            .ok_or(GameError::GameNotFound)?;
        let settings = self
            .store
            .load_settings(name)
            .await
            .map_err(|e| GameError::Storage(e.to_string()))?;

        Ok(self
            .spawn_room(GameSession::from_snapshot(snapshot), settings)
            .await)
    }

    /// Resolve the name of the game a user owns
    pub async fn game_for_owner(&self, owner_id: i64) -> Result<String, GameError> {
        let name = self
            .store
            .find_game_by_owner(owner_id)
            .await
            .map_err(|e| GameError::Storage(e.to_string()))?
            .ok_or(GameError::GameNotFound)?;

        Ok(name)
    }

    /// Join a room, returning the catch-up snapshot and the event stream
    pub async fn join(
        &self,
        name: &str,
        conn_id: ConnId,
        role: Role,
        user_id: i64,
    ) -> Result<(RoomSnapshot, mpsc::Receiver<GameEvent>), GameError> {
        let handle = self.ensure_room(name).await?;
        let (event_tx, event_rx) = mpsc::channel(32);

        let snapshot = self
            .request(&handle, |tx| RoomMessage::Join {
                conn_id,
                role,
                user_id,
                sender: event_tx,
                response: tx,
            })
            .await??;

        Ok((snapshot, event_rx))
    }

    /// Remove a connection from its room
    pub async fn leave(&self, name: &str, conn_id: ConnId) {
        if let Some(handle) = self.lookup(name).await {
            let _ = handle.send(RoomMessage::Leave { conn_id }).await;
        }
    }

    /// Draw the next number for a game (host action)
    pub async fn call_number(
        &self,
        name: &str,
        user_id: i64,
    ) -> Result<CalledNumber, GameError> {
        let handle = self.ensure_room(name).await?;
        self.request(&handle, |tx| RoomMessage::CallNumber {
            user_id,
            response: tx,
        })
        .await?
    }

    /// End a game without a winner (host action)
    pub async fn end_game(&self, name: &str, user_id: i64) -> Result<(), GameError> {
        let handle = self.ensure_room(name).await?;
        self.request(&handle, |tx| RoomMessage::EndGame {
            user_id,
            response: tx,
        })
        .await?
    }

    /// Merge a settings patch into a game's configuration (host action)
    pub async fn update_settings(
        &self,
        name: &str,
        user_id: i64,
        patch: GameSettingsPatch,
    ) -> Result<GameSettings, GameError> {
        let handle = self.ensure_room(name).await?;
        self.request(&handle, |tx| RoomMessage::UpdateSettings {
            user_id,
            patch,
            response: tx,
        })
        .await?
    }

    /// Issue a fresh card for a player in a game
    pub async fn issue_card(
        &self,
        name: &str,
        holder_id: i64,
        holder_name: &str,
    ) -> Result<Card, GameError> {
        // The game must exist, live or persisted.
        self.ensure_room(name).await?;

        let card = self
            .store
            .insert_card(name, holder_id, holder_name, &Grid::generate(true))
            .await?;

        Ok(card)
    }

    /// Validate a card against its game's authoritative call history
    pub async fn check_card(&self, card_id: i64, mode: WinMode) -> Result<bool, GameError> {
        let card = self
            .store
            .load_card(card_id)
            .await
            .map_err(|e| GameError::Storage(e.to_string()))?
            .ok_or(GameError::CardNotFound)?;

        let handle = self.ensure_room(&card.game_name).await?;
        self.request(&handle, |tx| RoomMessage::CheckCard {
            card,
            mode,
            response: tx,
        })
        .await?
    }

    /// Aggregate statistics for a game
    pub async fn game_stats(&self, name: &str) -> Result<GameStats, GameError> {
        self.ensure_room(name).await?;

        let card_count = self
            .store
            .card_count(name)
            .await
            .map_err(|e| GameError::Storage(e.to_string()))?;

        Ok(GameStats { card_count })
    }

    /// Current room snapshot for a game
    pub async fn snapshot(&self, name: &str) -> Result<RoomSnapshot, GameError> {
        let handle = self.ensure_room(name).await?;
        handle.snapshot().await
    }

    async fn lookup(&self, name: &str) -> Option<RoomHandle> {
        self.rooms.read().await.get(name).cloned()
    }

    async fn spawn_room(&self, session: GameSession, settings: GameSettings) -> RoomHandle {
        let mut rooms = self.rooms.write().await;

        // Another caller may have spawned the room between the read check and
        // taking the write lock.
        if let Some(handle) = rooms.get(session.name()) {
            return handle.clone();
        }

        self.spawn_into(&mut rooms, session, settings)
    }

    /// Spawn an actor and register its handle; the caller holds the lock
    fn spawn_into(
        &self,
        rooms: &mut HashMap<String, RoomHandle>,
        session: GameSession,
        settings: GameSettings,
    ) -> RoomHandle {
        let (actor, handle) = GameRoomActor::new(session, settings, self.store.clone());
        tokio::spawn(actor.run());
        rooms.insert(handle.name().to_string(), handle.clone());

        log::info!("registry: room '{}' spawned", handle.name());

        handle
    }

    async fn request<T>(
        &self,
        handle: &RoomHandle,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomMessage,
    ) -> Result<T, GameError> {
        let (tx, rx) = oneshot::channel();
        handle.send(build(tx)).await?;
        rx.await.map_err(|_| GameError::GameNotFound)
    }
}
