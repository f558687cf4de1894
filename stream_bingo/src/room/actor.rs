//! Room actor implementation with async message handling.
//!
//! One actor owns the authoritative [`GameSession`] for a game name together
//! with the room membership (one conventional host connection plus any number
//! of player connections) and the automation timers. The actor's inbox is the
//! per-game serialization point: mutating operations are applied one at a
//! time, and the resulting events are fanned out to members in commit order.
//!
//! Mutations follow a persistence-before-commit discipline: the change is
//! staged on a copy of the session, the snapshot is saved, and only on
//! success does the staged session replace the authoritative one. A failed
//! save therefore surfaces as a failed mutation and never divulges a call
//! that could be lost on crash.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot},
    time::{Duration, Instant, interval},
};

use crate::db::GameStore;
use crate::game::balls::BallEngine;
use crate::game::cards::{Card, WinMode};
use crate::game::errors::GameError;
use crate::game::session::GameSession;
use crate::game::settings::{GameSettings, GameSettingsPatch};

use super::messages::{
    CalledNumber, ConnId, GameEvent, Role, RoomMessage, RoomSnapshot,
};
use super::timers::{AutomationScheduler, TimerKind};

/// Room actor handle for sending messages
#[derive(Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    name: String,
}

impl RoomHandle {
    pub fn new(sender: mpsc::Sender<RoomMessage>, name: String) -> Self {
        Self { sender, name }
    }

    /// The game name this room serves
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a message to the room
    pub async fn send(&self, message: RoomMessage) -> Result<(), GameError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| GameError::GameNotFound)
    }

    /// Fetch the current room snapshot
    pub async fn snapshot(&self) -> Result<RoomSnapshot, GameError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::GetSnapshot { response: tx }).await?;
        rx.await.map_err(|_| GameError::GameNotFound)
    }
}

/// One member of the room
struct Member {
    role: Role,
    sender: mpsc::Sender<GameEvent>,
}

/// Room actor owning the authoritative session for a single game
pub struct GameRoomActor {
    /// Game name, the room's address
    name: String,

    /// The authoritative session
    session: GameSession,

    /// Settings attached to the game name; survive restarts
    settings: GameSettings,

    /// Durable source of truth
    store: Arc<dyn GameStore>,

    /// Message inbox
    inbox: mpsc::Receiver<RoomMessage>,

    /// Connected host and player connections
    members: HashMap<ConnId, Member>,

    /// Automation timer deadlines
    scheduler: AutomationScheduler,
}

impl GameRoomActor {
    /// Create a new room actor and its handle
    pub fn new(
        session: GameSession,
        settings: GameSettings,
        store: Arc<dyn GameStore>,
    ) -> (Self, RoomHandle) {
        let (sender, inbox) = mpsc::channel(100);
        let name = session.name().to_string();

        let actor = Self {
            name: name.clone(),
            session,
            settings,
            store,
            inbox,
            members: HashMap::new(),
            scheduler: AutomationScheduler::new(),
        };

        let handle = RoomHandle::new(sender, name);

        (actor, handle)
    }

    /// Run the room actor event loop
    pub async fn run(mut self) {
        log::info!("room '{}' starting", self.name);

        let mut tick_interval = interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                message = self.inbox.recv() => {
                    match message {
                        Some(message) => self.handle_message(message).await,
                        None => break,
                    }
                }

                _ = tick_interval.tick() => {
                    self.tick().await;
                }
            }
        }

        log::info!("room '{}' closed", self.name);
    }

    async fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Join {
                conn_id,
                role,
                user_id,
                sender,
                response,
            } => {
                let result = self.handle_join(conn_id, role, user_id, sender);
                let _ = response.send(result);
            }

            RoomMessage::Leave { conn_id } => {
                self.handle_leave(conn_id);
            }

            RoomMessage::CallNumber { user_id, response } => {
                let result = match self.authorize(user_id) {
                    Ok(()) => self.call_number().await,
                    Err(e) => Err(e),
                };
                let _ = response.send(result);
            }

            RoomMessage::EndGame { user_id, response } => {
                let result = match self.authorize(user_id) {
                    Ok(()) => self.end_game().await,
                    Err(e) => Err(e),
                };
                let _ = response.send(result);
            }

            RoomMessage::Restart { user_id, response } => {
                let result = match self.authorize(user_id) {
                    Ok(()) if !self.session.is_ended() => Err(GameError::DuplicateGame),
                    Ok(()) => self.restart().await,
                    Err(e) => Err(e),
                };
                let _ = response.send(result);
            }

            RoomMessage::CheckCard {
                card,
                mode,
                response,
            } => {
                let result = self.check_card(&card, mode).await;
                let _ = response.send(result);
            }

            RoomMessage::UpdateSettings {
                user_id,
                patch,
                response,
            } => {
                let result = match self.authorize(user_id) {
                    Ok(()) => self.update_settings(patch).await,
                    Err(e) => Err(e),
                };
                let _ = response.send(result);
            }

            RoomMessage::GetSnapshot { response } => {
                let _ = response.send(self.room_snapshot());
            }

            RoomMessage::TimerStatus {
                conn_id,
                kind,
                enabled,
                remaining_secs,
            } => {
                // Only a host connection may mirror countdowns to viewers.
                let from_host = self
                    .members
                    .get(&conn_id)
                    .is_some_and(|member| member.role == Role::Host);

                if from_host {
                    self.broadcast(GameEvent::Timer {
                        kind,
                        enabled,
                        remaining_secs,
                    });
                } else {
                    log::debug!("room '{}': dropping timer status from non-host", self.name);
                }
            }
        }
    }

    /// Run any due automation timers, re-checking preconditions at fire time
    async fn tick(&mut self) {
        for kind in self.scheduler.take_due(Instant::now()) {
            let result = match kind {
                TimerKind::AutoCall => {
                    if self.session.is_ended() || self.session.is_exhausted() {
                        continue;
                    }
                    self.call_number().await.map(|_| ())
                }
                TimerKind::AutoEnd => {
                    if self.session.is_ended() || !self.session.is_exhausted() {
                        continue;
                    }
                    self.end_game().await
                }
                TimerKind::AutoRestart => {
                    if !self.session.is_ended() {
                        continue;
                    }
                    self.restart().await.map(|_| ())
                }
            };

            // A stale firing is an expected race, not a fault.
            if let Err(e) = result {
                log::debug!("room '{}': {:?} skipped: {}", self.name, kind, e);
            }
        }

        self.rearm_timers();
    }

    fn authorize(&self, user_id: i64) -> Result<(), GameError> {
        if user_id == self.session.owner_id() {
            Ok(())
        } else {
            Err(GameError::Unauthorized)
        }
    }

    fn host_connected(&self) -> bool {
        self.members
            .values()
            .any(|member| member.role == Role::Host)
    }

    fn player_count(&self) -> usize {
        self.members
            .values()
            .filter(|member| member.role == Role::Player)
            .count()
    }

    fn rearm_timers(&mut self) {
        self.scheduler.rearm(
            &self.session,
            &self.settings,
            self.host_connected(),
            Instant::now(),
        );
    }

    fn room_snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            game_name: self.name.clone(),
            settings: self.settings.clone(),
            history: self.session.history().to_vec(),
            ended: self.session.is_ended(),
            winner_name: self.session.winner_name().map(str::to_string),
            player_count: self.player_count(),
        }
    }

    /// Fan an event out to all members in commit order
    fn broadcast(&mut self, event: GameEvent) {
        let name = &self.name;
        self.members.retain(|conn_id, member| {
            match member.sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // A member that cannot keep up is dropped rather than
                    // skipped; reconnecting resyncs it through a snapshot,
                    // while a silently missed event would diverge it for
                    // the rest of the session.
                    log::warn!(
                        "room '{}': member {:?} cannot keep up, dropping connection",
                        name,
                        conn_id
                    );
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::debug!("room '{}': member {:?} disconnected", name, conn_id);
                    false
                }
            }
        });
    }

    /// Persist a staged session and make it authoritative
    async fn commit(&mut self, staged: GameSession) -> Result<(), GameError> {
        self.store.save_game(&staged.snapshot()).await?;
        self.session = staged;

        Ok(())
    }

    fn handle_join(
        &mut self,
        conn_id: ConnId,
        role: Role,
        user_id: i64,
        sender: mpsc::Sender<GameEvent>,
    ) -> Result<RoomSnapshot, GameError> {
        if role == Role::Host {
            // A second host connection is tolerated, not evicted; commands
            // from either resolve last-write-wins on the session.
            self.authorize(user_id)?;
        }

        // Announce to the rest of the room before inserting, so the joiner
        // does not see its own addplayer; the snapshot already carries the
        // count including them.
        if role == Role::Player {
            self.broadcast(GameEvent::AddPlayer {
                player_count: self.player_count() + 1,
            });
        }

        self.members.insert(conn_id, Member { role, sender });
        self.rearm_timers();

        Ok(self.room_snapshot())
    }

    fn handle_leave(&mut self, conn_id: ConnId) {
        self.members.remove(&conn_id);

        // Host departure disarms automation; player departure only shrinks
        // the membership set.
        self.rearm_timers();
    }

    async fn call_number(&mut self) -> Result<CalledNumber, GameError> {
        let mut staged = self.session.clone();
        let number = staged.call_number()?;
        self.commit(staged).await?;

        let letter = BallEngine::letter_for(number);
        self.broadcast(GameEvent::NumberCalled { letter, number });
        self.rearm_timers();

        log::info!("room '{}': called {}{}", self.name, letter, number);

        Ok(CalledNumber { number, letter })
    }

    async fn end_game(&mut self) -> Result<(), GameError> {
        if self.session.is_ended() {
            return Ok(());
        }

        let mut staged = self.session.clone();
        staged.end();
        self.commit(staged).await?;

        self.broadcast(GameEvent::GameOver { winner_name: None });
        self.rearm_timers();

        log::info!("room '{}': game ended without a winner", self.name);

        Ok(())
    }

    async fn restart(&mut self) -> Result<RoomSnapshot, GameError> {
        // Create-over-existing: a fresh session with a newly shuffled pool
        // supersedes the ended one. Settings stay attached to the name.
        let staged = GameSession::create(self.session.owner_id(), &self.name);
        self.commit(staged).await?;

        self.broadcast(GameEvent::ResetGame);
        self.rearm_timers();

        log::info!("room '{}': restarted", self.name);

        Ok(self.room_snapshot())
    }

    async fn check_card(&mut self, card: &Card, mode: WinMode) -> Result<bool, GameError> {
        if card.game_name != self.name {
            return Err(GameError::CardNotFound);
        }

        // Late duplicate win signals on an ended session are a no-op.
        if self.session.is_ended() {
            return Ok(false);
        }

        let mut staged = self.session.clone();
        if !staged.check_for_winner(card, mode) {
            return Ok(false);
        }

        self.commit(staged).await?;

        let winner_name = self.session.winner_name().map(str::to_string);
        log::info!(
            "room '{}': card {} wins for {:?}",
            self.name,
            card.id,
            winner_name
        );
        self.broadcast(GameEvent::GameOver { winner_name });
        self.rearm_timers();

        Ok(true)
    }

    async fn update_settings(
        &mut self,
        patch: GameSettingsPatch,
    ) -> Result<GameSettings, GameError> {
        let mut staged = self.settings.clone();
        staged.merge(patch);

        self.store.save_settings(&self.name, &staged).await?;
        self.settings = staged;

        // Countdowns restart from the updated configuration.
        self.scheduler.disarm_all();
        self.rearm_timers();

        Ok(self.settings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::game::balls::BALL_COUNT;

    const OWNER_ID: i64 = 7;
    const GAME_NAME: &str = "demo1";

    fn spawn_room(store: Arc<MemoryStore>) -> RoomHandle {
        let session = GameSession::create(OWNER_ID, GAME_NAME);
        let (actor, handle) = GameRoomActor::new(session, GameSettings::default(), store);
        tokio::spawn(actor.run());
        handle
    }

    async fn join(
        handle: &RoomHandle,
        role: Role,
        user_id: i64,
    ) -> (RoomSnapshot, mpsc::Receiver<GameEvent>) {
        let (event_tx, event_rx) = mpsc::channel(128);
        let (tx, rx) = oneshot::channel();
        handle
            .send(RoomMessage::Join {
                conn_id: ConnId::next(),
                role,
                user_id,
                sender: event_tx,
                response: tx,
            })
            .await
            .unwrap();

        (rx.await.unwrap().unwrap(), event_rx)
    }

    async fn call(handle: &RoomHandle, user_id: i64) -> Result<CalledNumber, GameError> {
        let (tx, rx) = oneshot::channel();
        handle
            .send(RoomMessage::CallNumber {
                user_id,
                response: tx,
            })
            .await
            .unwrap();
        rx.await.unwrap()
    }

    async fn end(handle: &RoomHandle, user_id: i64) -> Result<(), GameError> {
        let (tx, rx) = oneshot::channel();
        handle
            .send(RoomMessage::EndGame {
                user_id,
                response: tx,
            })
            .await
            .unwrap();
        rx.await.unwrap()
    }

    async fn restart(handle: &RoomHandle, user_id: i64) -> Result<RoomSnapshot, GameError> {
        let (tx, rx) = oneshot::channel();
        handle
            .send(RoomMessage::Restart {
                user_id,
                response: tx,
            })
            .await
            .unwrap();
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_calls_broadcast_in_commit_order() {
        let handle = spawn_room(Arc::new(MemoryStore::new()));
        let (_, mut events) = join(&handle, Role::Player, 99).await;

        let mut called = Vec::new();
        for _ in 0..3 {
            called.push(call(&handle, OWNER_ID).await.unwrap().number);
        }

        for expected in called {
            match events.recv().await.unwrap() {
                GameEvent::NumberCalled { number, letter } => {
                    assert_eq!(number, expected);
                    assert_eq!(letter, BallEngine::letter_for(number));
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_join_snapshot_catches_up_without_replay() {
        let handle = spawn_room(Arc::new(MemoryStore::new()));

        let mut called = Vec::new();
        for _ in 0..10 {
            called.push(call(&handle, OWNER_ID).await.unwrap().number);
        }

        let (snapshot, mut events) = join(&handle, Role::Player, 99).await;
        assert_eq!(snapshot.history, called);
        assert!(!snapshot.ended);
        assert_eq!(snapshot.player_count, 1);

        // No replay of the ten earlier calls follows the snapshot.
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_non_owner_cannot_call_or_end() {
        let handle = spawn_room(Arc::new(MemoryStore::new()));

        assert_eq!(call(&handle, 1234).await, Err(GameError::Unauthorized));
        assert_eq!(end(&handle, 1234).await, Err(GameError::Unauthorized));

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.history.is_empty());
        assert!(!snapshot.ended);
    }

    #[tokio::test]
    async fn test_failed_save_does_not_advance_history() {
        let store = Arc::new(MemoryStore::new());
        let handle = spawn_room(store.clone());

        call(&handle, OWNER_ID).await.unwrap();

        store.set_fail_saves(true);
        assert!(matches!(
            call(&handle, OWNER_ID).await,
            Err(GameError::Storage(_))
        ));
        assert_eq!(handle.snapshot().await.unwrap().history.len(), 1);

        store.set_fail_saves(false);
        call(&handle, OWNER_ID).await.unwrap();
        assert_eq!(handle.snapshot().await.unwrap().history.len(), 2);
    }

    #[tokio::test]
    async fn test_restart_resets_history_and_notifies_members() {
        let handle = spawn_room(Arc::new(MemoryStore::new()));
        let (_, mut events) = join(&handle, Role::Player, 99).await;

        for _ in 0..5 {
            call(&handle, OWNER_ID).await.unwrap();
        }
        assert!(matches!(
            restart(&handle, OWNER_ID).await,
            Err(GameError::DuplicateGame)
        ));

        end(&handle, OWNER_ID).await.unwrap();
        let snapshot = restart(&handle, OWNER_ID).await.unwrap();
        assert!(snapshot.history.is_empty());
        assert!(!snapshot.ended);

        // Five calls, the game-over, then the reset.
        let mut seen = Vec::new();
        for _ in 0..7 {
            seen.push(events.recv().await.unwrap());
        }
        assert!(matches!(seen[5], GameEvent::GameOver { winner_name: None }));
        assert!(matches!(seen[6], GameEvent::ResetGame));
    }

    #[tokio::test]
    async fn test_winning_card_ends_game_and_names_winner() {
        let store = Arc::new(MemoryStore::new());
        let handle = spawn_room(store.clone());
        let (_, mut events) = join(&handle, Role::Player, 99).await;

        // With every number called, any card is a blackout winner.
        for _ in 0..BALL_COUNT {
            call(&handle, OWNER_ID).await.unwrap();
        }

        let card = store
            .insert_card(GAME_NAME, 99, "viewer", &crate::game::cards::Grid::generate(true))
            .await
            .unwrap();

        let (tx, rx) = oneshot::channel();
        handle
            .send(RoomMessage::CheckCard {
                card: card.clone(),
                mode: WinMode::Blackout,
                response: tx,
            })
            .await
            .unwrap();
        assert!(rx.await.unwrap().unwrap());

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.ended);
        assert_eq!(snapshot.winner_name.as_deref(), Some("viewer"));

        // A second win signal on the ended session is a no-op.
        let (tx, rx) = oneshot::channel();
        handle
            .send(RoomMessage::CheckCard {
                card,
                mode: WinMode::Blackout,
                response: tx,
            })
            .await
            .unwrap();
        assert!(!rx.await.unwrap().unwrap());

        for _ in 0..BALL_COUNT {
            events.recv().await.unwrap();
        }
        match events.recv().await.unwrap() {
            GameEvent::GameOver { winner_name } => {
                assert_eq!(winner_name.as_deref(), Some("viewer"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_member_is_evicted_instead_of_skipping_events() {
        let handle = spawn_room(Arc::new(MemoryStore::new()));
        let (_, mut healthy) = join(&handle, Role::Player, 99).await;

        // A member whose channel holds only two events.
        let (slow_tx, mut slow_rx) = mpsc::channel(2);
        let (tx, rx) = oneshot::channel();
        handle
            .send(RoomMessage::Join {
                conn_id: ConnId::next(),
                role: Role::Player,
                user_id: 100,
                sender: slow_tx,
                response: tx,
            })
            .await
            .unwrap();
        rx.await.unwrap().unwrap();

        for _ in 0..5 {
            call(&handle, OWNER_ID).await.unwrap();
        }

        // The slow member got the calls that fit and then lost its room
        // membership, so its stream ends instead of silently skipping the
        // rest.
        let mut delivered = 0;
        while slow_rx.recv().await.is_some() {
            delivered += 1;
        }
        assert_eq!(delivered, 2);
        assert_eq!(handle.snapshot().await.unwrap().player_count, 1);

        // The healthy member saw the join announcement and every call.
        assert!(matches!(
            healthy.recv().await.unwrap(),
            GameEvent::AddPlayer { player_count: 2 }
        ));
        for _ in 0..5 {
            assert!(matches!(
                healthy.recv().await.unwrap(),
                GameEvent::NumberCalled { .. }
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_end_fires_once_when_pool_is_exhausted() {
        let store = Arc::new(MemoryStore::new());
        let session = GameSession::create(OWNER_ID, GAME_NAME);
        let settings = GameSettings {
            auto_end_enabled: true,
            auto_end_interval: 30,
            ..GameSettings::default()
        };
        let (actor, handle) = GameRoomActor::new(session, settings, store);
        tokio::spawn(actor.run());

        let (_, mut events) = join(&handle, Role::Host, OWNER_ID).await;

        for _ in 0..BALL_COUNT {
            call(&handle, OWNER_ID).await.unwrap();
        }
        assert!(!handle.snapshot().await.unwrap().ended);

        tokio::time::advance(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;

        for _ in 0..BALL_COUNT {
            assert!(matches!(
                events.recv().await.unwrap(),
                GameEvent::NumberCalled { .. }
            ));
        }
        assert!(matches!(
            events.recv().await.unwrap(),
            GameEvent::GameOver { winner_name: None }
        ));
        assert!(handle.snapshot().await.unwrap().ended);

        // The deadline was consumed when it fired; later ticks do not end
        // the game again.
        tokio::time::advance(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_restart_reopens_ended_game_after_grace() {
        let store = Arc::new(MemoryStore::new());
        let session = GameSession::create(OWNER_ID, GAME_NAME);
        let settings = GameSettings {
            auto_restart_enabled: true,
            auto_restart_interval: 10,
            ..GameSettings::default()
        };
        let (actor, handle) = GameRoomActor::new(session, settings, store);
        tokio::spawn(actor.run());

        let (_, mut events) = join(&handle, Role::Host, OWNER_ID).await;

        for _ in 0..3 {
            call(&handle, OWNER_ID).await.unwrap();
        }
        end(&handle, OWNER_ID).await.unwrap();

        // The countdown runs the configured interval plus the grace delay.
        tokio::time::advance(Duration::from_secs(16)).await;
        tokio::task::yield_now().await;

        for _ in 0..3 {
            assert!(matches!(
                events.recv().await.unwrap(),
                GameEvent::NumberCalled { .. }
            ));
        }
        assert!(matches!(
            events.recv().await.unwrap(),
            GameEvent::GameOver { winner_name: None }
        ));
        assert!(matches!(events.recv().await.unwrap(), GameEvent::ResetGame));

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.history.is_empty());
        assert!(!snapshot.ended);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_call_fires_while_host_connected() {
        let store = Arc::new(MemoryStore::new());
        let session = GameSession::create(OWNER_ID, GAME_NAME);
        let settings = GameSettings {
            auto_call_enabled: true,
            auto_call_interval: 20,
            ..GameSettings::default()
        };
        let (actor, handle) = GameRoomActor::new(session, settings, store);
        tokio::spawn(actor.run());

        let (_, mut events) = join(&handle, Role::Host, OWNER_ID).await;

        tokio::time::advance(Duration::from_secs(21)).await;
        tokio::task::yield_now().await;

        match events.recv().await.unwrap() {
            GameEvent::NumberCalled { .. } => {}
            other => panic!("unexpected event {other:?}"),
        }
        assert!(!handle.snapshot().await.unwrap().history.is_empty());
    }
}
