//! Repository trait definitions for testability and dependency injection.
//!
//! [`GameStore`] is the persistence collaborator: game rows, settings keyed
//! by game name, and cards. [`UserStore`] is the slice of the identity
//! collaborator the engine consumes (token-to-user resolution only).
//! [`PgGameStore`] is the production PostgreSQL implementation;
//! [`MemoryStore`] backs tests and local development without a database.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::game::balls::Ball;
use crate::game::cards::{Card, Grid};
use crate::game::session::GameSnapshot;
use crate::game::settings::GameSettings;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row failed to parse back into its in-memory form
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations for games, settings, and cards
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Load the persisted session for a game name
    async fn load_game(&self, name: &str) -> StoreResult<Option<GameSnapshot>>;

    /// Upsert the persisted session; the row keeps pool and history in order
    async fn save_game(&self, snapshot: &GameSnapshot) -> StoreResult<()>;

    /// Delete the persisted session for a game name
    async fn delete_game(&self, name: &str) -> StoreResult<()>;

    /// Find the game name owned by a user, if any
    async fn find_game_by_owner(&self, owner_id: i64) -> StoreResult<Option<String>>;

    /// Load settings for a game name, falling back to defaults
    async fn load_settings(&self, name: &str) -> StoreResult<GameSettings>;

    /// Upsert settings for a game name; settings survive restarts
    async fn save_settings(&self, name: &str, settings: &GameSettings) -> StoreResult<()>;

    /// Create a card for a player and return it with its assigned id
    async fn insert_card(
        &self,
        game_name: &str,
        holder_id: i64,
        holder_name: &str,
        grid: &Grid,
    ) -> StoreResult<Card>;

    /// Load a card by id
    async fn load_card(&self, card_id: i64) -> StoreResult<Option<Card>>;

    /// Count the cards issued for a game name
    async fn card_count(&self, name: &str) -> StoreResult<i64>;
}

/// Token resolution consumed from the identity collaborator
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Resolve an access token to a user id
    async fn user_for_access_token(&self, token: &str) -> StoreResult<Option<i64>>;

    /// Resolve a secret game token to a user id
    async fn user_for_game_token(&self, token: &str) -> StoreResult<Option<i64>>;

    /// Replace a user's secret game token
    async fn set_game_token(&self, user_id: i64, token: &str) -> StoreResult<()>;
}

/// Encode a ball list as the stored comma-joined text
fn encode_numbers(numbers: &[Ball]) -> String {
    numbers
        .iter()
        .map(|number| number.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Decode a stored comma-joined ball list, preserving order
fn decode_numbers(text: &str) -> StoreResult<Vec<Ball>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    text.split(',')
        .map(|part| {
            part.trim()
                .parse()
                .map_err(|_| StoreError::Corrupt(format!("bad ball value {part:?}")))
        })
        .collect()
}

/// PostgreSQL implementation of [`GameStore`] and [`UserStore`]
pub struct PgGameStore {
    pool: PgPool,
}

impl PgGameStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn card_from_row(row: &sqlx::postgres::PgRow) -> StoreResult<Card> {
        let grid_text: String = row.get("grid");
        let grid = Grid::decode(&grid_text)
            .map_err(|_| StoreError::Corrupt("unparseable card grid".to_string()))?;

        Ok(Card {
            id: row.get("id"),
            game_name: row.get("game_name"),
            holder_id: row.get("holder_id"),
            holder_name: row.get("holder_name"),
            grid,
        })
    }
}

#[async_trait]
impl GameStore for PgGameStore {
    async fn load_game(&self, name: &str) -> StoreResult<Option<GameSnapshot>> {
        let row = sqlx::query(
            r#"
            SELECT owner_id, game_name, balls, called, ended,
                   winner_card_id, winner_name, created_at, updated_at
            FROM games
            WHERE game_name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let balls: String = row.get("balls");
        let called: String = row.get("called");

        Ok(Some(GameSnapshot {
            owner_id: row.get("owner_id"),
            name: row.get("game_name"),
            pool: decode_numbers(&balls)?,
            history: decode_numbers(&called)?,
            ended: row.get("ended"),
            winner_card_id: row.get("winner_card_id"),
            winner_name: row.get("winner_name"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    async fn save_game(&self, snapshot: &GameSnapshot) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO games (game_name, owner_id, balls, called, ended,
                               winner_card_id, winner_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (game_name) DO UPDATE SET
                owner_id = EXCLUDED.owner_id,
                balls = EXCLUDED.balls,
                called = EXCLUDED.called,
                ended = EXCLUDED.ended,
                winner_card_id = EXCLUDED.winner_card_id,
                winner_name = EXCLUDED.winner_name,
                created_at = EXCLUDED.created_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&snapshot.name)
        .bind(snapshot.owner_id)
        .bind(encode_numbers(&snapshot.pool))
        .bind(encode_numbers(&snapshot.history))
        .bind(snapshot.ended)
        .bind(snapshot.winner_card_id)
        .bind(&snapshot.winner_name)
        .bind(snapshot.created_at)
        .bind(snapshot.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_game(&self, name: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM games WHERE game_name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_game_by_owner(&self, owner_id: i64) -> StoreResult<Option<String>> {
        let row = sqlx::query("SELECT game_name FROM games WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get("game_name")))
    }

    async fn load_settings(&self, name: &str) -> StoreResult<GameSettings> {
        let row = sqlx::query(
            r#"
            SELECT auto_call_enabled, auto_call_interval,
                   auto_restart_enabled, auto_restart_interval,
                   auto_end_enabled, auto_end_interval,
                   tts_enabled, tts_voice, background
            FROM game_settings
            WHERE game_name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(GameSettings::default());
        };

        Ok(GameSettings {
            auto_call_enabled: row.get("auto_call_enabled"),
            auto_call_interval: row.get::<i32, _>("auto_call_interval") as u32,
            auto_restart_enabled: row.get("auto_restart_enabled"),
            auto_restart_interval: row.get::<i32, _>("auto_restart_interval") as u32,
            auto_end_enabled: row.get("auto_end_enabled"),
            auto_end_interval: row.get::<i32, _>("auto_end_interval") as u32,
            tts_enabled: row.get("tts_enabled"),
            tts_voice: row.get("tts_voice"),
            background: row.get("background"),
        })
    }

    async fn save_settings(&self, name: &str, settings: &GameSettings) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO game_settings (game_name,
                auto_call_enabled, auto_call_interval,
                auto_restart_enabled, auto_restart_interval,
                auto_end_enabled, auto_end_interval,
                tts_enabled, tts_voice, background)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (game_name) DO UPDATE SET
                auto_call_enabled = EXCLUDED.auto_call_enabled,
                auto_call_interval = EXCLUDED.auto_call_interval,
                auto_restart_enabled = EXCLUDED.auto_restart_enabled,
                auto_restart_interval = EXCLUDED.auto_restart_interval,
                auto_end_enabled = EXCLUDED.auto_end_enabled,
                auto_end_interval = EXCLUDED.auto_end_interval,
                tts_enabled = EXCLUDED.tts_enabled,
                tts_voice = EXCLUDED.tts_voice,
                background = EXCLUDED.background
            "#,
        )
        .bind(name)
        .bind(settings.auto_call_enabled)
        .bind(settings.auto_call_interval as i32)
        .bind(settings.auto_restart_enabled)
        .bind(settings.auto_restart_interval as i32)
        .bind(settings.auto_end_enabled)
        .bind(settings.auto_end_interval as i32)
        .bind(settings.tts_enabled)
        .bind(&settings.tts_voice)
        .bind(&settings.background)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_card(
        &self,
        game_name: &str,
        holder_id: i64,
        holder_name: &str,
        grid: &Grid,
    ) -> StoreResult<Card> {
        let row = sqlx::query(
            r#"
            INSERT INTO cards (game_name, holder_id, holder_name, grid)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(game_name)
        .bind(holder_id)
        .bind(holder_name)
        .bind(grid.encode())
        .fetch_one(&self.pool)
        .await?;

        Ok(Card {
            id: row.get("id"),
            game_name: game_name.to_string(),
            holder_id,
            holder_name: holder_name.to_string(),
            grid: grid.clone(),
        })
    }

    async fn load_card(&self, card_id: i64) -> StoreResult<Option<Card>> {
        let row = sqlx::query(
            "SELECT id, game_name, holder_id, holder_name, grid FROM cards WHERE id = $1",
        )
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::card_from_row(&row)).transpose()
    }

    async fn card_count(&self, name: &str) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS card_count FROM cards WHERE game_name = $1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("card_count"))
    }
}

#[async_trait]
impl UserStore for PgGameStore {
    async fn user_for_access_token(&self, token: &str) -> StoreResult<Option<i64>> {
        let row = sqlx::query("SELECT id FROM users WHERE access_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get("id")))
    }

    async fn user_for_game_token(&self, token: &str) -> StoreResult<Option<i64>> {
        let row = sqlx::query("SELECT id FROM users WHERE game_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get("id")))
    }

    async fn set_game_token(&self, user_id: i64, token: &str) -> StoreResult<()> {
        sqlx::query("UPDATE users SET game_token = $1 WHERE id = $2")
            .bind(token)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[derive(Default)]
struct MemoryInner {
    games: HashMap<String, GameSnapshot>,
    settings: HashMap<String, GameSettings>,
    cards: HashMap<i64, Card>,
    access_tokens: HashMap<String, i64>,
    game_tokens: HashMap<String, i64>,
    next_card_id: i64,
}

/// In-memory implementation of [`GameStore`] and [`UserStore`]
///
/// Used by tests and local development. `set_fail_saves` makes every
/// `save_game` fail, which tests use to verify that the in-memory session is
/// not advanced past a failed persistence call.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with its tokens
    pub fn insert_user(&self, user_id: i64, access_token: &str, game_token: &str) {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        inner.access_tokens.insert(access_token.to_string(), user_id);
        inner.game_tokens.insert(game_token.to_string(), user_id);
    }

    /// Toggle simulated persistence failure for `save_game`
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn load_game(&self, name: &str) -> StoreResult<Option<GameSnapshot>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.games.get(name).cloned())
    }

    async fn save_game(&self, snapshot: &GameSnapshot) -> StoreResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Corrupt("simulated save failure".to_string()));
        }

        let mut inner = self.inner.lock().expect("memory store poisoned");
        inner.games.insert(snapshot.name.clone(), snapshot.clone());
        Ok(())
    }

    async fn delete_game(&self, name: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        inner.games.remove(name);
        Ok(())
    }

    async fn find_game_by_owner(&self, owner_id: i64) -> StoreResult<Option<String>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner
            .games
            .values()
            .find(|snapshot| snapshot.owner_id == owner_id)
            .map(|snapshot| snapshot.name.clone()))
    }

    async fn load_settings(&self, name: &str) -> StoreResult<GameSettings> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.settings.get(name).cloned().unwrap_or_default())
    }

    async fn save_settings(&self, name: &str, settings: &GameSettings) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        inner.settings.insert(name.to_string(), settings.clone());
        Ok(())
    }

    async fn insert_card(
        &self,
        game_name: &str,
        holder_id: i64,
        holder_name: &str,
        grid: &Grid,
    ) -> StoreResult<Card> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        inner.next_card_id += 1;

        let card = Card {
            id: inner.next_card_id,
            game_name: game_name.to_string(),
            holder_id,
            holder_name: holder_name.to_string(),
            grid: grid.clone(),
        };
        inner.cards.insert(card.id, card.clone());

        Ok(card)
    }

    async fn load_card(&self, card_id: i64) -> StoreResult<Option<Card>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.cards.get(&card_id).cloned())
    }

    async fn card_count(&self, name: &str) -> StoreResult<i64> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner
            .cards
            .values()
            .filter(|card| card.game_name == name)
            .count() as i64)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn user_for_access_token(&self, token: &str) -> StoreResult<Option<i64>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.access_tokens.get(token).copied())
    }

    async fn user_for_game_token(&self, token: &str) -> StoreResult<Option<i64>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.game_tokens.get(token).copied())
    }

    async fn set_game_token(&self, user_id: i64, token: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        inner
            .game_tokens
            .retain(|_, existing| *existing != user_id);
        inner.game_tokens.insert(token.to_string(), user_id);
        Ok(())
    }
}
