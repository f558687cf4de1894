//! Database module providing PostgreSQL connection pooling and the game
//! store abstractions.
//!
//! The durable source of truth for session state across process restarts is
//! the [`repository::GameStore`] trait; a live session is an in-memory
//! projection that must be reconstructible from exactly these calls.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod config;
pub mod repository;

pub use config::DatabaseConfig;
pub use repository::{GameStore, MemoryStore, PgGameStore, StoreError, StoreResult, UserStore};

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create the schema if it does not exist yet
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                access_token TEXT,
                game_token TEXT UNIQUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS games (
                game_name TEXT PRIMARY KEY,
                owner_id BIGINT NOT NULL,
                balls TEXT NOT NULL,
                called TEXT NOT NULL,
                ended BOOLEAN NOT NULL DEFAULT FALSE,
                winner_card_id BIGINT,
                winner_name TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS game_settings (
                game_name TEXT PRIMARY KEY,
                auto_call_enabled BOOLEAN NOT NULL,
                auto_call_interval INT NOT NULL,
                auto_restart_enabled BOOLEAN NOT NULL,
                auto_restart_interval INT NOT NULL,
                auto_end_enabled BOOLEAN NOT NULL,
                auto_end_interval INT NOT NULL,
                tts_enabled BOOLEAN NOT NULL,
                tts_voice TEXT,
                background TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                id BIGSERIAL PRIMARY KEY,
                game_name TEXT NOT NULL,
                holder_id BIGINT NOT NULL,
                holder_name TEXT NOT NULL,
                grid TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}
