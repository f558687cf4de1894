//! Connection pool configuration.

use std::env;
use std::str::FromStr;

const DEV_DATABASE_URL: &str = "postgres://postgres@localhost/bingo_db";

/// Pool settings for [`super::Database`]
///
/// The connection URL comes from the caller; the pool knobs are read from
/// `DB_*` environment variables with defaults sized for a single server
/// process.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections kept open
    pub min_connections: u32,

    /// Seconds to wait when acquiring a connection
    pub connection_timeout_secs: u64,

    /// Seconds an idle connection survives
    pub idle_timeout_secs: u64,

    /// Seconds before a connection is recycled
    pub max_lifetime_secs: u64,
}

impl DatabaseConfig {
    /// Build a configuration for the given connection URL
    ///
    /// Pool sizing is taken from `DB_MAX_CONNECTIONS`, `DB_MIN_CONNECTIONS`,
    /// `DB_CONNECTION_TIMEOUT_SECS`, `DB_IDLE_TIMEOUT_SECS` and
    /// `DB_MAX_LIFETIME_SECS`; a missing or unparsable variable falls back
    /// to its default.
    pub fn for_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: env_or("DB_MAX_CONNECTIONS", 50),
            min_connections: env_or("DB_MIN_CONNECTIONS", 2),
            connection_timeout_secs: env_or("DB_CONNECTION_TIMEOUT_SECS", 5),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::for_url(DEV_DATABASE_URL)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
