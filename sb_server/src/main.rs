//! Streaming bingo server using the async actor model.
//!
//! This server spawns a GameRoomActor per live game, managed by RoomRegistry,
//! with database-backed persistence and token-based authentication.

use sb_server::api;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use ctrlc::set_handler;
use log::info;
use pico_args::Arguments;
use stream_bingo::{
    auth::AuthManager,
    db::{Database, DatabaseConfig, PgGameStore},
    room::RoomRegistry,
};

const HELP: &str = "\
Run a streaming bingo server

USAGE:
  sb_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:3000]
  --db-url     URL         Database connection string  [default: env DATABASE_URL or postgres://postgres@localhost/bingo_db]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  (See .env file for all configuration options)
";

struct Args {
    bind: SocketAddr,
    database_url: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.value_from_str("--bind").unwrap_or_else(|_| {
            std::env::var("SERVER_BIND")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
                .parse()
                .expect("Invalid SERVER_BIND address")
        }),
        database_url: pargs.value_from_str("--db-url").unwrap_or_else(|_| {
            std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://postgres@localhost/bingo_db".to_string())
        }),
    };

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    env_logger::builder().format_target(false).init();
    info!("Starting bingo server at {}", args.bind);

    info!("Connecting to database: {}", args.database_url);
    let db_config = DatabaseConfig::for_url(args.database_url);

    let db = Database::new(&db_config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    db.migrate()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

    info!("Database connected successfully");

    let store = Arc::new(PgGameStore::new(db.pool().clone()));
    let registry = Arc::new(RoomRegistry::new(store.clone()));
    let auth = Arc::new(AuthManager::new(store));

    let state = api::AppState { registry, auth };
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!("Listening on {}", args.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
