//! HTTP/WebSocket API for the bingo server.
//!
//! The API is built with Axum for HTTP/WebSocket and Tower middleware for
//! CORS and authentication. Game state is owned by per-game room actors; the
//! handlers here only resolve tokens and forward operations through the
//! [`stream_bingo::room::RoomRegistry`].
//!
//! # Endpoints Overview
//!
//! ## Games (host, bearer access token)
//! - `POST /api/games` - Create (or restart an ended) game
//! - `GET /api/games/{name}` - Current game snapshot
//! - `POST /api/games/{name}/call` - Call the next number
//! - `POST /api/games/{name}/end` - End the game without a winner
//! - `PATCH /api/games/{name}/settings` - Merge a settings patch
//! - `GET /api/games/{name}/stats` - Aggregate statistics
//! - `POST /api/token` - Rotate the caller's secret game token
//!
//! ## Cards (public, addressed by secret game token)
//! - `POST /api/cards` - Issue a card for a player
//! - `POST /api/cards/{id}/check` - Validate a card against the call history
//!
//! ## WebSocket
//! - `GET /ws/host/{name}?token=<access_token>` - Host realtime connection
//! - `GET /ws/play/{game_token}` - Player realtime connection
//!
//! ## Health Check
//! - `GET /health` - Server health status

pub mod games;
pub mod middleware;
pub mod websocket;

use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, patch, post},
};
use serde_json::json;
use std::sync::Arc;
use stream_bingo::{auth::AuthManager, room::RoomRegistry};
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers and WebSocket
/// connections. Cloned per request; both fields are cheap Arc handles.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    pub auth: Arc<AuthManager>,
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    // Host routes require a valid access token in the Authorization header.
    let protected_routes = Router::new()
        .route("/games", post(games::create_game))
        .route("/games/{name}", get(games::get_game))
        .route("/games/{name}/call", post(games::call_number))
        .route("/games/{name}/end", post(games::end_game))
        .route("/games/{name}/settings", patch(games::update_settings))
        .route("/games/{name}/stats", get(games::game_stats))
        .route("/token", post(games::rotate_game_token))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // Card routes authenticate through the secret game token in the body.
    let public_routes = Router::new()
        .route("/cards", post(games::issue_card))
        .route("/cards/{card_id}/check", post(games::check_card));

    Router::new()
        .route("/health", get(health_check))
        // WebSocket routes handle their own auth via path/query parameters
        .route("/ws/host/{name}", get(websocket::host_handler))
        .route("/ws/play/{game_token}", get(websocket::play_handler))
        .nest("/api", Router::new().merge(protected_routes).merge(public_routes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
