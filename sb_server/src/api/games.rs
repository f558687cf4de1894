//! Game and card management API handlers.
//!
//! Host endpoints operate on the caller's games and require a bearer access
//! token (see [`super::middleware`]). Card endpoints are addressed by the
//! host's secret game token instead, so an overlay widget can issue and check
//! cards without ever learning the host's access credentials.
//!
//! Create a game:
//! ```bash
//! curl -X POST http://localhost:3000/api/games \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"name": "demo1"}'
//! ```
//!
//! Issue a card:
//! ```bash
//! curl -X POST http://localhost:3000/api/cards \
//!   -H "Content-Type: application/json" \
//!   -d '{"game_token": "SECRET", "holder_id": 42, "holder_name": "viewer"}'
//! ```

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use stream_bingo::{
    game::{GameError, GameSettings, GameSettingsPatch, WinMode},
    room::{CalledNumber, GameStats, RoomSnapshot},
};

use super::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct IssueCardRequest {
    pub game_token: String,
    pub holder_id: i64,
    pub holder_name: String,
}

#[derive(Debug, Serialize)]
pub struct CardResponse {
    pub card_id: i64,
    pub game_name: String,
    /// Comma-joined cell numbers in row-major order, free space as 0
    pub numbers: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckCardRequest {
    pub mode: WinMode,
}

#[derive(Debug, Serialize)]
pub struct CheckCardResponse {
    pub winner: bool,
}

#[derive(Debug, Serialize)]
pub struct GameTokenResponse {
    pub game_token: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn game_error_response(e: GameError) -> ApiError {
    let status = match e {
        GameError::GameNotFound | GameError::CardNotFound => StatusCode::NOT_FOUND,
        GameError::Unauthorized => StatusCode::FORBIDDEN,
        GameError::DuplicateGame | GameError::GameEnded | GameError::PoolExhausted => {
            StatusCode::CONFLICT
        }
        GameError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(ErrorResponse { error: e.to_string() }))
}

/// Create a new game, or restart the caller's ended game under the same name.
pub async fn create_game(
    State(state): State<AppState>,
    Extension(user_id): Extension<i64>,
    Json(request): Json<CreateGameRequest>,
) -> Result<Json<RoomSnapshot>, ApiError> {
    state
        .registry
        .create_game(user_id, &request.name)
        .await
        .map(Json)
        .map_err(game_error_response)
}

/// Get the current snapshot of a game.
pub async fn get_game(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RoomSnapshot>, ApiError> {
    state
        .registry
        .snapshot(&name)
        .await
        .map(Json)
        .map_err(game_error_response)
}

/// Call the next number for a game. Owner only.
pub async fn call_number(
    State(state): State<AppState>,
    Extension(user_id): Extension<i64>,
    Path(name): Path<String>,
) -> Result<Json<CalledNumber>, ApiError> {
    state
        .registry
        .call_number(&name, user_id)
        .await
        .map(Json)
        .map_err(game_error_response)
}

/// End a game without a winner. Owner only.
pub async fn end_game(
    State(state): State<AppState>,
    Extension(user_id): Extension<i64>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .registry
        .end_game(&name, user_id)
        .await
        .map(|_| StatusCode::OK)
        .map_err(game_error_response)
}

/// Merge a partial settings update into a game's configuration. Owner only.
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(user_id): Extension<i64>,
    Path(name): Path<String>,
    Json(patch): Json<GameSettingsPatch>,
) -> Result<Json<GameSettings>, ApiError> {
    state
        .registry
        .update_settings(&name, user_id, patch)
        .await
        .map(Json)
        .map_err(game_error_response)
}

/// Aggregate statistics for a game.
pub async fn game_stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<GameStats>, ApiError> {
    state
        .registry
        .game_stats(&name)
        .await
        .map(Json)
        .map_err(game_error_response)
}

/// Rotate the caller's secret game token, invalidating the previous one.
pub async fn rotate_game_token(
    State(state): State<AppState>,
    Extension(user_id): Extension<i64>,
) -> Result<Json<GameTokenResponse>, ApiError> {
    state
        .auth
        .issue_game_token(user_id)
        .await
        .map(|game_token| Json(GameTokenResponse { game_token }))
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: e.to_string() }),
            )
        })
}

/// Issue a fresh card for a player in the game addressed by its secret token.
///
/// The game token authenticates the caller as the overlay, not the viewer:
/// `holder_id` and `holder_name` are taken as asserted, because viewer
/// identity lives on the overlay's side of the integration. A leaked token
/// therefore allows minting cards under any name, and rotating it via the
/// token route is the remedy.
pub async fn issue_card(
    State(state): State<AppState>,
    Json(request): Json<IssueCardRequest>,
) -> Result<Json<CardResponse>, ApiError> {
    let owner_id = state
        .auth
        .resolve_game_token(&request.game_token)
        .await
        .map_err(|_| game_error_response(GameError::GameNotFound))?;

    let name = state
        .registry
        .game_for_owner(owner_id)
        .await
        .map_err(game_error_response)?;

    let card = state
        .registry
        .issue_card(&name, request.holder_id, &request.holder_name)
        .await
        .map_err(game_error_response)?;

    Ok(Json(CardResponse {
        card_id: card.id,
        game_name: card.game_name,
        numbers: card.grid.encode(),
    }))
}

/// Validate a card against its game's authoritative call history.
pub async fn check_card(
    State(state): State<AppState>,
    Path(card_id): Path<i64>,
    Json(request): Json<CheckCardRequest>,
) -> Result<Json<CheckCardResponse>, ApiError> {
    state
        .registry
        .check_card(card_id, request.mode)
        .await
        .map(|winner| Json(CheckCardResponse { winner }))
        .map_err(game_error_response)
}
