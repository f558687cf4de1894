//! WebSocket handlers for realtime room connections.
//!
//! Two entry points share one socket loop:
//! - `GET /ws/host/{name}?token=<access_token>` joins the host's own room as
//!   [`Role::Host`]; its presence arms the automation timers and it may send
//!   timer status frames that are mirrored to every member.
//! - `GET /ws/play/{game_token}` joins the room addressed by the host's
//!   secret game token as a read-only [`Role::Player`].
//!
//! The first frame on every connection is a `snapshot` carrying the full
//! catch-up state; events follow in commit order. A client that reconnects
//! starts over from a fresh snapshot instead of replayed events.
//!
//! # Host Messages
//!
//! ```javascript
//! ws.send(JSON.stringify({
//!   type: "timer",
//!   kind: "auto_call",
//!   enabled: true,
//!   remaining_secs: 12
//! }));
//! ```

use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use stream_bingo::room::{ConnId, Role, RoomMessage, TimerKind};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: String,
}

/// Client messages received via WebSocket
///
/// Only timer status frames are meaningful; anything else a client sends is
/// dropped. Game actions go through the HTTP API.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    /// Mirror a host-side countdown to the room
    Timer {
        kind: TimerKind,
        enabled: bool,
        remaining_secs: u32,
    },
}

/// Upgrade a host connection to a WebSocket on the named game's room.
///
/// The access token in the query must resolve to the game's owner; a token
/// for any other user yields `403 Forbidden` at join time, surfaced here as
/// a rejected upgrade.
pub async fn host_handler(
    ws: WebSocketUpgrade,
    Path(name): Path<String>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let user_id = match state.auth.resolve_access_token(&query.token).await {
        Ok(user_id) => user_id,
        Err(_) => {
            return (StatusCode::UNAUTHORIZED, "Invalid token").into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, name, Role::Host, user_id, state))
}

/// Upgrade a player connection to a WebSocket on the room addressed by the
/// host's secret game token.
pub async fn play_handler(
    ws: WebSocketUpgrade,
    Path(game_token): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let owner_id = match state.auth.resolve_game_token(&game_token).await {
        Ok(owner_id) => owner_id,
        Err(_) => {
            return (StatusCode::UNAUTHORIZED, "Invalid token").into_response();
        }
    };

    let name = match state.registry.game_for_owner(owner_id).await {
        Ok(name) => name,
        Err(_) => {
            return (StatusCode::NOT_FOUND, "No game for token").into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, name, Role::Player, owner_id, state))
}

/// Handle an established WebSocket connection.
///
/// Joins the room, pushes the catch-up snapshot as the first frame, then
/// forwards room events until either side disconnects. Host frames are
/// parsed as [`ClientMessage`]; player frames are ignored.
async fn handle_socket(
    socket: WebSocket,
    name: String,
    role: Role,
    user_id: i64,
    state: AppState,
) {
    let conn_id = ConnId::next();
    let (mut sender, mut receiver) = socket.split();

    let (snapshot, mut events) = match state.registry.join(&name, conn_id, role, user_id).await {
        Ok(joined) => joined,
        Err(e) => {
            warn!("WebSocket join rejected: game={}, error={}", name, e);
            let frame = json!({ "type": "error", "message": e.to_string() }).to_string();
            let _ = sender.send(Message::Text(frame.into())).await;
            let _ = sender.close().await;
            return;
        }
    };

    info!(
        "WebSocket connected: game={}, role={:?}, user={}",
        name, role, user_id
    );

    let first_frame = json!({ "type": "snapshot", "data": snapshot }).to_string();
    if sender.send(Message::Text(first_frame.into())).await.is_err() {
        state.registry.leave(&name, conn_id).await;
        return;
    }

    // Forward room events to the client.
    let send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }

        // The room dropped this connection, either on shutdown or because
        // the client fell behind. Close the socket so the client reconnects
        // and resyncs through a fresh snapshot.
        let _ = sender.send(Message::Close(None)).await;
    });

    // Receive messages from the client.
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if role != Role::Host {
                    debug!("Ignoring message from player connection: {}", text);
                    continue;
                }

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Timer {
                        kind,
                        enabled,
                        remaining_secs,
                    }) => {
                        if let Ok(handle) = state.registry.ensure_room(&name).await {
                            let _ = handle
                                .send(RoomMessage::TimerStatus {
                                    conn_id,
                                    kind,
                                    enabled,
                                    remaining_secs,
                                })
                                .await;
                        }
                    }
                    Err(e) => {
                        debug!("Dropping malformed client message: {}", e);
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    state.registry.leave(&name, conn_id).await;
    send_task.abort();

    info!("WebSocket disconnected: game={}, user={}", name, user_id);
}
