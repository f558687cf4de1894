//! Authentication middleware for protected endpoints.
//!
//! Extracts the access token from the `Authorization: Bearer <token>` header,
//! resolves it to a user id through the [`stream_bingo::auth::AuthManager`],
//! and injects the user id into request extensions for downstream handlers.
//!
//! Handlers extract it with `Extension(user_id): Extension<i64>`.

use axum::{
    extract::{Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

use super::AppState;

/// Validate the bearer access token and inject the user id.
///
/// - Token valid: injects `user_id: i64` into request extensions
/// - Missing header, bad format, or unknown token: `401 Unauthorized`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let token = match auth_header {
        Some(t) => t,
        None => return Err(StatusCode::UNAUTHORIZED),
    };

    match state.auth.resolve_access_token(token).await {
        Ok(user_id) => {
            request.extensions_mut().insert(user_id);
            Ok(next.run(request).await)
        }
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}
