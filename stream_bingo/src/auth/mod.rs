//! Token resolution consumed from the identity collaborator.
//!
//! The OAuth dance (code exchange, token refresh) lives outside this core.
//! What the engine needs is narrow: map an access token to a user id to
//! authorize host actions, and map a player's secret game token to a user id
//! so their room can be resolved without exposing the host-facing game name.

use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{StoreError, UserStore};

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token matched no user
    #[error("invalid token")]
    InvalidToken,

    /// Storage error while resolving a token
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolves tokens to user identities
pub struct AuthManager {
    store: Arc<dyn UserStore>,
}

impl AuthManager {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Resolve an access token to the authenticated user id
    pub async fn resolve_access_token(&self, token: &str) -> Result<i64, AuthError> {
        self.store
            .user_for_access_token(token)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    /// Resolve a secret game token to its user id
    pub async fn resolve_game_token(&self, token: &str) -> Result<i64, AuthError> {
        self.store
            .user_for_game_token(token)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    /// Rotate a user's secret game token and return the new value
    pub async fn issue_game_token(&self, user_id: i64) -> Result<String, AuthError> {
        let token = Uuid::new_v4().simple().to_string();
        self.store.set_game_token(user_id, &token).await?;

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[tokio::test]
    async fn test_resolve_tokens() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(9, "access-abc", "game-xyz");
        let auth = AuthManager::new(store);

        assert_eq!(auth.resolve_access_token("access-abc").await.unwrap(), 9);
        assert_eq!(auth.resolve_game_token("game-xyz").await.unwrap(), 9);
        assert!(matches!(
            auth.resolve_access_token("nope").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_issue_game_token_rotates() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(9, "access-abc", "game-xyz");
        let auth = AuthManager::new(store);

        let token = auth.issue_game_token(9).await.unwrap();
        assert_eq!(auth.resolve_game_token(&token).await.unwrap(), 9);
        assert!(matches!(
            auth.resolve_game_token("game-xyz").await,
            Err(AuthError::InvalidToken)
        ));
    }
}
