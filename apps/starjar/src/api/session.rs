//! # Sessions
//!
//! `POST /login` trades a username and password for a random token. Later
//! requests name their user by sending that token in `X-Session-Token`.
//!
//! Tokens live in memory only: restarting the server logs everybody out.

use starjar_core::{UserId, new_session_token};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Header carrying the session token.
pub const SESSION_HEADER: &str = "x-session-token";

/// Lifetime of a session after login.
pub const SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy)]
struct Session {
    user: UserId,
    expires_at: Instant,
}

/// Token to user map shared by all request handlers.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(SESSION_TTL)
    }
}

impl SessionStore {
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Open a session for `user` and return its token.
    pub async fn issue(&self, user: UserId) -> String {
        let token = new_session_token();
        let session = Session {
            user,
            expires_at: Instant::now() + self.ttl,
        };
        self.sessions.write().await.insert(token.clone(), session);
        token
    }

    /// The user behind a live token.
    pub async fn user(&self, token: &str) -> Option<UserId> {
        let sessions = self.sessions.read().await;
        sessions
            .get(token)
            .filter(|s| s.expires_at > Instant::now())
            .map(|s| s.user)
    }

    /// Drop one token. Returns whether it existed.
    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Drop every token of `user`. Returns how many were dropped.
    pub async fn revoke_user(&self, user: UserId) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.user != user);
        before - sessions.len()
    }

    /// Drop expired tokens. Returns how many were dropped.
    pub async fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        before - sessions.len()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issued_token_resolves_until_revoked() {
        let store = SessionStore::default();
        let token = store.issue(UserId(3)).await;
        assert_eq!(store.user(&token).await, Some(UserId(3)));
        assert_eq!(store.user("not-a-token").await, None);

        assert!(store.revoke(&token).await);
        assert!(!store.revoke(&token).await);
        assert_eq!(store.user(&token).await, None);
    }

    #[tokio::test]
    async fn revoke_user_drops_all_their_tokens() {
        let store = SessionStore::default();
        let phone = store.issue(UserId(1)).await;
        let tablet = store.issue(UserId(1)).await;
        let other = store.issue(UserId(2)).await;
        assert_ne!(phone, tablet);

        assert_eq!(store.revoke_user(UserId(1)).await, 2);
        assert_eq!(store.user(&phone).await, None);
        assert_eq!(store.user(&other).await, Some(UserId(2)));
    }

    #[tokio::test]
    async fn expired_tokens_are_ignored_and_pruned() {
        let store = SessionStore::with_ttl(Duration::ZERO);
        let token = store.issue(UserId(1)).await;
        assert_eq!(store.user(&token).await, None);
        assert_eq!(store.count().await, 1);

        assert_eq!(store.prune_expired().await, 1);
        assert_eq!(store.count().await, 0);
    }
}
