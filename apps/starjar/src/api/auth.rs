//! # Authentication Module
//!
//! Two layers:
//!
//! - API key: if configured, every request except `/health` must carry
//!   `Authorization: Bearer <key>`. Compared in constant time.
//! - Session: a request naming a user carries the token `POST /login` issued
//!   for them in `X-Session-Token`. The token is resolved to a `CurrentUser`
//!   before rate limiting and before any handler runs. Catalog and admin
//!   writes require an admin; awards reject a beneficiary equal to the
//!   current user.

use super::{AppState, error::ApiError, session::SESSION_HEADER};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use starjar_core::{Actor, LedgerError};
use subtle::ConstantTimeEq;

// =============================================================================
// API KEY AUTHENTICATION
// =============================================================================

/// Constant-time key comparison.
///
/// Both keys are padded to the same length so `ct_eq` always runs over the
/// same number of bytes.
fn keys_match(provided: &str, expected: &str) -> bool {
    let provided_bytes = provided.as_bytes();
    let expected_bytes = expected.as_bytes();

    let max_len = provided_bytes.len().max(expected_bytes.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided_bytes.len()].copy_from_slice(provided_bytes);
    padded_expected[..expected_bytes.len()].copy_from_slice(expected_bytes);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided_bytes.len() == expected_bytes.len()
}

/// API key authentication middleware.
///
/// Without a configured key every request is allowed.
pub async fn api_key_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(expected) = state.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(header_value) => {
            // Accept both "Bearer <key>" and a raw "<key>".
            let provided = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
            if keys_match(provided, expected) {
                Ok(next.run(request).await)
            } else {
                tracing::warn!(
                    event = "auth_failure",
                    reason = "invalid_api_key",
                    "Authentication failed: invalid API key"
                );
                Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
            }
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// The user a request acts as, if it carried a session token.
///
/// Inserted into the request extensions by `session_middleware` for every
/// route, so handlers can always extract it.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<Actor>);

impl CurrentUser {
    pub fn actor(&self) -> Option<&Actor> {
        self.0.as_ref()
    }

    /// The current user, who must be logged in.
    pub fn require(&self) -> Result<&Actor, ApiError> {
        self.actor()
            .ok_or_else(|| LedgerError::Unauthenticated("login required".into()).into())
    }

    /// The current user, who must be an admin.
    pub fn require_admin(&self) -> Result<&Actor, ApiError> {
        match self.actor() {
            Some(actor) if actor.is_admin => Ok(actor),
            Some(actor) => {
                tracing::warn!(event = "auth_failure", user = %actor.username, "admin required");
                Err(LedgerError::Forbidden("admin required".into()).into())
            }
            None => self.require(),
        }
    }
}

/// The trimmed session token of a request, if any.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve `X-Session-Token` to a `CurrentUser`.
///
/// A request without a token proceeds anonymously. An unknown or expired
/// token, or one whose user was deleted, is rejected with 401. The admin flag
/// is re-read from the store on every request.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = session_token(request.headers()).map(str::to_owned);
    let current = match token {
        None => CurrentUser(None),
        Some(token) => match resolve_session(&state, &token).await {
            Ok(actor) => CurrentUser(Some(actor)),
            Err(e) => return e.into_response(),
        },
    };
    request.extensions_mut().insert(current);
    next.run(request).await
}

async fn resolve_session(state: &AppState, token: &str) -> Result<Actor, ApiError> {
    let Some(user_id) = state.sessions.user(token).await else {
        tracing::warn!(event = "auth_failure", reason = "invalid_session", "unknown or expired session");
        return Err(LedgerError::Unauthenticated("invalid or expired session".into()).into());
    };
    let user = state.ledger.read().await.user(user_id)?;
    match user {
        Some(user) => Ok(Actor::from(&user)),
        None => {
            state.sessions.revoke(token).await;
            Err(LedgerError::Unauthenticated("session user no longer exists".into()).into())
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
