//! # Middleware Module
//!
//! Rate limiting for the Starjar HTTP API.
//!
//! Requests are bucketed by the user their session resolved to, so one busy
//! tablet cannot starve the others. Requests without a session share one
//! anonymous bucket, which also throttles `POST /login`. The limiter runs
//! after authentication, so the number of buckets is bounded by the number
//! of accounts.

use super::{AppState, auth::CurrentUser};
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore,
};
use starjar_core::UserId;
use std::num::NonZeroU32;
use std::sync::Arc;

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Bucket a request is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateKey {
    Anonymous,
    User(UserId),
}

impl RateKey {
    fn for_request(current: Option<&CurrentUser>) -> Self {
        match current.and_then(CurrentUser::actor) {
            Some(actor) => Self::User(actor.id),
            None => Self::Anonymous,
        }
    }
}

/// Per-user rate limiter.
pub type UserRateLimiter =
    Arc<RateLimiter<RateKey, DefaultKeyedStateStore<RateKey>, DefaultClock>>;

/// Create a limiter allowing `requests_per_second` per user.
///
/// Returns `None` for 0, which disables limiting.
pub fn create_rate_limiter(requests_per_second: u32) -> Option<UserRateLimiter> {
    let rps = NonZeroU32::new(requests_per_second)?;
    Some(Arc::new(RateLimiter::keyed(Quota::per_second(rps))))
}

/// Drop buckets that are full again, so deleted accounts do not linger.
pub fn prune_rate_limiter(limiter: &UserRateLimiter) {
    limiter.retain_recent();
    limiter.shrink_to_fit();
}

/// Rate limiting middleware.
///
/// Returns 429 Too Many Requests once the caller's bucket is empty.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return Ok(next.run(request).await);
    };

    let key = RateKey::for_request(request.extensions().get::<CurrentUser>());
    match limiter.check_key(&key) {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!(bucket = ?key, "Rate limit exceeded");
            Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use starjar_core::Actor;

    fn signed_in(id: u64) -> CurrentUser {
        CurrentUser(Some(Actor {
            id: UserId(id),
            username: format!("user{id}"),
            is_admin: false,
        }))
    }

    #[test]
    fn zero_disables_limiting() {
        assert!(create_rate_limiter(0).is_none());
    }

    #[test]
    fn buckets_are_per_user() {
        let limiter = create_rate_limiter(1).expect("limiter");
        assert!(limiter.check_key(&RateKey::User(UserId(1))).is_ok());
        assert!(limiter.check_key(&RateKey::User(UserId(1))).is_err());
        assert!(limiter.check_key(&RateKey::User(UserId(2))).is_ok());
    }

    #[test]
    fn requests_without_session_share_one_bucket() {
        assert_eq!(RateKey::for_request(None), RateKey::Anonymous);
        assert_eq!(
            RateKey::for_request(Some(&CurrentUser(None))),
            RateKey::Anonymous
        );
        assert_eq!(
            RateKey::for_request(Some(&signed_in(4))),
            RateKey::User(UserId(4))
        );
    }

    #[test]
    fn pruning_keeps_active_buckets() {
        let limiter = create_rate_limiter(1).expect("limiter");
        assert!(limiter.check_key(&RateKey::User(UserId(1))).is_ok());
        prune_rate_limiter(&limiter);
        // The bucket is still drained, so it survives pruning.
        assert!(limiter.check_key(&RateKey::User(UserId(1))).is_err());
    }
}
