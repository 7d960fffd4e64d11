//! # Starjar HTTP API Module
//!
//! JSON API over the ledger engine, using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /login`, `POST /logout` - Open and close a session
//! - `GET /users` - Leaderboard: totals and balances
//! - `POST /users`, `DELETE /users/{username}` - Accounts (admin)
//! - `PUT /users/{username}/password`, `PUT /users/{username}/admin`
//! - `GET /users/{username}/balance` - Current balance
//! - `GET /users/reason-counts` - Award counts per user per reason
//! - `GET|POST /stars`, `DELETE /stars/{id}` - Award ledger
//! - `GET|POST /redemptions`, `DELETE /redemptions/{id}` - Redemption ledger
//! - `GET|POST /reasons`, `PUT /reasons/{id}/stars`, `DELETE /reasons/{id}`
//! - `GET|POST /rewards`, `PUT /rewards/{id}`, `PUT /rewards/{id}/cost`, `DELETE /rewards/{id}`
//! - `GET /translations/{kind}/{id}`, `PUT /translations/{kind}/{id}/{lang}`
//! - `GET /settings`, `PUT /settings/{key}`
//! - `GET /export`, `POST /import?mode=best_effort|atomic`
//!
//! Translated reads take `?lang=` and fall back to the configured default.
//! Writes need a session: log in with a username and password, then send the
//! returned token as `X-Session-Token`.
//!
//! ## Security Configuration
//!
//! - API key from config or `STARJAR_API_KEY`: if set, requires Bearer authentication
//! - `[server] rate_limit` or `STARJAR_RATE_LIMIT`: requests per second per logged-in
//!   user, with one shared bucket for requests without a session
//! - `STARJAR_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)

mod auth;
mod error;
mod handlers;
mod middleware;
mod session;
mod types;

pub use auth::CurrentUser;
pub use error::{ApiError, status_for};
pub use middleware::{RateKey, UserRateLimiter, create_rate_limiter, prune_rate_limiter};
pub use session::{SESSION_HEADER, SESSION_TTL, SessionStore};
pub use types::{
    AdminRequest, AwardRequestBody, AwardResponse, BalanceResponse, CreateReasonRequest,
    CreateRewardRequest, CreateUserRequest, CreatedResponse, ErrorResponse, HealthResponse,
    LoginRequest, LoginResponse, PasswordRequest, RedeemRequest, RedeemResponse, SettingRequest,
    TranslationRequest, UpdateRewardRequest, ValueChangeRequest,
};

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use starjar_core::{Ledger, LedgerError, StorageBackend};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request bodies above this size are rejected.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// How often expired sessions and idle rate-limit buckets are dropped.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the ledger.
#[derive(Clone)]
pub struct AppState {
    /// The single ledger. Writes serialize on this lock.
    pub ledger: Arc<RwLock<Ledger<StorageBackend>>>,
    /// Required bearer key, if any.
    pub api_key: Option<Arc<str>>,
    /// Language of translated reads without `?lang=`.
    pub default_lang: Arc<str>,
    pub rate_limiter: Option<UserRateLimiter>,
    pub sessions: SessionStore,
}

impl AppState {
    /// Create new app state around a ledger.
    #[must_use]
    pub fn new(ledger: Ledger<StorageBackend>) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            api_key: None,
            default_lang: Arc::from(starjar_core::primitives::DEFAULT_LANG),
            rate_limiter: None,
            sessions: SessionStore::default(),
        }
    }

    /// Require `key` as bearer token. An empty key disables authentication.
    #[must_use]
    pub fn with_api_key(mut self, key: Option<&str>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty()).map(Arc::from);
        self
    }

    /// Limit each logged-in user to `requests_per_second`. 0 disables limiting.
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.rate_limiter = create_rate_limiter(requests_per_second);
        self
    }

    #[must_use]
    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    #[must_use]
    pub fn with_default_lang(mut self, lang: &str) -> Self {
        self.default_lang = Arc::from(lang);
        self
    }

    fn lang(&self, requested: Option<&str>) -> String {
        requested
            .filter(|l| !l.is_empty())
            .unwrap_or(&*self.default_lang)
            .to_string()
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

fn cors_methods() -> [Method; 5] {
    [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ]
}

fn cors_headers() -> [HeaderName; 3] {
    [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        HeaderName::from_static(SESSION_HEADER),
    ]
}

/// Build CORS layer from `STARJAR_CORS_ORIGINS`.
///
/// - "*": allows all origins
/// - unset: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("STARJAR_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (STARJAR_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in STARJAR_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(cors_methods())
                    .allow_headers(cors_headers())
            }
        }
        None => build_localhost_cors(),
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(cors_methods())
        .allow_headers(cors_headers())
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Authentication - validates API key (if configured)
/// 5. Session - resolves `X-Session-Token` to the current user
/// 6. Rate limiting - per logged-in user (if configured)
pub fn create_router(state: AppState) -> Router {
    if state.api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set STARJAR_API_KEY or [auth] api_key to enable authentication."
        );
    }
    if state.rate_limiter.is_some() {
        tracing::info!("Rate limiting enabled");
    }

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/login", post(handlers::login_handler))
        .route("/logout", post(handlers::logout_handler))
        .route(
            "/users",
            get(handlers::leaderboard_handler).post(handlers::create_user_handler),
        )
        .route("/users/{username}", delete(handlers::delete_user_handler))
        .route(
            "/users/{username}/password",
            put(handlers::set_password_handler),
        )
        .route("/users/{username}/admin", put(handlers::set_admin_handler))
        .route("/users/reason-counts", get(handlers::reason_counts_handler))
        .route("/users/{username}/balance", get(handlers::balance_handler))
        .route(
            "/stars",
            get(handlers::list_stars_handler).post(handlers::award_handler),
        )
        .route("/stars/{id}", delete(handlers::delete_star_handler))
        .route(
            "/redemptions",
            get(handlers::list_redemptions_handler).post(handlers::redeem_handler),
        )
        .route(
            "/redemptions/{id}",
            delete(handlers::delete_redemption_handler),
        )
        .route(
            "/reasons",
            get(handlers::list_reasons_handler).post(handlers::create_reason_handler),
        )
        .route("/reasons/{id}", delete(handlers::delete_reason_handler))
        .route("/reasons/{id}/stars", put(handlers::set_reason_stars_handler))
        .route(
            "/rewards",
            get(handlers::list_rewards_handler).post(handlers::create_reward_handler),
        )
        .route(
            "/rewards/{id}",
            put(handlers::update_reward_handler).delete(handlers::delete_reward_handler),
        )
        .route("/rewards/{id}/cost", put(handlers::set_reward_cost_handler))
        .route(
            "/translations/{kind}/{id}",
            get(handlers::get_translations_handler),
        )
        .route(
            "/translations/{kind}/{id}/{lang}",
            put(handlers::set_translation_handler),
        )
        .route("/settings", get(handlers::settings_handler))
        .route("/settings/{key}", put(handlers::set_setting_handler))
        .route("/export", get(handlers::export_handler))
        .route("/import", post(handlers::import_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::session_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::api_key_auth_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// One cleanup pass: drop expired sessions and idle rate-limit buckets.
///
/// Returns the number of sessions dropped.
pub async fn housekeeping(state: &AppState) -> usize {
    let expired = state.sessions.prune_expired().await;
    if let Some(limiter) = &state.rate_limiter {
        prune_rate_limiter(limiter);
    }
    if expired > 0 {
        tracing::debug!(expired, "expired sessions dropped");
    }
    expired
}

fn spawn_housekeeping(state: AppState) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        loop {
            tick.tick().await;
            housekeeping(&state).await;
        }
    });
}

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), LedgerError> {
    spawn_housekeeping(state.clone());
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| LedgerError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Starjar HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| LedgerError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
