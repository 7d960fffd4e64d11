//! # API Request/Response Types
//!
//! JSON bodies and query strings of the HTTP API. Listing endpoints return
//! the engine's own serializable entries directly.

use serde::{Deserialize, Serialize};
use starjar_core::{ImportMode, LedgerError, ReasonId, RewardId, UserId};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERROR BODY
// =============================================================================

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Present on `InsufficientBalance`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<i64>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            balance: None,
            cost: None,
        }
    }
}

impl From<&LedgerError> for ErrorResponse {
    fn from(e: &LedgerError) -> Self {
        match e {
            LedgerError::InsufficientBalance { balance, cost } => Self {
                error: e.to_string(),
                balance: Some(*balance),
                cost: Some(*cost),
            },
            other => Self::new(other.to_string()),
        }
    }
}

// =============================================================================
// QUERY STRINGS
// =============================================================================

/// `?lang=` on translated reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LangQuery {
    pub lang: Option<String>,
}

/// `GET /stars?user=&lang=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StarsQuery {
    pub user: Option<String>,
    pub lang: Option<String>,
}

/// `GET /redemptions?limit=&user=&lang=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedemptionsQuery {
    pub limit: Option<usize>,
    pub user: Option<String>,
    pub lang: Option<String>,
}

/// `POST /import?mode=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportQuery {
    #[serde(default)]
    pub mode: ImportMode,
}

// =============================================================================
// SESSIONS & ACCOUNTS
// =============================================================================

// Bodies carrying a password do not derive `Debug`, so they cannot end up
// in a log line.

#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// A new session. Send `token` as `X-Session-Token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub is_admin: bool,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PasswordRequest {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRequest {
    pub is_admin: bool,
}

// =============================================================================
// LEDGER REQUESTS
// =============================================================================

/// Award stars to a user.
///
/// Either `reason_id` or a non-empty `reason` text is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwardRequestBody {
    pub username: String,
    #[serde(default)]
    pub reason_id: Option<u64>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub stars: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardResponse {
    pub star_id: u64,
    pub reason_id: Option<u64>,
    pub stars: i64,
    pub balance: i64,
}

/// Redeem a reward for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemRequest {
    pub username: String,
    pub reward_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemResponse {
    pub redemption_id: u64,
    pub cost: i64,
    pub balance: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub username: String,
    pub balance: i64,
}

// =============================================================================
// CATALOG REQUESTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReasonRequest {
    pub text: String,
    #[serde(default)]
    pub stars: Option<i64>,
}

/// Change a reason's star value or a reward's cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueChangeRequest {
    pub value: i64,
    #[serde(default)]
    pub retroactive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRewardRequest {
    pub name: String,
    pub cost: i64,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub adult_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRewardRequest {
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub adult_only: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingRequest {
    pub value: String,
}

/// Id of a newly created entry, with its key (the username for accounts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: u64,
    pub key: String,
}

impl CreatedResponse {
    pub fn user(id: UserId, username: String) -> Self {
        Self { id: id.0, key: username }
    }

    pub fn reason(id: ReasonId, key: String) -> Self {
        Self { id: id.0, key }
    }

    pub fn reward(id: RewardId, key: String) -> Self {
        Self { id: id.0, key }
    }
}
