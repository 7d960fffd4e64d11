//! # Core Type Definitions
//!
//! This module contains all core types for the Starjar ledger engine:
//! - Row identifiers (`UserId`, `ReasonId`, `RewardId`, `StarId`, `RedemptionId`)
//! - Stored records (`User`, `Reason`, `Reward`, `Star`, `Redemption`)
//! - Insertion records (`NewUser`, `NewReason`, ...) without store-assigned ids
//! - Translation ownership (`TranslationOwner`)
//! - Error types (`LedgerError`, `ErrorKind`)
//!
//! ## Amounts
//!
//! Star counts and costs are `i64` and combined with saturating arithmetic.
//! There are no fractional stars.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// ROW IDENTIFIERS
// =============================================================================

/// Identifier of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Identifier of a Reason (award catalog entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReasonId(pub u64);

/// Identifier of a Reward (redemption catalog entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RewardId(pub u64);

/// Identifier of an award (credit) ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StarId(pub u64);

/// Identifier of a redemption (debit) ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RedemptionId(pub u64);

// =============================================================================
// TRANSLATION OWNERSHIP
// =============================================================================

/// The entity a translation row belongs to.
///
/// Translation rows are unique per (owner, language).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TranslationOwner {
    /// Display name of a user.
    User(UserId),
    /// Display text of a reason.
    Reason(ReasonId),
    /// Display text of a reward.
    Reward(RewardId),
}

impl TranslationOwner {
    /// Compact `(kind, id)` pair used as a storage key.
    #[must_use]
    pub const fn storage_key(self) -> (u8, u64) {
        match self {
            Self::User(id) => (0, id.0),
            Self::Reason(id) => (1, id.0),
            Self::Reward(id) => (2, id.0),
        }
    }
}

// =============================================================================
// USERS
// =============================================================================

/// A user account.
///
/// The username is immutable and doubles as the last display-name fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Argon2 PHC string. Never exported.
    pub password_hash: String,
    pub is_admin: bool,
}

/// A user account before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// The resolved identity of whoever performs a write.
///
/// Produced by the calling layer (HTTP auth, CLI flags) and handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub username: String,
    pub is_admin: bool,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
        }
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Award catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    pub id: ReasonId,
    /// Stable machine key, unique among reasons.
    pub key: String,
    /// Star value applied to new awards that reference this reason.
    pub default_stars: i64,
    pub created_at: DateTime<Utc>,
}

/// A reason before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReason {
    pub key: String,
    pub default_stars: i64,
    pub created_at: DateTime<Utc>,
}

/// Redemption catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    /// Stable machine key, unique among rewards.
    pub key: String,
    /// Current price in stars.
    pub cost: i64,
    pub icon: String,
    pub adult_only: bool,
    pub created_at: DateTime<Utc>,
}

/// A reward before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReward {
    pub key: String,
    pub cost: i64,
    pub icon: String,
    pub adult_only: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// LEDGER ENTRIES
// =============================================================================

/// Award ledger entry (credit).
///
/// `stars` only changes through a retroactive reason update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Star {
    pub id: StarId,
    /// Beneficiary.
    pub user: UserId,
    /// Catalog reference. May dangle after the reason is deleted.
    pub reason: Option<ReasonId>,
    /// Free-text snapshot of the reason at award time.
    pub reason_text: Option<String>,
    pub stars: i64,
    /// `None` means the award came from the system or an API key.
    pub awarded_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// An award before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStar {
    pub user: UserId,
    pub reason: Option<ReasonId>,
    pub reason_text: Option<String>,
    pub stars: i64,
    pub awarded_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Redemption ledger entry (debit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub id: RedemptionId,
    pub user: UserId,
    pub reward: RewardId,
    /// Snapshot of the price. `None` floats with the reward's current cost.
    pub cost: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A redemption before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRedemption {
    pub user: UserId,
    pub reward: RewardId,
    pub cost: Option<i64>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Coarse classification of a `LedgerError`, for callers mapping errors to
/// status codes or exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    InsufficientBalance,
    Conflict,
    Unauthenticated,
    Forbidden,
    Storage,
}

/// Errors that can occur in the Starjar engine.
///
/// - No silent failures on write paths
/// - Display-text resolution never returns an error (it degrades to fallbacks)
/// - The engine never panics; all errors are recoverable
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No user with this username.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// No user with this id.
    #[error("User not found: {0:?}")]
    UserIdNotFound(UserId),

    #[error("Reason not found: {0:?}")]
    ReasonNotFound(ReasonId),

    #[error("Reward not found: {0:?}")]
    RewardNotFound(RewardId),

    #[error("Star not found: {0:?}")]
    StarNotFound(StarId),

    #[error("Redemption not found: {0:?}")]
    RedemptionNotFound(RedemptionId),

    /// An award named neither a reason id nor a non-empty reason text.
    #[error("Reason required")]
    ReasonRequired,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A redemption was attempted below the reward's cost.
    #[error("Insufficient balance: has {balance}, needs {cost}")]
    InsufficientBalance { balance: i64, cost: i64 },

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing, wrong or expired credentials.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Known identity without the required rights.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl LedgerError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UserNotFound(_)
            | Self::UserIdNotFound(_)
            | Self::ReasonNotFound(_)
            | Self::RewardNotFound(_)
            | Self::StarNotFound(_)
            | Self::RedemptionNotFound(_) => ErrorKind::NotFound,
            Self::ReasonRequired | Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::SerializationError(_) | Self::IoError(_) => ErrorKind::Storage,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
