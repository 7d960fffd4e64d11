//! # starjar-core
//!
//! The star ledger engine for Starjar.
//!
//! Children earn stars for reasons and spend them on rewards. The engine keeps
//! two append-only ledgers (awards and redemptions) over a small catalog of
//! reasons and rewards, and derives every balance from them on read.
//!
//! ## Architectural Constraints
//!
//! - Balances are never stored: `balance = Σ awards − Σ effective costs`
//! - Display text is per language with a fixed fallback chain, never an error
//! - All state lives behind the `LedgerStore` trait (in-memory or redb)
//! - No async, no network dependencies

// =============================================================================
// MODULES
// =============================================================================

pub mod catalog;
pub mod export;
pub mod keys;
pub mod ledger;
pub mod primitives;
pub mod storage;
pub mod store;
pub mod translation;
pub mod types;
pub mod users;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Actor, ErrorKind, LedgerError, NewReason, NewRedemption, NewReward, NewStar, NewUser, Reason,
    ReasonId, Redemption, RedemptionId, Reward, RewardId, Star, StarId, TranslationOwner, User,
    UserId,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use catalog::{ReasonSummary, RewardSummary, SeedReward, default_rewards};
pub use export::{
    BackupHeader, ExportDocument, ImportMode, ImportReport, SkippedRecord, decode_backup,
    encode_backup,
};
pub use keys::{make_key, try_uniquify, uniquify};
pub use ledger::{AwardEntry, AwardRequest, Ledger, LeaderboardEntry, RedemptionEntry};
pub use storage::{RedbStore, StorageBackend};
pub use store::{CatalogSnapshot, LedgerStore, MemoryStore};
pub use translation::{resolve, resolve_award_reason};
pub use users::{
    DEFAULT_SEED_PASSWORD, SeedUser, default_seed_users, hash_password, new_session_token,
    verify_password,
};
