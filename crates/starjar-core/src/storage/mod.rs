//! # Storage Backends
//!
//! `StorageBackend` selects between the volatile `MemoryStore` and the
//! persistent `RedbStore` at runtime while still being a single concrete
//! `LedgerStore` type for `Ledger<S>`.

mod redb_store;

pub use redb_store::RedbStore;

use crate::store::{CatalogSnapshot, LedgerStore, MemoryStore};
use crate::{
    LedgerError, NewReason, NewRedemption, NewReward, NewStar, NewUser, Reason, ReasonId,
    Redemption, RedemptionId, Reward, RewardId, Star, StarId, TranslationOwner, User, UserId,
};
use std::collections::BTreeMap;
use std::path::Path;

/// Storage backend for a ledger.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

// NOTE: StorageBackend does NOT implement Clone.
// RedbStore (database handle) cannot be safely cloned.

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    /// Open or create a redb database at `path`.
    pub fn open_redb(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        Ok(Self::Persistent(RedbStore::open(path)?))
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }
}

/// Forward a call to whichever store is active.
macro_rules! dispatch {
    ($self:ident . $method:ident ( $($arg:expr),* )) => {
        match $self {
            StorageBackend::InMemory(store) => store.$method($($arg),*),
            StorageBackend::Persistent(store) => store.$method($($arg),*),
        }
    };
}

impl LedgerStore for StorageBackend {
    fn insert_user(&mut self, user: NewUser) -> Result<User, LedgerError> {
        dispatch!(self.insert_user(user))
    }

    fn user(&self, id: UserId) -> Result<Option<User>, LedgerError> {
        dispatch!(self.user(id))
    }

    fn user_by_name(&self, username: &str) -> Result<Option<User>, LedgerError> {
        dispatch!(self.user_by_name(username))
    }

    fn users(&self) -> Result<Vec<User>, LedgerError> {
        dispatch!(self.users())
    }

    fn update_user(&mut self, user: &User) -> Result<(), LedgerError> {
        dispatch!(self.update_user(user))
    }

    fn remove_user(&mut self, id: UserId) -> Result<bool, LedgerError> {
        dispatch!(self.remove_user(id))
    }

    fn translations(
        &self,
        owner: TranslationOwner,
    ) -> Result<BTreeMap<String, String>, LedgerError> {
        dispatch!(self.translations(owner))
    }

    fn set_translation(
        &mut self,
        owner: TranslationOwner,
        lang: &str,
        text: &str,
    ) -> Result<(), LedgerError> {
        dispatch!(self.set_translation(owner, lang, text))
    }

    fn translation(
        &self,
        owner: TranslationOwner,
        lang: &str,
    ) -> Result<Option<String>, LedgerError> {
        dispatch!(self.translation(owner, lang))
    }

    fn insert_reason(&mut self, reason: NewReason) -> Result<Reason, LedgerError> {
        dispatch!(self.insert_reason(reason))
    }

    fn reason(&self, id: ReasonId) -> Result<Option<Reason>, LedgerError> {
        dispatch!(self.reason(id))
    }

    fn reasons(&self) -> Result<Vec<Reason>, LedgerError> {
        dispatch!(self.reasons())
    }

    fn update_reason(&mut self, reason: &Reason) -> Result<(), LedgerError> {
        dispatch!(self.update_reason(reason))
    }

    fn remove_reason(&mut self, id: ReasonId) -> Result<bool, LedgerError> {
        dispatch!(self.remove_reason(id))
    }

    fn insert_reward(&mut self, reward: NewReward) -> Result<Reward, LedgerError> {
        dispatch!(self.insert_reward(reward))
    }

    fn reward(&self, id: RewardId) -> Result<Option<Reward>, LedgerError> {
        dispatch!(self.reward(id))
    }

    fn rewards(&self) -> Result<Vec<Reward>, LedgerError> {
        dispatch!(self.rewards())
    }

    fn update_reward(&mut self, reward: &Reward) -> Result<(), LedgerError> {
        dispatch!(self.update_reward(reward))
    }

    fn remove_reward(&mut self, id: RewardId) -> Result<bool, LedgerError> {
        dispatch!(self.remove_reward(id))
    }

    fn insert_star(&mut self, star: NewStar) -> Result<Star, LedgerError> {
        dispatch!(self.insert_star(star))
    }

    fn stars(&self) -> Result<Vec<Star>, LedgerError> {
        dispatch!(self.stars())
    }

    fn rewrite_reason_stars(
        &mut self,
        reason: ReasonId,
        stars: i64,
    ) -> Result<usize, LedgerError> {
        dispatch!(self.rewrite_reason_stars(reason, stars))
    }

    fn remove_star(&mut self, id: StarId) -> Result<bool, LedgerError> {
        dispatch!(self.remove_star(id))
    }

    fn insert_redemption(
        &mut self,
        redemption: NewRedemption,
    ) -> Result<Redemption, LedgerError> {
        dispatch!(self.insert_redemption(redemption))
    }

    fn redemptions(&self) -> Result<Vec<Redemption>, LedgerError> {
        dispatch!(self.redemptions())
    }

    fn pin_redemption_costs(
        &mut self,
        reward: RewardId,
        cost: i64,
    ) -> Result<usize, LedgerError> {
        dispatch!(self.pin_redemption_costs(reward, cost))
    }

    fn remove_redemption(&mut self, id: RedemptionId) -> Result<bool, LedgerError> {
        dispatch!(self.remove_redemption(id))
    }

    fn setting(&self, key: &str) -> Result<Option<String>, LedgerError> {
        dispatch!(self.setting(key))
    }

    fn set_setting(&mut self, key: &str, value: &str) -> Result<(), LedgerError> {
        dispatch!(self.set_setting(key, value))
    }

    fn settings(&self) -> Result<BTreeMap<String, String>, LedgerError> {
        dispatch!(self.settings())
    }

    fn replace_catalog(&mut self, snapshot: CatalogSnapshot) -> Result<(), LedgerError> {
        dispatch!(self.replace_catalog(snapshot))
    }
}
