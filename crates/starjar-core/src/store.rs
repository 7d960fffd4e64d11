//! # Ledger Store
//!
//! The storage seam of the engine.
//!
//! This module defines the `LedgerStore` trait and its in-memory
//! implementation. The engine never holds a global handle: every `Ledger`
//! owns exactly one store value, which makes the store the only
//! synchronization boundary and lets tests swap in `MemoryStore`.
//!
//! All data structures use `BTreeMap` for deterministic ordering.

use crate::{
    LedgerError, NewReason, NewRedemption, NewReward, NewStar, NewUser, Reason, ReasonId,
    Redemption, RedemptionId, Reward, RewardId, Star, StarId, TranslationOwner, User, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// LEDGERSTORE TRAIT
// =============================================================================

/// Row-level operations over users, translations, catalog, ledgers and
/// settings.
///
/// Each write is atomic on its own. Cross-row business rules (defaults,
/// retroactivity, balance checks) live in the engine, not here.
pub trait LedgerStore {
    // ---- users ------------------------------------------------------------

    /// Insert a user. Fails with `Conflict` if the username is taken.
    fn insert_user(&mut self, user: NewUser) -> Result<User, LedgerError>;

    fn user(&self, id: UserId) -> Result<Option<User>, LedgerError>;

    fn user_by_name(&self, username: &str) -> Result<Option<User>, LedgerError>;

    /// All users in id order.
    fn users(&self) -> Result<Vec<User>, LedgerError>;

    /// Overwrite the password hash and admin flag of an existing user.
    fn update_user(&mut self, user: &User) -> Result<(), LedgerError>;

    /// Remove a user and everything owned by it: translations, awards and
    /// redemptions. Awards the user granted to others lose their awarder.
    ///
    /// Returns `false` if the user did not exist.
    fn remove_user(&mut self, id: UserId) -> Result<bool, LedgerError>;

    // ---- translations -----------------------------------------------------

    /// All translations of an owner, keyed by language.
    fn translations(&self, owner: TranslationOwner)
    -> Result<BTreeMap<String, String>, LedgerError>;

    /// Upsert one translation. Re-setting a language overwrites it.
    fn set_translation(
        &mut self,
        owner: TranslationOwner,
        lang: &str,
        text: &str,
    ) -> Result<(), LedgerError>;

    /// A single translation, if present.
    fn translation(
        &self,
        owner: TranslationOwner,
        lang: &str,
    ) -> Result<Option<String>, LedgerError> {
        Ok(self.translations(owner)?.remove(lang))
    }

    // ---- reasons ----------------------------------------------------------

    fn insert_reason(&mut self, reason: NewReason) -> Result<Reason, LedgerError>;

    fn reason(&self, id: ReasonId) -> Result<Option<Reason>, LedgerError>;

    /// All reasons in id order.
    fn reasons(&self) -> Result<Vec<Reason>, LedgerError>;

    /// Overwrite an existing reason (key changes are the caller's concern).
    fn update_reason(&mut self, reason: &Reason) -> Result<(), LedgerError>;

    /// Remove a reason and its translations. Awards keep their dangling id.
    fn remove_reason(&mut self, id: ReasonId) -> Result<bool, LedgerError>;

    fn reason_key_taken(&self, key: &str) -> Result<bool, LedgerError> {
        Ok(self.reasons()?.iter().any(|r| r.key == key))
    }

    /// Lowest-id reason whose translation in `lang` equals `text` exactly.
    fn find_reason_by_text(&self, lang: &str, text: &str) -> Result<Option<ReasonId>, LedgerError> {
        for reason in self.reasons()? {
            let owner = TranslationOwner::Reason(reason.id);
            if self.translation(owner, lang)?.as_deref() == Some(text) {
                return Ok(Some(reason.id));
            }
        }
        Ok(None)
    }

    // ---- rewards ----------------------------------------------------------

    fn insert_reward(&mut self, reward: NewReward) -> Result<Reward, LedgerError>;

    fn reward(&self, id: RewardId) -> Result<Option<Reward>, LedgerError>;

    /// All rewards in id order.
    fn rewards(&self) -> Result<Vec<Reward>, LedgerError>;

    fn update_reward(&mut self, reward: &Reward) -> Result<(), LedgerError>;

    /// Remove a reward and its translations.
    fn remove_reward(&mut self, id: RewardId) -> Result<bool, LedgerError>;

    fn reward_key_taken(&self, key: &str) -> Result<bool, LedgerError> {
        Ok(self.rewards()?.iter().any(|r| r.key == key))
    }

    // ---- awards -----------------------------------------------------------

    fn insert_star(&mut self, star: NewStar) -> Result<Star, LedgerError>;

    /// All awards in id order.
    fn stars(&self) -> Result<Vec<Star>, LedgerError>;

    /// Set `stars` on every award referencing `reason`. Returns the number of
    /// rewritten rows.
    fn rewrite_reason_stars(&mut self, reason: ReasonId, stars: i64)
    -> Result<usize, LedgerError>;

    fn remove_star(&mut self, id: StarId) -> Result<bool, LedgerError>;

    fn stars_for_user(&self, user: UserId) -> Result<Vec<Star>, LedgerError> {
        Ok(self
            .stars()?
            .into_iter()
            .filter(|s| s.user == user)
            .collect())
    }

    // ---- redemptions ------------------------------------------------------

    fn insert_redemption(&mut self, redemption: NewRedemption)
    -> Result<Redemption, LedgerError>;

    /// All redemptions in id order.
    fn redemptions(&self) -> Result<Vec<Redemption>, LedgerError>;

    /// Write `cost` into every redemption of `reward` whose cost is unset.
    /// Returns the number of pinned rows.
    fn pin_redemption_costs(&mut self, reward: RewardId, cost: i64)
    -> Result<usize, LedgerError>;

    fn remove_redemption(&mut self, id: RedemptionId) -> Result<bool, LedgerError>;

    fn redemptions_for_user(&self, user: UserId) -> Result<Vec<Redemption>, LedgerError> {
        Ok(self
            .redemptions()?
            .into_iter()
            .filter(|r| r.user == user)
            .collect())
    }

    // ---- settings ---------------------------------------------------------

    fn setting(&self, key: &str) -> Result<Option<String>, LedgerError>;

    fn set_setting(&mut self, key: &str, value: &str) -> Result<(), LedgerError>;

    fn settings(&self) -> Result<BTreeMap<String, String>, LedgerError>;

    // ---- bulk -------------------------------------------------------------

    /// Replace the whole catalog and both ledgers in one atomic unit.
    ///
    /// Clears reasons, rewards, awards, redemptions and their translations,
    /// replaces the listed users' translations, upserts the settings, then
    /// inserts the snapshot. On error nothing is changed.
    fn replace_catalog(&mut self, snapshot: CatalogSnapshot) -> Result<(), LedgerError>;
}

// =============================================================================
// CATALOG SNAPSHOT
// =============================================================================

/// A reason plus its translations, as staged for `replace_catalog`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotReason {
    pub reason: NewReason,
    pub translations: BTreeMap<String, String>,
}

/// A reward plus its translations, as staged for `replace_catalog`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotReward {
    pub reward: NewReward,
    pub translations: BTreeMap<String, String>,
}

/// An award whose reason is referenced by position in `CatalogSnapshot::reasons`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStar {
    pub user: UserId,
    pub reason: Option<usize>,
    pub reason_text: Option<String>,
    pub stars: i64,
    pub awarded_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// A redemption whose reward is referenced by position in `CatalogSnapshot::rewards`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRedemption {
    pub user: UserId,
    pub reward: usize,
    pub cost: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Complete replacement content for the catalog and ledgers.
///
/// Ids are assigned by the store on insertion, so cross references use
/// positions instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub reasons: Vec<SnapshotReason>,
    pub rewards: Vec<SnapshotReward>,
    pub stars: Vec<SnapshotStar>,
    pub redemptions: Vec<SnapshotRedemption>,
    /// Users whose translations are replaced wholesale.
    pub user_translations: BTreeMap<UserId, BTreeMap<String, String>>,
    pub settings: BTreeMap<String, String>,
}

impl CatalogSnapshot {
    /// Check internal consistency: positions in range, keys unique.
    pub fn validate(&self) -> Result<(), LedgerError> {
        let mut reason_keys = BTreeSet::new();
        for r in &self.reasons {
            if !reason_keys.insert(r.reason.key.as_str()) {
                return Err(LedgerError::Conflict(format!(
                    "duplicate reason key '{}'",
                    r.reason.key
                )));
            }
        }
        let mut reward_keys = BTreeSet::new();
        for r in &self.rewards {
            if !reward_keys.insert(r.reward.key.as_str()) {
                return Err(LedgerError::Conflict(format!(
                    "duplicate reward key '{}'",
                    r.reward.key
                )));
            }
        }
        if let Some(star) = self
            .stars
            .iter()
            .find(|s| s.reason.is_some_and(|i| i >= self.reasons.len()))
        {
            return Err(LedgerError::InvalidInput(format!(
                "award references reason position {:?} out of range",
                star.reason
            )));
        }
        if let Some(r) = self
            .redemptions
            .iter()
            .find(|r| r.reward >= self.rewards.len())
        {
            return Err(LedgerError::InvalidInput(format!(
                "redemption references reward position {} out of range",
                r.reward
            )));
        }
        Ok(())
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// In-memory store.
///
/// Ids start at 1 and are never reused, also across `replace_catalog`.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    users: BTreeMap<UserId, User>,
    translations: BTreeMap<TranslationOwner, BTreeMap<String, String>>,
    reasons: BTreeMap<ReasonId, Reason>,
    rewards: BTreeMap<RewardId, Reward>,
    stars: BTreeMap<StarId, Star>,
    redemptions: BTreeMap<RedemptionId, Redemption>,
    settings: BTreeMap<String, String>,
    next_user_id: u64,
    next_reason_id: u64,
    next_reward_id: u64,
    next_star_id: u64,
    next_redemption_id: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            users: BTreeMap::new(),
            translations: BTreeMap::new(),
            reasons: BTreeMap::new(),
            rewards: BTreeMap::new(),
            stars: BTreeMap::new(),
            redemptions: BTreeMap::new(),
            settings: BTreeMap::new(),
            next_user_id: 1,
            next_reason_id: 1,
            next_reward_id: 1,
            next_star_id: 1,
            next_redemption_id: 1,
        }
    }
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn clear_catalog(&mut self) {
        self.reasons.clear();
        self.rewards.clear();
        self.stars.clear();
        self.redemptions.clear();
        self.translations
            .retain(|owner, _| matches!(owner, TranslationOwner::User(_)));
    }
}

impl LedgerStore for MemoryStore {
    fn insert_user(&mut self, user: NewUser) -> Result<User, LedgerError> {
        if self.users.values().any(|u| u.username == user.username) {
            return Err(LedgerError::Conflict(format!(
                "username '{}' already exists",
                user.username
            )));
        }
        let id = UserId(self.next_user_id);
        self.next_user_id = self.next_user_id.saturating_add(1);
        let user = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            is_admin: user.is_admin,
        };
        self.users.insert(id, user.clone());
        Ok(user)
    }

    fn user(&self, id: UserId) -> Result<Option<User>, LedgerError> {
        Ok(self.users.get(&id).cloned())
    }

    fn user_by_name(&self, username: &str) -> Result<Option<User>, LedgerError> {
        Ok(self.users.values().find(|u| u.username == username).cloned())
    }

    fn users(&self) -> Result<Vec<User>, LedgerError> {
        Ok(self.users.values().cloned().collect())
    }

    fn update_user(&mut self, user: &User) -> Result<(), LedgerError> {
        let slot = self
            .users
            .get_mut(&user.id)
            .ok_or(LedgerError::UserIdNotFound(user.id))?;
        slot.password_hash.clone_from(&user.password_hash);
        slot.is_admin = user.is_admin;
        Ok(())
    }

    fn remove_user(&mut self, id: UserId) -> Result<bool, LedgerError> {
        if self.users.remove(&id).is_none() {
            return Ok(false);
        }
        self.translations.remove(&TranslationOwner::User(id));
        self.stars.retain(|_, s| s.user != id);
        self.redemptions.retain(|_, r| r.user != id);
        for star in self.stars.values_mut() {
            if star.awarded_by == Some(id) {
                star.awarded_by = None;
            }
        }
        Ok(true)
    }

    fn translations(
        &self,
        owner: TranslationOwner,
    ) -> Result<BTreeMap<String, String>, LedgerError> {
        Ok(self.translations.get(&owner).cloned().unwrap_or_default())
    }

    fn set_translation(
        &mut self,
        owner: TranslationOwner,
        lang: &str,
        text: &str,
    ) -> Result<(), LedgerError> {
        self.translations
            .entry(owner)
            .or_default()
            .insert(lang.to_string(), text.to_string());
        Ok(())
    }

    fn translation(
        &self,
        owner: TranslationOwner,
        lang: &str,
    ) -> Result<Option<String>, LedgerError> {
        Ok(self
            .translations
            .get(&owner)
            .and_then(|langs| langs.get(lang).cloned()))
    }

    fn insert_reason(&mut self, reason: NewReason) -> Result<Reason, LedgerError> {
        if self.reasons.values().any(|r| r.key == reason.key) {
            return Err(LedgerError::Conflict(format!(
                "reason key '{}' already exists",
                reason.key
            )));
        }
        let id = ReasonId(self.next_reason_id);
        self.next_reason_id = self.next_reason_id.saturating_add(1);
        let reason = Reason {
            id,
            key: reason.key,
            default_stars: reason.default_stars,
            created_at: reason.created_at,
        };
        self.reasons.insert(id, reason.clone());
        Ok(reason)
    }

    fn reason(&self, id: ReasonId) -> Result<Option<Reason>, LedgerError> {
        Ok(self.reasons.get(&id).cloned())
    }

    fn reasons(&self) -> Result<Vec<Reason>, LedgerError> {
        Ok(self.reasons.values().cloned().collect())
    }

    fn update_reason(&mut self, reason: &Reason) -> Result<(), LedgerError> {
        let slot = self
            .reasons
            .get_mut(&reason.id)
            .ok_or(LedgerError::ReasonNotFound(reason.id))?;
        *slot = reason.clone();
        Ok(())
    }

    fn remove_reason(&mut self, id: ReasonId) -> Result<bool, LedgerError> {
        self.translations.remove(&TranslationOwner::Reason(id));
        Ok(self.reasons.remove(&id).is_some())
    }

    fn insert_reward(&mut self, reward: NewReward) -> Result<Reward, LedgerError> {
        if self.rewards.values().any(|r| r.key == reward.key) {
            return Err(LedgerError::Conflict(format!(
                "reward key '{}' already exists",
                reward.key
            )));
        }
        let id = RewardId(self.next_reward_id);
        self.next_reward_id = self.next_reward_id.saturating_add(1);
        let reward = Reward {
            id,
            key: reward.key,
            cost: reward.cost,
            icon: reward.icon,
            adult_only: reward.adult_only,
            created_at: reward.created_at,
        };
        self.rewards.insert(id, reward.clone());
        Ok(reward)
    }

    fn reward(&self, id: RewardId) -> Result<Option<Reward>, LedgerError> {
        Ok(self.rewards.get(&id).cloned())
    }

    fn rewards(&self) -> Result<Vec<Reward>, LedgerError> {
        Ok(self.rewards.values().cloned().collect())
    }

    fn update_reward(&mut self, reward: &Reward) -> Result<(), LedgerError> {
        let slot = self
            .rewards
            .get_mut(&reward.id)
            .ok_or(LedgerError::RewardNotFound(reward.id))?;
        *slot = reward.clone();
        Ok(())
    }

    fn remove_reward(&mut self, id: RewardId) -> Result<bool, LedgerError> {
        self.translations.remove(&TranslationOwner::Reward(id));
        Ok(self.rewards.remove(&id).is_some())
    }

    fn insert_star(&mut self, star: NewStar) -> Result<Star, LedgerError> {
        let id = StarId(self.next_star_id);
        self.next_star_id = self.next_star_id.saturating_add(1);
        let star = Star {
            id,
            user: star.user,
            reason: star.reason,
            reason_text: star.reason_text,
            stars: star.stars,
            awarded_by: star.awarded_by,
            created_at: star.created_at,
        };
        self.stars.insert(id, star.clone());
        Ok(star)
    }

    fn stars(&self) -> Result<Vec<Star>, LedgerError> {
        Ok(self.stars.values().cloned().collect())
    }

    fn rewrite_reason_stars(
        &mut self,
        reason: ReasonId,
        stars: i64,
    ) -> Result<usize, LedgerError> {
        let mut rewritten = 0;
        for star in self.stars.values_mut() {
            if star.reason == Some(reason) {
                star.stars = stars;
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }

    fn remove_star(&mut self, id: StarId) -> Result<bool, LedgerError> {
        Ok(self.stars.remove(&id).is_some())
    }

    fn insert_redemption(
        &mut self,
        redemption: NewRedemption,
    ) -> Result<Redemption, LedgerError> {
        let id = RedemptionId(self.next_redemption_id);
        self.next_redemption_id = self.next_redemption_id.saturating_add(1);
        let redemption = Redemption {
            id,
            user: redemption.user,
            reward: redemption.reward,
            cost: redemption.cost,
            created_at: redemption.created_at,
        };
        self.redemptions.insert(id, redemption.clone());
        Ok(redemption)
    }

    fn redemptions(&self) -> Result<Vec<Redemption>, LedgerError> {
        Ok(self.redemptions.values().cloned().collect())
    }

    fn pin_redemption_costs(
        &mut self,
        reward: RewardId,
        cost: i64,
    ) -> Result<usize, LedgerError> {
        let mut pinned = 0;
        for redemption in self.redemptions.values_mut() {
            if redemption.reward == reward && redemption.cost.is_none() {
                redemption.cost = Some(cost);
                pinned += 1;
            }
        }
        Ok(pinned)
    }

    fn remove_redemption(&mut self, id: RedemptionId) -> Result<bool, LedgerError> {
        Ok(self.redemptions.remove(&id).is_some())
    }

    fn setting(&self, key: &str) -> Result<Option<String>, LedgerError> {
        Ok(self.settings.get(key).cloned())
    }

    fn set_setting(&mut self, key: &str, value: &str) -> Result<(), LedgerError> {
        self.settings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn settings(&self) -> Result<BTreeMap<String, String>, LedgerError> {
        Ok(self.settings.clone())
    }

    fn replace_catalog(&mut self, snapshot: CatalogSnapshot) -> Result<(), LedgerError> {
        snapshot.validate()?;

        // Stage on a copy so a failure leaves `self` untouched.
        let mut staged = self.clone();
        staged.clear_catalog();

        let mut reason_ids = Vec::with_capacity(snapshot.reasons.len());
        for entry in snapshot.reasons {
            let reason = staged.insert_reason(entry.reason)?;
            if !entry.translations.is_empty() {
                staged
                    .translations
                    .insert(TranslationOwner::Reason(reason.id), entry.translations);
            }
            reason_ids.push(reason.id);
        }

        let mut reward_ids = Vec::with_capacity(snapshot.rewards.len());
        for entry in snapshot.rewards {
            let reward = staged.insert_reward(entry.reward)?;
            if !entry.translations.is_empty() {
                staged
                    .translations
                    .insert(TranslationOwner::Reward(reward.id), entry.translations);
            }
            reward_ids.push(reward.id);
        }

        for s in snapshot.stars {
            staged.insert_star(NewStar {
                user: s.user,
                reason: s.reason.and_then(|i| reason_ids.get(i).copied()),
                reason_text: s.reason_text,
                stars: s.stars,
                awarded_by: s.awarded_by,
                created_at: s.created_at,
            })?;
        }

        for r in snapshot.redemptions {
            let reward = reward_ids
                .get(r.reward)
                .copied()
                .ok_or_else(|| LedgerError::InvalidInput("reward position".to_string()))?;
            staged.insert_redemption(NewRedemption {
                user: r.user,
                reward,
                cost: r.cost,
                created_at: r.created_at,
            })?;
        }

        for (user, langs) in snapshot.user_translations {
            let owner = TranslationOwner::User(user);
            if langs.is_empty() {
                staged.translations.remove(&owner);
            } else {
                staged.translations.insert(owner, langs);
            }
        }

        staged.settings.extend(snapshot.settings);

        *self = staged;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            password_hash: String::new(),
            is_admin: false,
        }
    }

    fn new_reason(key: &str) -> NewReason {
        NewReason {
            key: key.to_string(),
            default_stars: 1,
            created_at: Utc::now(),
        }
    }

    fn new_reward(key: &str, cost: i64) -> NewReward {
        NewReward {
            key: key.to_string(),
            cost,
            icon: String::new(),
            adult_only: false,
            created_at: Utc::now(),
        }
    }

    fn new_star(user: UserId, reason: Option<ReasonId>, stars: i64) -> NewStar {
        NewStar {
            user,
            reason,
            reason_text: None,
            stars,
            awarded_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut store = MemoryStore::new();
        let a = store.insert_user(new_user("a")).expect("insert");
        let b = store.insert_user(new_user("b")).expect("insert");
        assert_eq!(a.id, UserId(1));
        assert_eq!(b.id, UserId(2));
    }

    #[test]
    fn duplicate_username_conflicts() {
        let mut store = MemoryStore::new();
        store.insert_user(new_user("ray")).expect("insert");
        let err = store.insert_user(new_user("ray"));
        assert!(matches!(err, Err(LedgerError::Conflict(_))));
    }

    #[test]
    fn translation_upsert_overwrites() {
        let mut store = MemoryStore::new();
        let owner = TranslationOwner::Reason(ReasonId(1));
        store.set_translation(owner, "en", "Dishes").expect("set");
        store.set_translation(owner, "en", "Washing up").expect("set");

        let all = store.translations(owner).expect("get");
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("en").map(String::as_str), Some("Washing up"));
    }

    #[test]
    fn find_reason_by_text_is_exact() {
        let mut store = MemoryStore::new();
        let reason = store.insert_reason(new_reason("dishes")).expect("insert");
        store
            .set_translation(TranslationOwner::Reason(reason.id), "en", "Dishes")
            .expect("set");

        assert_eq!(
            store.find_reason_by_text("en", "Dishes").expect("find"),
            Some(reason.id)
        );
        assert_eq!(store.find_reason_by_text("en", "dishes").expect("find"), None);
        assert_eq!(store.find_reason_by_text("fr", "Dishes").expect("find"), None);
    }

    #[test]
    fn rewrite_reason_stars_touches_only_that_reason() {
        let mut store = MemoryStore::new();
        let user = store.insert_user(new_user("theo")).expect("insert").id;
        let a = store.insert_reason(new_reason("a")).expect("insert").id;
        let b = store.insert_reason(new_reason("b")).expect("insert").id;
        store.insert_star(new_star(user, Some(a), 1)).expect("star");
        store.insert_star(new_star(user, Some(a), 2)).expect("star");
        store.insert_star(new_star(user, Some(b), 3)).expect("star");

        assert_eq!(store.rewrite_reason_stars(a, 5).expect("rewrite"), 2);
        let amounts: Vec<i64> = store.stars().expect("stars").iter().map(|s| s.stars).collect();
        assert_eq!(amounts, vec![5, 5, 3]);
    }

    #[test]
    fn pin_redemption_costs_only_fills_unset() {
        let mut store = MemoryStore::new();
        let user = store.insert_user(new_user("ray")).expect("insert").id;
        let reward = store.insert_reward(new_reward("movie", 10)).expect("insert").id;
        store
            .insert_redemption(NewRedemption {
                user,
                reward,
                cost: None,
                created_at: Utc::now(),
            })
            .expect("insert");
        store
            .insert_redemption(NewRedemption {
                user,
                reward,
                cost: Some(7),
                created_at: Utc::now(),
            })
            .expect("insert");

        assert_eq!(store.pin_redemption_costs(reward, 10).expect("pin"), 1);
        let costs: Vec<Option<i64>> = store
            .redemptions()
            .expect("list")
            .iter()
            .map(|r| r.cost)
            .collect();
        assert_eq!(costs, vec![Some(10), Some(7)]);
    }

    #[test]
    fn remove_user_cascades() {
        let mut store = MemoryStore::new();
        let theo = store.insert_user(new_user("theo")).expect("insert").id;
        let mom = store.insert_user(new_user("mom")).expect("insert").id;
        store
            .set_translation(TranslationOwner::User(theo), "en", "Theo")
            .expect("set");
        store.insert_star(new_star(theo, None, 1)).expect("star");
        let mut granted = new_star(mom, None, 1);
        granted.awarded_by = Some(theo);
        store.insert_star(granted).expect("star");

        assert!(store.remove_user(theo).expect("remove"));
        assert!(store.user(theo).expect("get").is_none());
        assert!(store.translations(TranslationOwner::User(theo)).expect("t").is_empty());
        let stars = store.stars().expect("stars");
        assert_eq!(stars.len(), 1);
        assert_eq!(stars[0].user, mom);
        assert_eq!(stars[0].awarded_by, None);
        assert!(!store.remove_user(theo).expect("remove again"));
    }

    #[test]
    fn replace_catalog_keeps_users_and_maps_positions() {
        let mut store = MemoryStore::new();
        let ray = store.insert_user(new_user("ray")).expect("insert").id;
        let old = store.insert_reason(new_reason("old")).expect("insert").id;
        store.insert_star(new_star(ray, Some(old), 4)).expect("star");

        let snapshot = CatalogSnapshot {
            reasons: vec![SnapshotReason {
                reason: new_reason("fresh"),
                translations: BTreeMap::from([("en".to_string(), "Fresh".to_string())]),
            }],
            rewards: vec![SnapshotReward {
                reward: new_reward("movie", 10),
                translations: BTreeMap::new(),
            }],
            stars: vec![SnapshotStar {
                user: ray,
                reason: Some(0),
                reason_text: None,
                stars: 2,
                awarded_by: None,
                created_at: Utc::now(),
            }],
            redemptions: vec![SnapshotRedemption {
                user: ray,
                reward: 0,
                cost: None,
                created_at: Utc::now(),
            }],
            user_translations: BTreeMap::new(),
            settings: BTreeMap::from([("lang".to_string(), "en".to_string())]),
        };

        store.replace_catalog(snapshot).expect("replace");

        assert!(store.user(ray).expect("user").is_some());
        let reasons = store.reasons().expect("reasons");
        assert_eq!(reasons.len(), 1);
        assert_eq!(reasons[0].key, "fresh");
        assert_ne!(reasons[0].id, old);
        let stars = store.stars().expect("stars");
        assert_eq!(stars.len(), 1);
        assert_eq!(stars[0].reason, Some(reasons[0].id));
        assert_eq!(store.redemptions().expect("redemptions").len(), 1);
        assert_eq!(store.setting("lang").expect("setting").as_deref(), Some("en"));
    }

    #[test]
    fn replace_catalog_rejects_bad_positions_without_changes() {
        let mut store = MemoryStore::new();
        let ray = store.insert_user(new_user("ray")).expect("insert").id;
        store.insert_reason(new_reason("keep")).expect("insert");

        let snapshot = CatalogSnapshot {
            stars: vec![SnapshotStar {
                user: ray,
                reason: Some(3),
                reason_text: None,
                stars: 1,
                awarded_by: None,
                created_at: Utc::now(),
            }],
            ..CatalogSnapshot::default()
        };

        assert!(store.replace_catalog(snapshot).is_err());
        assert_eq!(store.reasons().expect("reasons").len(), 1);
    }
}
