//! # Reason and Reward Catalog
//!
//! Explicit catalog management. Reasons are also created implicitly by
//! free-text awards (see `Ledger::record_award`).
//!
//! Keys come from the English label through the key generator and never
//! change afterwards. Display text lives in translations only.

use crate::keys::{make_key, try_uniquify};
use crate::ledger::Ledger;
use crate::primitives::{DEFAULT_AWARD_STARS, DEFAULT_LANG, MIN_REWARD_COST};
use crate::store::LedgerStore;
use crate::translation::{resolve, validate_text};
use crate::{LedgerError, NewReward, Reason, ReasonId, Reward, RewardId, TranslationOwner};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::info;

/// A reason with its translations and the number of awards referencing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasonSummary {
    #[serde(flatten)]
    pub reason: Reason,
    /// Display text in the requested language.
    pub text: String,
    pub translations: BTreeMap<String, String>,
    pub count: usize,
}

/// A reward with its translations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewardSummary {
    #[serde(flatten)]
    pub reward: Reward,
    /// Display text in the requested language.
    pub text: String,
    pub translations: BTreeMap<String, String>,
}

/// A reward created by `seed_rewards`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReward {
    pub key: String,
    /// English display text.
    pub name: String,
    pub cost: i64,
    #[serde(default)]
    pub icon: String,
}

impl SeedReward {
    fn new(key: &str, name: &str, cost: i64, icon: &str) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            cost,
            icon: icon.to_string(),
        }
    }
}

/// The stock reward catalog.
pub fn default_rewards() -> Vec<SeedReward> {
    vec![
        SeedReward::new("extra_screen_time", "Extra screen time", 5, "📱"),
        SeedReward::new("choose_dinner", "Choose dinner", 6, "🍽️"),
        SeedReward::new("stay_up_late", "Stay up late", 7, "🌙"),
        SeedReward::new("ice_cream_outing", "Ice cream outing", 8, "🍦"),
        SeedReward::new("movie_time", "Movie time", 10, "🎬"),
        SeedReward::new("day_trip_choice", "Day trip choice", 15, "🚗"),
    ]
}

impl<S: LedgerStore> Ledger<S> {
    // ---- reasons ----------------------------------------------------------

    pub fn reason(&self, id: ReasonId) -> Result<Option<Reason>, LedgerError> {
        self.store().reason(id)
    }

    /// All reasons, most used first.
    pub fn reasons(&self, lang: &str) -> Result<Vec<ReasonSummary>, LedgerError> {
        let mut counts: BTreeMap<ReasonId, usize> = BTreeMap::new();
        for star in self.store().stars()? {
            if let Some(reason) = star.reason {
                let slot = counts.entry(reason).or_insert(0);
                *slot = slot.saturating_add(1);
            }
        }

        let mut summaries = Vec::new();
        for reason in self.store().reasons()? {
            let owner = TranslationOwner::Reason(reason.id);
            summaries.push(ReasonSummary {
                count: counts.get(&reason.id).copied().unwrap_or(0),
                text: resolve(self.store(), owner, lang),
                translations: self.store().translations(owner)?,
                reason,
            });
        }
        summaries.sort_by_key(|s| (Reverse(s.count), s.reason.id));
        Ok(summaries)
    }

    /// Add a reason from its English text.
    ///
    /// Fails with `Conflict` if a reason already has this exact English text,
    /// since free-text awards would no longer know which one to reuse.
    pub fn create_reason(&mut self, text: &str, stars: i64) -> Result<Reason, LedgerError> {
        validate_text(text)?;
        if self.store().find_reason_by_text(DEFAULT_LANG, text)?.is_some() {
            return Err(LedgerError::Conflict(format!(
                "a reason with text '{}' already exists",
                text
            )));
        }
        let reason = self.create_reason_from_text(text, stars.max(DEFAULT_AWARD_STARS))?;
        info!(reason = reason.id.0, key = %reason.key, "reason created");
        Ok(reason)
    }

    /// Remove a reason and its translations.
    ///
    /// Awards keep the now dangling id and their text snapshot.
    pub fn delete_reason(&mut self, id: ReasonId) -> Result<(), LedgerError> {
        if !self.store_mut().remove_reason(id)? {
            return Err(LedgerError::ReasonNotFound(id));
        }
        info!(reason = id.0, "reason deleted");
        Ok(())
    }

    // ---- rewards ----------------------------------------------------------

    pub fn reward(&self, id: RewardId) -> Result<Option<Reward>, LedgerError> {
        self.store().reward(id)
    }

    /// All rewards, cheapest first.
    pub fn rewards(&self, lang: &str) -> Result<Vec<RewardSummary>, LedgerError> {
        let mut summaries = Vec::new();
        for reward in self.store().rewards()? {
            let owner = TranslationOwner::Reward(reward.id);
            summaries.push(RewardSummary {
                text: resolve(self.store(), owner, lang),
                translations: self.store().translations(owner)?,
                reward,
            });
        }
        summaries.sort_by_key(|s| (s.reward.cost, s.reward.id));
        Ok(summaries)
    }

    /// Add a reward from its English name. Costs below 1 are clamped.
    pub fn create_reward(
        &mut self,
        name: &str,
        cost: i64,
        icon: &str,
        adult_only: bool,
    ) -> Result<Reward, LedgerError> {
        validate_text(name)?;
        let key = try_uniquify(&make_key(name), |k| self.store().reward_key_taken(k))?;
        self.insert_reward_with_name(key, name, cost, icon, adult_only)
    }

    fn insert_reward_with_name(
        &mut self,
        key: String,
        name: &str,
        cost: i64,
        icon: &str,
        adult_only: bool,
    ) -> Result<Reward, LedgerError> {
        let reward = self.store_mut().insert_reward(NewReward {
            key,
            cost: cost.max(MIN_REWARD_COST),
            icon: icon.to_string(),
            adult_only,
            created_at: Utc::now(),
        })?;
        self.store_mut()
            .set_translation(TranslationOwner::Reward(reward.id), DEFAULT_LANG, name)?;
        info!(reward = reward.id.0, key = %reward.key, cost = reward.cost, "reward created");
        Ok(reward)
    }

    /// Change a reward's English name and icon. The key stays.
    pub fn update_reward(&mut self, id: RewardId, name: &str, icon: &str) -> Result<Reward, LedgerError> {
        validate_text(name)?;
        let mut reward = self
            .store()
            .reward(id)?
            .ok_or(LedgerError::RewardNotFound(id))?;
        reward.icon = icon.to_string();
        self.store_mut().update_reward(&reward)?;
        self.store_mut()
            .set_translation(TranslationOwner::Reward(id), DEFAULT_LANG, name)?;
        Ok(reward)
    }

    pub fn set_reward_adult_only(&mut self, id: RewardId, adult_only: bool) -> Result<Reward, LedgerError> {
        let mut reward = self
            .store()
            .reward(id)?
            .ok_or(LedgerError::RewardNotFound(id))?;
        reward.adult_only = adult_only;
        self.store_mut().update_reward(&reward)?;
        Ok(reward)
    }

    /// Remove a reward and its translations.
    ///
    /// Refused with `Conflict` while any redemption references it.
    pub fn delete_reward(&mut self, id: RewardId) -> Result<(), LedgerError> {
        if self.store().reward(id)?.is_none() {
            return Err(LedgerError::RewardNotFound(id));
        }
        let in_use = self
            .store()
            .redemptions()?
            .iter()
            .filter(|r| r.reward == id)
            .count();
        if in_use > 0 {
            return Err(LedgerError::Conflict(format!(
                "reward {} is referenced by {} redemption(s)",
                id.0, in_use
            )));
        }
        self.store_mut().remove_reward(id)?;
        info!(reward = id.0, "reward deleted");
        Ok(())
    }

    /// Create the given rewards if the reward catalog is empty.
    ///
    /// Returns the number of rewards created.
    pub fn seed_rewards(&mut self, rewards: &[SeedReward]) -> Result<usize, LedgerError> {
        if !self.store().rewards()?.is_empty() {
            return Ok(0);
        }
        for seed in rewards {
            let key = if seed.key.is_empty() {
                make_key(&seed.name)
            } else {
                seed.key.clone()
            };
            self.insert_reward_with_name(key, &seed.name, seed.cost, &seed.icon, false)?;
        }
        info!(count = rewards.len(), "seeded rewards");
        Ok(rewards.len())
    }
}

// =============================================================================
// TESTS
// =============================================================================
