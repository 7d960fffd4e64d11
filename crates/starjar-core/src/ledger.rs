//! # Ledger Engine
//!
//! `Ledger<S>` owns its store handle and is the single entry point of the
//! engine. This module holds the award and redemption ledgers, balance
//! computation, retroactive value changes, and the denormalized listings.
//!
//! ## Balances
//!
//! There is no stored running total. A balance is recomputed from both
//! ledgers on every read:
//!
//! ```text
//! balance(u) = Σ star.stars − Σ effective_cost(redemption)
//! effective_cost(r) = r.cost, or the reward's current cost when unset
//! ```
//!
//! ## Serialization point
//!
//! Writes take `&mut self`. A caller sharing one `Ledger` between threads
//! must wrap it in a lock, and `redeem` then runs its balance check and the
//! debit under that single exclusive borrow.

use crate::primitives::{
    DEFAULT_AWARD_STARS, DEFAULT_LANG, DEFAULT_REDEMPTION_LIMIT, MAX_REDEMPTION_LIMIT,
    MAX_TEXT_LENGTH, MIN_REWARD_COST,
};
use crate::keys::{make_key, try_uniquify};
use crate::store::{LedgerStore, MemoryStore};
use crate::translation::{resolve, resolve_award_reason};
use crate::{
    LedgerError, NewReason, NewRedemption, NewStar, Reason, ReasonId, Redemption, RedemptionId,
    Reward, RewardId, Star, StarId, TranslationOwner, User, UserId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::{debug, info};

// =============================================================================
// LEDGER
// =============================================================================

/// The star ledger engine.
#[derive(Debug, Default)]
pub struct Ledger<S> {
    store: S,
}

impl<S: LedgerStore> Ledger<S> {
    /// Wrap an explicitly constructed store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Give back the store.
    pub fn into_store(self) -> S {
        self.store
    }
}

impl Ledger<MemoryStore> {
    /// A ledger over a fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

// =============================================================================
// REQUEST AND LISTING TYPES
// =============================================================================

/// Input of `record_award`.
///
/// Exactly one of `reason_id` and `reason_text` is expected. When both are
/// given the id wins. `ReasonId(0)` counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwardRequest {
    /// Beneficiary.
    pub username: String,
    pub reason_id: Option<ReasonId>,
    pub reason_text: Option<String>,
    /// Star override. Non-positive values are ignored.
    pub stars: Option<i64>,
    /// Awarding user. `None` for system or API-key awards.
    pub awarded_by: Option<UserId>,
}

impl AwardRequest {
    /// Award for a catalog reason.
    pub fn for_reason(username: impl Into<String>, reason: ReasonId) -> Self {
        Self {
            username: username.into(),
            reason_id: Some(reason),
            ..Self::default()
        }
    }

    /// Award for a free-text reason.
    pub fn for_text(username: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            reason_text: Some(text.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_stars(mut self, stars: i64) -> Self {
        self.stars = Some(stars);
        self
    }

    #[must_use]
    pub fn awarded_by(mut self, user: UserId) -> Self {
        self.awarded_by = Some(user);
        self
    }
}

/// An award with its display text resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AwardEntry {
    pub id: StarId,
    pub user: UserId,
    pub username: String,
    pub user_display: String,
    pub reason: Option<ReasonId>,
    pub reason_text: Option<String>,
    pub reason_display: String,
    pub stars: i64,
    pub awarded_by: Option<UserId>,
    pub awarded_by_display: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A redemption with its display text and effective cost resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedemptionEntry {
    pub id: RedemptionId,
    pub user: UserId,
    pub username: String,
    pub user_display: String,
    pub reward: RewardId,
    pub reward_display: String,
    pub reward_icon: String,
    /// Stored snapshot, `None` while the cost floats.
    pub cost: Option<i64>,
    pub effective_cost: i64,
    pub created_at: DateTime<Utc>,
}

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub user: UserId,
    pub username: String,
    pub display_name: String,
    pub is_admin: bool,
    /// Sum of all awards ever received.
    pub total_awarded: i64,
    pub balance: i64,
}

// =============================================================================
// BALANCE HELPERS
// =============================================================================

fn reward_costs(rewards: &[Reward]) -> BTreeMap<RewardId, i64> {
    rewards.iter().map(|r| (r.id, r.cost)).collect()
}

/// Price charged by a redemption. A dangling reward counts as zero.
fn effective_cost(redemption: &Redemption, costs: &BTreeMap<RewardId, i64>) -> i64 {
    redemption
        .cost
        .unwrap_or_else(|| costs.get(&redemption.reward).copied().unwrap_or(0))
}

fn sum_stars<'a>(stars: impl Iterator<Item = &'a Star>) -> i64 {
    stars.fold(0i64, |acc, s| acc.saturating_add(s.stars))
}

fn sum_costs<'a>(
    redemptions: impl Iterator<Item = &'a Redemption>,
    costs: &BTreeMap<RewardId, i64>,
) -> i64 {
    redemptions.fold(0i64, |acc, r| acc.saturating_add(effective_cost(r, costs)))
}

// =============================================================================
// LEDGER OPERATIONS
// =============================================================================

impl<S: LedgerStore> Ledger<S> {
    fn require_user_by_name(&self, username: &str) -> Result<User, LedgerError> {
        self.store
            .user_by_name(username)?
            .ok_or_else(|| LedgerError::UserNotFound(username.to_string()))
    }

    fn require_reward(&self, id: RewardId) -> Result<Reward, LedgerError> {
        self.store.reward(id)?.ok_or(LedgerError::RewardNotFound(id))
    }

    /// Current balance of a user, recomputed from both ledgers.
    pub fn balance(&self, user: UserId) -> Result<i64, LedgerError> {
        if self.store.user(user)?.is_none() {
            return Err(LedgerError::UserIdNotFound(user));
        }
        let costs = reward_costs(&self.store.rewards()?);
        let credits = sum_stars(self.store.stars_for_user(user)?.iter());
        let debits = sum_costs(self.store.redemptions_for_user(user)?.iter(), &costs);
        Ok(credits.saturating_sub(debits))
    }

    /// Current balance of a user looked up by username.
    pub fn balance_of(&self, username: &str) -> Result<i64, LedgerError> {
        let user = self.require_user_by_name(username)?;
        self.balance(user.id)
    }

    /// Append an award to the ledger.
    ///
    /// With a reason id, the star count is the override, else the reason's
    /// `default_stars` (or 1 when that is not positive). With free text, an
    /// existing reason whose English text matches exactly is reused;
    /// otherwise a new reason is created whose value is the resolved count.
    pub fn record_award(&mut self, request: AwardRequest) -> Result<Star, LedgerError> {
        let user = self.require_user_by_name(&request.username)?;
        if let Some(by) = request.awarded_by
            && self.store.user(by)?.is_none()
        {
            return Err(LedgerError::UserIdNotFound(by));
        }

        let stars_override = request.stars.filter(|s| *s > 0);
        let reason_id = request.reason_id.filter(|id| id.0 > 0);

        let (reason, reason_text, stars) = match reason_id {
            Some(id) => {
                let reason = self
                    .store
                    .reason(id)?
                    .ok_or(LedgerError::ReasonNotFound(id))?;
                let stars = stars_override.unwrap_or(if reason.default_stars > 0 {
                    reason.default_stars
                } else {
                    DEFAULT_AWARD_STARS
                });
                let snapshot = self
                    .store
                    .translation(TranslationOwner::Reason(id), DEFAULT_LANG)?
                    .filter(|t| !t.is_empty());
                (id, snapshot, stars)
            }
            None => {
                let text = request
                    .reason_text
                    .filter(|t| !t.trim().is_empty())
                    .ok_or(LedgerError::ReasonRequired)?;
                if text.len() > MAX_TEXT_LENGTH {
                    return Err(LedgerError::InvalidInput(format!(
                        "reason text longer than {} bytes",
                        MAX_TEXT_LENGTH
                    )));
                }
                let stars = stars_override.unwrap_or(DEFAULT_AWARD_STARS);
                let id = match self.store.find_reason_by_text(DEFAULT_LANG, &text)? {
                    Some(existing) => existing,
                    None => self.create_reason_from_text(&text, stars)?.id,
                };
                (id, Some(text), stars)
            }
        };

        let star = self.store.insert_star(NewStar {
            user: user.id,
            reason: Some(reason),
            reason_text,
            stars,
            awarded_by: request.awarded_by,
            created_at: Utc::now(),
        })?;
        info!(
            user = %user.username,
            reason = reason.0,
            stars,
            awarded_by = ?request.awarded_by.map(|u| u.0),
            "award recorded"
        );
        Ok(star)
    }

    /// Create a reason keyed from `text` with an English translation.
    pub(crate) fn create_reason_from_text(
        &mut self,
        text: &str,
        default_stars: i64,
    ) -> Result<Reason, LedgerError> {
        let base = make_key(text);
        let key = try_uniquify(&base, |k| self.store.reason_key_taken(k))?;
        let reason = self.store.insert_reason(NewReason {
            key,
            default_stars,
            created_at: Utc::now(),
        })?;
        self.store
            .set_translation(TranslationOwner::Reason(reason.id), DEFAULT_LANG, text)?;
        debug!(reason = reason.id.0, key = %reason.key, "reason created");
        Ok(reason)
    }

    /// Append a redemption with the reward's current cost as snapshot.
    ///
    /// Does not check the balance. Use `redeem` for the checked variant.
    pub fn record_redemption(
        &mut self,
        username: &str,
        reward: RewardId,
    ) -> Result<Redemption, LedgerError> {
        let user = self.require_user_by_name(username)?;
        let reward = self.require_reward(reward)?;
        let redemption = self.store.insert_redemption(NewRedemption {
            user: user.id,
            reward: reward.id,
            cost: Some(reward.cost),
            created_at: Utc::now(),
        })?;
        info!(
            user = %user.username,
            reward = reward.id.0,
            cost = reward.cost,
            "redemption recorded"
        );
        Ok(redemption)
    }

    /// Redeem a reward if the user can afford it.
    ///
    /// Fails with `InsufficientBalance` and leaves the ledger untouched when
    /// the balance is below the reward's cost.
    pub fn redeem(&mut self, username: &str, reward: RewardId) -> Result<Redemption, LedgerError> {
        let user = self.require_user_by_name(username)?;
        let reward_row = self.require_reward(reward)?;
        let balance = self.balance(user.id)?;
        if balance < reward_row.cost {
            debug!(user = %user.username, balance, cost = reward_row.cost, "redemption refused");
            return Err(LedgerError::InsufficientBalance {
                balance,
                cost: reward_row.cost,
            });
        }
        self.record_redemption(username, reward)
    }

    /// Change a reason's star value.
    ///
    /// Values below 1 are clamped. When `retroactive`, every existing award
    /// for this reason is rewritten to the new value as well.
    pub fn set_reason_stars(
        &mut self,
        id: ReasonId,
        stars: i64,
        retroactive: bool,
    ) -> Result<Reason, LedgerError> {
        let mut reason = self
            .store
            .reason(id)?
            .ok_or(LedgerError::ReasonNotFound(id))?;
        reason.default_stars = stars.max(DEFAULT_AWARD_STARS);
        self.store.update_reason(&reason)?;
        let rewritten = if retroactive {
            self.store.rewrite_reason_stars(id, reason.default_stars)?
        } else {
            0
        };
        info!(
            reason = id.0,
            stars = reason.default_stars,
            retroactive,
            rewritten,
            "reason value changed"
        );
        Ok(reason)
    }

    /// Change a reward's cost.
    ///
    /// Values below 1 are clamped. When `retroactive` is false, redemptions
    /// without a cost snapshot are first pinned to the old cost. When true
    /// they keep floating and are charged at the new price.
    pub fn set_reward_cost(
        &mut self,
        id: RewardId,
        cost: i64,
        retroactive: bool,
    ) -> Result<Reward, LedgerError> {
        let mut reward = self.require_reward(id)?;
        let pinned = if retroactive {
            0
        } else {
            self.store.pin_redemption_costs(id, reward.cost)?
        };
        reward.cost = cost.max(MIN_REWARD_COST);
        self.store.update_reward(&reward)?;
        info!(
            reward = id.0,
            cost = reward.cost,
            retroactive,
            pinned,
            "reward cost changed"
        );
        Ok(reward)
    }

    /// Remove one award. The balance simply loses its contribution.
    pub fn delete_star(&mut self, id: StarId) -> Result<(), LedgerError> {
        if !self.store.remove_star(id)? {
            return Err(LedgerError::StarNotFound(id));
        }
        info!(star = id.0, "award deleted");
        Ok(())
    }

    /// Remove one redemption.
    pub fn delete_redemption(&mut self, id: RedemptionId) -> Result<(), LedgerError> {
        if !self.store.remove_redemption(id)? {
            return Err(LedgerError::RedemptionNotFound(id));
        }
        info!(redemption = id.0, "redemption deleted");
        Ok(())
    }

    // ---- listings ---------------------------------------------------------

    /// Awards, newest first, optionally for one beneficiary.
    ///
    /// An unknown username yields an empty list.
    pub fn list_awards(
        &self,
        username: Option<&str>,
        lang: &str,
    ) -> Result<Vec<AwardEntry>, LedgerError> {
        let mut stars = match username {
            Some(name) => match self.store.user_by_name(name)? {
                Some(user) => self.store.stars_for_user(user.id)?,
                None => return Ok(Vec::new()),
            },
            None => self.store.stars()?,
        };
        stars.sort_by_key(|s| (Reverse(s.created_at), Reverse(s.id)));

        let users = self.user_index()?;
        Ok(stars
            .into_iter()
            .map(|star| {
                let reason_display = resolve_award_reason(&self.store, &star, lang);
                AwardEntry {
                    id: star.id,
                    user: star.user,
                    username: users.get(&star.user).cloned().unwrap_or_default(),
                    user_display: resolve(&self.store, TranslationOwner::User(star.user), lang),
                    reason: star.reason,
                    reason_text: star.reason_text,
                    reason_display,
                    stars: star.stars,
                    awarded_by: star.awarded_by,
                    awarded_by_display: star
                        .awarded_by
                        .map(|by| resolve(&self.store, TranslationOwner::User(by), lang)),
                    created_at: star.created_at,
                }
            })
            .collect())
    }

    /// Most recent redemptions, optionally for one user.
    ///
    /// `limit` defaults to 50 and is capped at 10 000.
    pub fn list_redemptions(
        &self,
        limit: Option<usize>,
        user: Option<UserId>,
        lang: &str,
    ) -> Result<Vec<RedemptionEntry>, LedgerError> {
        let limit = limit
            .unwrap_or(DEFAULT_REDEMPTION_LIMIT)
            .min(MAX_REDEMPTION_LIMIT);
        let mut redemptions = match user {
            Some(id) => self.store.redemptions_for_user(id)?,
            None => self.store.redemptions()?,
        };
        redemptions.sort_by_key(|r| (Reverse(r.created_at), Reverse(r.id)));
        redemptions.truncate(limit);

        let rewards: BTreeMap<RewardId, Reward> = self
            .store
            .rewards()?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();
        let costs: BTreeMap<RewardId, i64> = rewards.iter().map(|(id, r)| (*id, r.cost)).collect();
        let users = self.user_index()?;

        Ok(redemptions
            .into_iter()
            .map(|r| RedemptionEntry {
                id: r.id,
                user: r.user,
                username: users.get(&r.user).cloned().unwrap_or_default(),
                user_display: resolve(&self.store, TranslationOwner::User(r.user), lang),
                reward: r.reward,
                reward_display: resolve(&self.store, TranslationOwner::Reward(r.reward), lang),
                reward_icon: rewards
                    .get(&r.reward)
                    .map(|w| w.icon.clone())
                    .unwrap_or_default(),
                cost: r.cost,
                effective_cost: effective_cost(&r, &costs),
                created_at: r.created_at,
            })
            .collect())
    }

    /// Per-user totals, highest total awarded first.
    pub fn leaderboard(&self, lang: &str) -> Result<Vec<LeaderboardEntry>, LedgerError> {
        let costs = reward_costs(&self.store.rewards()?);
        let stars = self.store.stars()?;
        let redemptions = self.store.redemptions()?;

        let mut entries: Vec<LeaderboardEntry> = self
            .store
            .users()?
            .into_iter()
            .map(|user| {
                let total_awarded = sum_stars(stars.iter().filter(|s| s.user == user.id));
                let debits = sum_costs(redemptions.iter().filter(|r| r.user == user.id), &costs);
                LeaderboardEntry {
                    user: user.id,
                    display_name: resolve(&self.store, TranslationOwner::User(user.id), lang),
                    username: user.username,
                    is_admin: user.is_admin,
                    total_awarded,
                    balance: total_awarded.saturating_sub(debits),
                }
            })
            .collect();
        entries.sort_by_key(|e| (Reverse(e.total_awarded), e.user));
        Ok(entries)
    }

    /// Number of awards per user per reason. Awards without a reason are not counted.
    pub fn reason_counts(&self) -> Result<BTreeMap<UserId, BTreeMap<ReasonId, usize>>, LedgerError> {
        let mut counts: BTreeMap<UserId, BTreeMap<ReasonId, usize>> = BTreeMap::new();
        for star in self.store.stars()? {
            if let Some(reason) = star.reason {
                let slot = counts.entry(star.user).or_default().entry(reason).or_insert(0);
                *slot = slot.saturating_add(1);
            }
        }
        Ok(counts)
    }

    fn user_index(&self) -> Result<BTreeMap<UserId, String>, LedgerError> {
        Ok(self
            .store
            .users()?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect())
    }

    // ---- settings ---------------------------------------------------------

    pub fn setting(&self, key: &str) -> Result<Option<String>, LedgerError> {
        self.store.setting(key)
    }

    pub fn set_setting(&mut self, key: &str, value: &str) -> Result<(), LedgerError> {
        if key.trim().is_empty() {
            return Err(LedgerError::InvalidInput("setting key is empty".into()));
        }
        self.store.set_setting(key, value)
    }

    pub fn settings(&self) -> Result<BTreeMap<String, String>, LedgerError> {
        self.store.settings()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewReward;

    fn ledger_with_users() -> (Ledger<MemoryStore>, UserId, UserId) {
        let mut ledger = Ledger::in_memory();
        let mut add = |name: &str, is_admin: bool| {
            ledger
                .store_mut()
                .insert_user(crate::NewUser {
                    username: name.into(),
                    password_hash: String::new(),
                    is_admin,
                })
                .expect("user")
                .id
        };
        let mom = add("mom", true);
        let theo = add("theo", false);
        (ledger, mom, theo)
    }

    fn add_reward(ledger: &mut Ledger<MemoryStore>, key: &str, cost: i64) -> RewardId {
        ledger
            .store_mut()
            .insert_reward(NewReward {
                key: key.into(),
                cost,
                icon: String::new(),
                adult_only: false,
                created_at: Utc::now(),
            })
            .expect("reward")
            .id
    }

    #[test]
    fn free_text_award_creates_reason_once() {
        let (mut ledger, mom, _) = ledger_with_users();

        let first = ledger
            .record_award(AwardRequest::for_text("theo", "Helped with dishes").awarded_by(mom))
            .expect("award");
        let second = ledger
            .record_award(AwardRequest::for_text("theo", "Helped with dishes"))
            .expect("award");

        assert_eq!(first.reason, second.reason);
        let reasons = ledger.store().reasons().expect("reasons");
        assert_eq!(reasons.len(), 1);
        assert_eq!(reasons[0].key, "Helped_with_dishes");
        assert_eq!(first.awarded_by, Some(mom));
    }

    #[test]
    fn text_match_is_case_sensitive() {
        let (mut ledger, _, _) = ledger_with_users();
        ledger
            .record_award(AwardRequest::for_text("theo", "Dishes"))
            .expect("award");
        ledger
            .record_award(AwardRequest::for_text("theo", "dishes"))
            .expect("award");

        let keys: Vec<String> = ledger
            .store()
            .reasons()
            .expect("reasons")
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["Dishes".to_string(), "dishes".to_string()]);
    }

    #[test]
    fn non_latin_text_gets_suffixed_placeholder_keys() {
        let (mut ledger, _, _) = ledger_with_users();
        ledger
            .record_award(AwardRequest::for_text("theo", "洗碗"))
            .expect("award");
        ledger
            .record_award(AwardRequest::for_text("theo", "扫地"))
            .expect("award");

        let keys: Vec<String> = ledger
            .store()
            .reasons()
            .expect("reasons")
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["custom".to_string(), "custom_2".to_string()]);
    }

    #[test]
    fn reason_id_award_uses_default_stars() {
        let (mut ledger, _, _) = ledger_with_users();
        let reason = ledger
            .record_award(AwardRequest::for_text("theo", "Homework").with_stars(3))
            .expect("award")
            .reason
            .expect("reason id");

        let star = ledger
            .record_award(AwardRequest::for_reason("theo", reason))
            .expect("award");
        assert_eq!(star.stars, 3);
        assert_eq!(star.reason_text.as_deref(), Some("Homework"));

        let overridden = ledger
            .record_award(AwardRequest::for_reason("theo", reason).with_stars(7))
            .expect("award");
        assert_eq!(overridden.stars, 7);

        let zero = ledger
            .record_award(AwardRequest::for_reason("theo", reason).with_stars(0))
            .expect("award");
        assert_eq!(zero.stars, 3);
    }

    #[test]
    fn award_errors() {
        let (mut ledger, _, _) = ledger_with_users();

        let unknown_user = ledger.record_award(AwardRequest::for_text("nobody", "x"));
        assert!(matches!(unknown_user, Err(LedgerError::UserNotFound(_))));

        let no_reason = ledger.record_award(AwardRequest {
            username: "theo".into(),
            reason_text: Some("   ".into()),
            ..AwardRequest::default()
        });
        assert!(matches!(no_reason, Err(LedgerError::ReasonRequired)));

        let zero_id = ledger.record_award(AwardRequest::for_reason("theo", ReasonId(0)));
        assert!(matches!(zero_id, Err(LedgerError::ReasonRequired)));

        let missing = ledger.record_award(AwardRequest::for_reason("theo", ReasonId(99)));
        assert!(matches!(missing, Err(LedgerError::ReasonNotFound(_))));

        assert!(ledger.store().stars().expect("stars").is_empty());
    }

    #[test]
    fn redemption_snapshots_cost_and_checks_balance() {
        let (mut ledger, _, theo) = ledger_with_users();
        let reward = add_reward(&mut ledger, "ice_cream", 8);
        ledger
            .record_award(AwardRequest::for_text("theo", "Chores").with_stars(5))
            .expect("award");

        let err = ledger.redeem("theo", reward);
        assert!(matches!(
            err,
            Err(LedgerError::InsufficientBalance { balance: 5, cost: 8 })
        ));
        assert_eq!(ledger.balance(theo).expect("balance"), 5);

        ledger
            .record_award(AwardRequest::for_text("theo", "Chores").with_stars(5))
            .expect("award");
        let redemption = ledger.redeem("theo", reward).expect("redeem");
        assert_eq!(redemption.cost, Some(8));
        assert_eq!(ledger.balance(theo).expect("balance"), 2);
    }

    #[test]
    fn balance_of_unknown_user_is_not_found() {
        let ledger = Ledger::in_memory();
        assert!(matches!(
            ledger.balance(UserId(1)),
            Err(LedgerError::UserIdNotFound(_))
        ));
        assert!(matches!(
            ledger.balance_of("ghost"),
            Err(LedgerError::UserNotFound(_))
        ));
    }

    #[test]
    fn reason_stars_retroactivity() {
        let (mut ledger, _, _) = ledger_with_users();
        let reason = ledger
            .record_award(AwardRequest::for_text("theo", "Reading"))
            .expect("award")
            .reason
            .expect("reason id");

        ledger.set_reason_stars(reason, 4, false).expect("update");
        let stars: Vec<i64> = ledger.store().stars().expect("stars").iter().map(|s| s.stars).collect();
        assert_eq!(stars, vec![1]);

        ledger.set_reason_stars(reason, 5, true).expect("update");
        let stars: Vec<i64> = ledger.store().stars().expect("stars").iter().map(|s| s.stars).collect();
        assert_eq!(stars, vec![5]);

        let clamped = ledger.set_reason_stars(reason, -3, false).expect("update");
        assert_eq!(clamped.default_stars, 1);
    }

    #[test]
    fn reward_cost_pins_or_floats() {
        let (mut ledger, _, theo) = ledger_with_users();
        let reward = add_reward(&mut ledger, "movie", 6);
        ledger
            .record_award(AwardRequest::for_text("theo", "Chores").with_stars(20))
            .expect("award");
        ledger
            .store_mut()
            .insert_redemption(NewRedemption {
                user: theo,
                reward,
                cost: None,
                created_at: Utc::now(),
            })
            .expect("legacy redemption");

        ledger.set_reward_cost(reward, 10, true).expect("update");
        assert_eq!(ledger.balance(theo).expect("balance"), 10);

        ledger.set_reward_cost(reward, 12, false).expect("update");
        assert_eq!(ledger.balance(theo).expect("balance"), 10);
        assert_eq!(
            ledger.store().redemptions().expect("redemptions")[0].cost,
            Some(10)
        );

        let clamped = ledger.set_reward_cost(reward, 0, true).expect("update");
        assert_eq!(clamped.cost, 1);
    }

    #[test]
    fn listings_are_newest_first_and_denormalized() {
        let (mut ledger, mom, theo) = ledger_with_users();
        ledger
            .set_translation(TranslationOwner::User(theo), "en", "Theo")
            .expect("translation");
        ledger
            .record_award(AwardRequest::for_text("theo", "First").awarded_by(mom))
            .expect("award");
        ledger
            .record_award(AwardRequest::for_text("theo", "Second"))
            .expect("award");

        let awards = ledger.list_awards(Some("theo"), "fr").expect("list");
        assert_eq!(awards.len(), 2);
        assert_eq!(awards[0].reason_display, "Second");
        assert_eq!(awards[1].awarded_by_display.as_deref(), Some("mom"));
        assert_eq!(awards[0].user_display, "Theo");

        assert!(ledger.list_awards(Some("ghost"), "en").expect("list").is_empty());
        assert!(ledger.list_awards(Some("mom"), "en").expect("list").is_empty());
    }

    #[test]
    fn redemption_listing_limit_and_filter() {
        let (mut ledger, mom, theo) = ledger_with_users();
        let reward = add_reward(&mut ledger, "sticker", 1);
        ledger
            .record_award(AwardRequest::for_text("theo", "Chores").with_stars(10))
            .expect("award");
        ledger
            .record_award(AwardRequest::for_text("mom", "Chores").with_stars(10))
            .expect("award");
        for _ in 0..3 {
            ledger.redeem("theo", reward).expect("redeem");
        }
        ledger.redeem("mom", reward).expect("redeem");

        assert_eq!(ledger.list_redemptions(Some(2), None, "en").expect("list").len(), 2);
        let theirs = ledger.list_redemptions(None, Some(theo), "en").expect("list");
        assert_eq!(theirs.len(), 3);
        assert!(theirs.iter().all(|r| r.user == theo && r.effective_cost == 1));
        assert_eq!(ledger.list_redemptions(None, Some(mom), "en").expect("list").len(), 1);
    }

    #[test]
    fn leaderboard_and_reason_counts() {
        let (mut ledger, mom, theo) = ledger_with_users();
        let reason = ledger
            .record_award(AwardRequest::for_text("theo", "Chores").with_stars(4))
            .expect("award")
            .reason
            .expect("reason");
        ledger
            .record_award(AwardRequest::for_reason("theo", reason))
            .expect("award");
        ledger
            .record_award(AwardRequest::for_reason("mom", reason))
            .expect("award");

        let board = ledger.leaderboard("en").expect("leaderboard");
        assert_eq!(board[0].user, theo);
        assert_eq!(board[0].total_awarded, 8);
        assert_eq!(board[1].user, mom);

        let counts = ledger.reason_counts().expect("counts");
        assert_eq!(counts[&theo][&reason], 2);
        assert_eq!(counts[&mom][&reason], 1);
    }

    #[test]
    fn deleting_entries_restores_balance() {
        let (mut ledger, _, theo) = ledger_with_users();
        let star = ledger
            .record_award(AwardRequest::for_text("theo", "Chores").with_stars(3))
            .expect("award");
        ledger.delete_star(star.id).expect("delete");
        assert_eq!(ledger.balance(theo).expect("balance"), 0);
        assert!(matches!(
            ledger.delete_star(star.id),
            Err(LedgerError::StarNotFound(_))
        ));
        assert!(matches!(
            ledger.delete_redemption(RedemptionId(1)),
            Err(LedgerError::RedemptionNotFound(_))
        ));
    }

    #[test]
    fn settings_roundtrip() {
        let mut ledger = Ledger::in_memory();
        ledger.set_setting("default_lang", "zh-TW").expect("set");
        assert_eq!(
            ledger.setting("default_lang").expect("get").as_deref(),
            Some("zh-TW")
        );
        assert!(ledger.set_setting(" ", "x").is_err());
    }
}
