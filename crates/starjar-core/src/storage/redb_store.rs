//! # redb-backed Ledger Storage
//!
//! A disk-backed `LedgerStore` using the redb embedded database.
//!
//! Every trait write runs in its own write transaction, so each one is
//! atomic and crash safe. `replace_catalog` and `remove_user` touch several
//! tables inside a single transaction.
//!
//! Records are postcard-encoded. Id counters live in the `metadata` table
//! and are allocated inside the same transaction as the row they name.

use crate::store::{CatalogSnapshot, LedgerStore};
use crate::{
    LedgerError, NewReason, NewRedemption, NewReward, NewStar, NewUser, Reason, ReasonId,
    Redemption, RedemptionId, Reward, RewardId, Star, StarId, TranslationOwner, User, UserId,
};
use redb::{
    Database, ReadableDatabase, ReadableTable, Table, TableDefinition, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

type RecordTable = TableDefinition<'static, u64, &'static [u8]>;

/// Users: UserId(u64) -> serialized User
const USERS: RecordTable = TableDefinition::new("users");

/// Reasons: ReasonId(u64) -> serialized Reason
const REASONS: RecordTable = TableDefinition::new("reasons");

/// Rewards: RewardId(u64) -> serialized Reward
const REWARDS: RecordTable = TableDefinition::new("rewards");

/// Award ledger: StarId(u64) -> serialized Star
const STARS: RecordTable = TableDefinition::new("stars");

/// Redemption ledger: RedemptionId(u64) -> serialized Redemption
const REDEMPTIONS: RecordTable = TableDefinition::new("redemptions");

/// Translations: (owner kind, owner id) -> serialized BTreeMap<lang, text>
const TRANSLATIONS: TableDefinition<(u8, u64), &[u8]> = TableDefinition::new("translations");

/// Settings: key -> value
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

/// Metadata: counter name -> next id
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Owner kind of user translations, which survive a catalog replacement.
const USER_TRANSLATION_KIND: u8 = TranslationOwner::User(UserId(0)).storage_key().0;

const NEXT_USER_ID: &str = "next_user_id";
const NEXT_REASON_ID: &str = "next_reason_id";
const NEXT_REWARD_ID: &str = "next_reward_id";
const NEXT_STAR_ID: &str = "next_star_id";
const NEXT_REDEMPTION_ID: &str = "next_redemption_id";

// =============================================================================
// HELPERS
// =============================================================================

fn io_err(e: impl std::fmt::Display) -> LedgerError {
    LedgerError::IoError(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, LedgerError> {
    postcard::to_allocvec(value).map_err(|e| LedgerError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, LedgerError> {
    postcard::from_bytes(bytes).map_err(|e| LedgerError::SerializationError(e.to_string()))
}

fn collect_records<T, R>(table: &R) -> Result<Vec<T>, LedgerError>
where
    T: DeserializeOwned,
    R: ReadableTable<u64, &'static [u8]>,
{
    let mut records = Vec::new();
    for entry in table.iter().map_err(io_err)? {
        let (_, value) = entry.map_err(io_err)?;
        records.push(decode(value.value())?);
    }
    Ok(records)
}

fn put_record<T: Serialize>(
    table: &mut Table<'_, u64, &'static [u8]>,
    id: u64,
    record: &T,
) -> Result<(), LedgerError> {
    let bytes = encode(record)?;
    table.insert(id, bytes.as_slice()).map_err(io_err)?;
    Ok(())
}

fn clear_records(table: &mut Table<'_, u64, &'static [u8]>) -> Result<(), LedgerError> {
    let mut ids = Vec::new();
    for entry in table.iter().map_err(io_err)? {
        let (key, _) = entry.map_err(io_err)?;
        ids.push(key.value());
    }
    for id in ids {
        table.remove(id).map_err(io_err)?;
    }
    Ok(())
}

fn allocate_id(meta: &mut Table<'_, &'static str, u64>, counter: &str) -> Result<u64, LedgerError> {
    let next = meta
        .get(counter)
        .map_err(io_err)?
        .map(|v| v.value())
        .unwrap_or(1);
    meta.insert(counter, next.saturating_add(1)).map_err(io_err)?;
    Ok(next)
}

fn put_translations(
    table: &mut Table<'_, (u8, u64), &'static [u8]>,
    owner: TranslationOwner,
    langs: &BTreeMap<String, String>,
) -> Result<(), LedgerError> {
    if langs.is_empty() {
        table.remove(owner.storage_key()).map_err(io_err)?;
    } else {
        let bytes = encode(langs)?;
        table
            .insert(owner.storage_key(), bytes.as_slice())
            .map_err(io_err)?;
    }
    Ok(())
}

fn insert_reason_row(
    txn: &WriteTransaction,
    reason: NewReason,
) -> Result<Reason, LedgerError> {
    let mut reasons = txn.open_table(REASONS).map_err(io_err)?;
    let existing: Vec<Reason> = collect_records(&reasons)?;
    if existing.iter().any(|r| r.key == reason.key) {
        return Err(LedgerError::Conflict(format!(
            "reason key '{}' already exists",
            reason.key
        )));
    }
    let mut meta = txn.open_table(METADATA).map_err(io_err)?;
    let id = ReasonId(allocate_id(&mut meta, NEXT_REASON_ID)?);
    let reason = Reason {
        id,
        key: reason.key,
        default_stars: reason.default_stars,
        created_at: reason.created_at,
    };
    put_record(&mut reasons, id.0, &reason)?;
    Ok(reason)
}

fn insert_reward_row(
    txn: &WriteTransaction,
    reward: NewReward,
) -> Result<Reward, LedgerError> {
    let mut rewards = txn.open_table(REWARDS).map_err(io_err)?;
    let existing: Vec<Reward> = collect_records(&rewards)?;
    if existing.iter().any(|r| r.key == reward.key) {
        return Err(LedgerError::Conflict(format!(
            "reward key '{}' already exists",
            reward.key
        )));
    }
    let mut meta = txn.open_table(METADATA).map_err(io_err)?;
    let id = RewardId(allocate_id(&mut meta, NEXT_REWARD_ID)?);
    let reward = Reward {
        id,
        key: reward.key,
        cost: reward.cost,
        icon: reward.icon,
        adult_only: reward.adult_only,
        created_at: reward.created_at,
    };
    put_record(&mut rewards, id.0, &reward)?;
    Ok(reward)
}

fn insert_star_row(txn: &WriteTransaction, star: NewStar) -> Result<Star, LedgerError> {
    let mut stars = txn.open_table(STARS).map_err(io_err)?;
    let mut meta = txn.open_table(METADATA).map_err(io_err)?;
    let id = StarId(allocate_id(&mut meta, NEXT_STAR_ID)?);
    let star = Star {
        id,
        user: star.user,
        reason: star.reason,
        reason_text: star.reason_text,
        stars: star.stars,
        awarded_by: star.awarded_by,
        created_at: star.created_at,
    };
    put_record(&mut stars, id.0, &star)?;
    Ok(star)
}

fn insert_redemption_row(
    txn: &WriteTransaction,
    redemption: NewRedemption,
) -> Result<Redemption, LedgerError> {
    let mut redemptions = txn.open_table(REDEMPTIONS).map_err(io_err)?;
    let mut meta = txn.open_table(METADATA).map_err(io_err)?;
    let id = RedemptionId(allocate_id(&mut meta, NEXT_REDEMPTION_ID)?);
    let redemption = Redemption {
        id,
        user: redemption.user,
        reward: redemption.reward,
        cost: redemption.cost,
        created_at: redemption.created_at,
    };
    put_record(&mut redemptions, id.0, &redemption)?;
    Ok(redemption)
}

// =============================================================================
// REDB STORE
// =============================================================================

/// A disk-backed ledger store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a ledger database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            for table in [USERS, REASONS, REWARDS, STARS, REDEMPTIONS] {
                let _ = write_txn.open_table(table).map_err(io_err)?;
            }
            let _ = write_txn.open_table(TRANSLATIONS).map_err(io_err)?;
            let _ = write_txn.open_table(SETTINGS).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }

    /// Run `op` in one write transaction. Commits on `Ok`, aborts on `Err`.
    fn write<R>(
        &self,
        op: impl FnOnce(&WriteTransaction) -> Result<R, LedgerError>,
    ) -> Result<R, LedgerError> {
        let txn = self.db.begin_write().map_err(io_err)?;
        match op(&txn) {
            Ok(value) => {
                txn.commit().map_err(io_err)?;
                Ok(value)
            }
            Err(e) => {
                txn.abort().map_err(io_err)?;
                Err(e)
            }
        }
    }

    fn read_all<T: DeserializeOwned>(&self, def: RecordTable) -> Result<Vec<T>, LedgerError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(def).map_err(io_err)?;
        collect_records(&table)
    }

    fn read_one<T: DeserializeOwned>(
        &self,
        def: RecordTable,
        id: u64,
    ) -> Result<Option<T>, LedgerError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(def).map_err(io_err)?;
        let record = match table.get(id).map_err(io_err)? {
            Some(data) => Some(decode(data.value())?),
            None => None,
        };
        Ok(record)
    }

    /// Overwrite an existing row, failing with `missing` when absent.
    fn replace_row<T: Serialize>(
        &self,
        def: RecordTable,
        id: u64,
        record: &T,
        missing: LedgerError,
    ) -> Result<(), LedgerError> {
        self.write(|txn| {
            let mut table = txn.open_table(def).map_err(io_err)?;
            let exists = table.get(id).map_err(io_err)?.is_some();
            if !exists {
                return Err(missing);
            }
            put_record(&mut table, id, record)
        })
    }

    fn remove_row(&self, def: RecordTable, id: u64) -> Result<bool, LedgerError> {
        self.write(|txn| {
            let mut table = txn.open_table(def).map_err(io_err)?;
            let removed = table.remove(id).map_err(io_err)?.is_some();
            Ok(removed)
        })
    }
}

// =============================================================================
// LEDGERSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl LedgerStore for RedbStore {
    fn insert_user(&mut self, user: NewUser) -> Result<User, LedgerError> {
        self.write(|txn| {
            let mut users = txn.open_table(USERS).map_err(io_err)?;
            let existing: Vec<User> = collect_records(&users)?;
            if existing.iter().any(|u| u.username == user.username) {
                return Err(LedgerError::Conflict(format!(
                    "username '{}' already exists",
                    user.username
                )));
            }
            let mut meta = txn.open_table(METADATA).map_err(io_err)?;
            let id = UserId(allocate_id(&mut meta, NEXT_USER_ID)?);
            let user = User {
                id,
                username: user.username,
                password_hash: user.password_hash,
                is_admin: user.is_admin,
            };
            put_record(&mut users, id.0, &user)?;
            Ok(user)
        })
    }

    fn user(&self, id: UserId) -> Result<Option<User>, LedgerError> {
        self.read_one(USERS, id.0)
    }

    fn user_by_name(&self, username: &str) -> Result<Option<User>, LedgerError> {
        Ok(self
            .read_all::<User>(USERS)?
            .into_iter()
            .find(|u| u.username == username))
    }

    fn users(&self) -> Result<Vec<User>, LedgerError> {
        self.read_all(USERS)
    }

    fn update_user(&mut self, user: &User) -> Result<(), LedgerError> {
        self.replace_row(USERS, user.id.0, user, LedgerError::UserIdNotFound(user.id))
    }

    fn remove_user(&mut self, id: UserId) -> Result<bool, LedgerError> {
        self.write(|txn| {
            let mut users = txn.open_table(USERS).map_err(io_err)?;
            if users.remove(id.0).map_err(io_err)?.is_none() {
                return Ok(false);
            }

            let mut translations = txn.open_table(TRANSLATIONS).map_err(io_err)?;
            translations
                .remove(TranslationOwner::User(id).storage_key())
                .map_err(io_err)?;

            let mut redemptions = txn.open_table(REDEMPTIONS).map_err(io_err)?;
            let owned: Vec<Redemption> = collect_records(&redemptions)?;
            for r in owned.into_iter().filter(|r| r.user == id) {
                redemptions.remove(r.id.0).map_err(io_err)?;
            }

            let mut stars = txn.open_table(STARS).map_err(io_err)?;
            let all: Vec<Star> = collect_records(&stars)?;
            for mut star in all {
                if star.user == id {
                    stars.remove(star.id.0).map_err(io_err)?;
                } else if star.awarded_by == Some(id) {
                    star.awarded_by = None;
                    put_record(&mut stars, star.id.0, &star)?;
                }
            }
            Ok(true)
        })
    }

    fn translations(
        &self,
        owner: TranslationOwner,
    ) -> Result<BTreeMap<String, String>, LedgerError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(TRANSLATIONS).map_err(io_err)?;
        let langs = match table.get(owner.storage_key()).map_err(io_err)? {
            Some(data) => decode(data.value())?,
            None => BTreeMap::new(),
        };
        Ok(langs)
    }

    fn set_translation(
        &mut self,
        owner: TranslationOwner,
        lang: &str,
        text: &str,
    ) -> Result<(), LedgerError> {
        self.write(|txn| {
            let mut table = txn.open_table(TRANSLATIONS).map_err(io_err)?;
            let mut langs: BTreeMap<String, String> =
                match table.get(owner.storage_key()).map_err(io_err)? {
                    Some(data) => decode(data.value())?,
                    None => BTreeMap::new(),
                };
            langs.insert(lang.to_string(), text.to_string());
            put_translations(&mut table, owner, &langs)
        })
    }

    fn insert_reason(&mut self, reason: NewReason) -> Result<Reason, LedgerError> {
        self.write(|txn| insert_reason_row(txn, reason))
    }

    fn reason(&self, id: ReasonId) -> Result<Option<Reason>, LedgerError> {
        self.read_one(REASONS, id.0)
    }

    fn reasons(&self) -> Result<Vec<Reason>, LedgerError> {
        self.read_all(REASONS)
    }

    fn update_reason(&mut self, reason: &Reason) -> Result<(), LedgerError> {
        self.replace_row(
            REASONS,
            reason.id.0,
            reason,
            LedgerError::ReasonNotFound(reason.id),
        )
    }

    fn remove_reason(&mut self, id: ReasonId) -> Result<bool, LedgerError> {
        self.write(|txn| {
            let mut translations = txn.open_table(TRANSLATIONS).map_err(io_err)?;
            translations
                .remove(TranslationOwner::Reason(id).storage_key())
                .map_err(io_err)?;
            let mut reasons = txn.open_table(REASONS).map_err(io_err)?;
            let removed = reasons.remove(id.0).map_err(io_err)?.is_some();
            Ok(removed)
        })
    }

    fn insert_reward(&mut self, reward: NewReward) -> Result<Reward, LedgerError> {
        self.write(|txn| insert_reward_row(txn, reward))
    }

    fn reward(&self, id: RewardId) -> Result<Option<Reward>, LedgerError> {
        self.read_one(REWARDS, id.0)
    }

    fn rewards(&self) -> Result<Vec<Reward>, LedgerError> {
        self.read_all(REWARDS)
    }

    fn update_reward(&mut self, reward: &Reward) -> Result<(), LedgerError> {
        self.replace_row(
            REWARDS,
            reward.id.0,
            reward,
            LedgerError::RewardNotFound(reward.id),
        )
    }

    fn remove_reward(&mut self, id: RewardId) -> Result<bool, LedgerError> {
        self.write(|txn| {
            let mut translations = txn.open_table(TRANSLATIONS).map_err(io_err)?;
            translations
                .remove(TranslationOwner::Reward(id).storage_key())
                .map_err(io_err)?;
            let mut rewards = txn.open_table(REWARDS).map_err(io_err)?;
            let removed = rewards.remove(id.0).map_err(io_err)?.is_some();
            Ok(removed)
        })
    }

    fn insert_star(&mut self, star: NewStar) -> Result<Star, LedgerError> {
        self.write(|txn| insert_star_row(txn, star))
    }

    fn stars(&self) -> Result<Vec<Star>, LedgerError> {
        self.read_all(STARS)
    }

    fn rewrite_reason_stars(
        &mut self,
        reason: ReasonId,
        stars: i64,
    ) -> Result<usize, LedgerError> {
        self.write(|txn| {
            let mut table = txn.open_table(STARS).map_err(io_err)?;
            let all: Vec<Star> = collect_records(&table)?;
            let mut rewritten = 0usize;
            for mut star in all.into_iter().filter(|s| s.reason == Some(reason)) {
                star.stars = stars;
                put_record(&mut table, star.id.0, &star)?;
                rewritten = rewritten.saturating_add(1);
            }
            Ok(rewritten)
        })
    }

    fn remove_star(&mut self, id: StarId) -> Result<bool, LedgerError> {
        self.remove_row(STARS, id.0)
    }

    fn insert_redemption(
        &mut self,
        redemption: NewRedemption,
    ) -> Result<Redemption, LedgerError> {
        self.write(|txn| insert_redemption_row(txn, redemption))
    }

    fn redemptions(&self) -> Result<Vec<Redemption>, LedgerError> {
        self.read_all(REDEMPTIONS)
    }

    fn pin_redemption_costs(
        &mut self,
        reward: RewardId,
        cost: i64,
    ) -> Result<usize, LedgerError> {
        self.write(|txn| {
            let mut table = txn.open_table(REDEMPTIONS).map_err(io_err)?;
            let all: Vec<Redemption> = collect_records(&table)?;
            let mut pinned = 0usize;
            for mut r in all
                .into_iter()
                .filter(|r| r.reward == reward && r.cost.is_none())
            {
                r.cost = Some(cost);
                put_record(&mut table, r.id.0, &r)?;
                pinned = pinned.saturating_add(1);
            }
            Ok(pinned)
        })
    }

    fn remove_redemption(&mut self, id: RedemptionId) -> Result<bool, LedgerError> {
        self.remove_row(REDEMPTIONS, id.0)
    }

    fn setting(&self, key: &str) -> Result<Option<String>, LedgerError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(SETTINGS).map_err(io_err)?;
        let value = table
            .get(key)
            .map_err(io_err)?
            .map(|v| v.value().to_string());
        Ok(value)
    }

    fn set_setting(&mut self, key: &str, value: &str) -> Result<(), LedgerError> {
        self.write(|txn| {
            let mut table = txn.open_table(SETTINGS).map_err(io_err)?;
            table.insert(key, value).map_err(io_err)?;
            Ok(())
        })
    }

    fn settings(&self) -> Result<BTreeMap<String, String>, LedgerError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(SETTINGS).map_err(io_err)?;
        let mut settings = BTreeMap::new();
        for entry in table.iter().map_err(io_err)? {
            let (key, value) = entry.map_err(io_err)?;
            settings.insert(key.value().to_string(), value.value().to_string());
        }
        Ok(settings)
    }

    fn replace_catalog(&mut self, snapshot: CatalogSnapshot) -> Result<(), LedgerError> {
        snapshot.validate()?;

        self.write(|txn| {
            {
                for def in [REASONS, REWARDS, STARS, REDEMPTIONS] {
                    let mut table = txn.open_table(def).map_err(io_err)?;
                    clear_records(&mut table)?;
                }

                let mut translations = txn.open_table(TRANSLATIONS).map_err(io_err)?;
                let mut catalog_keys = Vec::new();
                for entry in translations.iter().map_err(io_err)? {
                    let (key, _) = entry.map_err(io_err)?;
                    let (kind, id) = key.value();
                    if kind != USER_TRANSLATION_KIND {
                        catalog_keys.push((kind, id));
                    }
                }
                for key in catalog_keys {
                    translations.remove(key).map_err(io_err)?;
                }
            }

            let mut reason_ids = Vec::with_capacity(snapshot.reasons.len());
            for entry in snapshot.reasons {
                let reason = insert_reason_row(txn, entry.reason)?;
                let mut translations = txn.open_table(TRANSLATIONS).map_err(io_err)?;
                put_translations(
                    &mut translations,
                    TranslationOwner::Reason(reason.id),
                    &entry.translations,
                )?;
                reason_ids.push(reason.id);
            }

            let mut reward_ids = Vec::with_capacity(snapshot.rewards.len());
            for entry in snapshot.rewards {
                let reward = insert_reward_row(txn, entry.reward)?;
                let mut translations = txn.open_table(TRANSLATIONS).map_err(io_err)?;
                put_translations(
                    &mut translations,
                    TranslationOwner::Reward(reward.id),
                    &entry.translations,
                )?;
                reward_ids.push(reward.id);
            }

            for s in snapshot.stars {
                insert_star_row(
                    txn,
                    NewStar {
                        user: s.user,
                        reason: s.reason.and_then(|i| reason_ids.get(i).copied()),
                        reason_text: s.reason_text,
                        stars: s.stars,
                        awarded_by: s.awarded_by,
                        created_at: s.created_at,
                    },
                )?;
            }

            for r in snapshot.redemptions {
                let reward = reward_ids
                    .get(r.reward)
                    .copied()
                    .ok_or_else(|| LedgerError::InvalidInput("reward position".to_string()))?;
                insert_redemption_row(
                    txn,
                    NewRedemption {
                        user: r.user,
                        reward,
                        cost: r.cost,
                        created_at: r.created_at,
                    },
                )?;
            }

            {
                let mut translations = txn.open_table(TRANSLATIONS).map_err(io_err)?;
                for (user, langs) in &snapshot.user_translations {
                    put_translations(&mut translations, TranslationOwner::User(*user), langs)?;
                }
                let mut settings = txn.open_table(SETTINGS).map_err(io_err)?;
                for (key, value) in &snapshot.settings {
                    settings
                        .insert(key.as_str(), value.as_str())
                        .map_err(io_err)?;
                }
            }

            Ok(())
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

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
            default_stars: 2,
            created_at: Utc::now(),
        }
    }

    fn new_star(user: UserId, reason: Option<ReasonId>) -> NewStar {
        NewStar {
            user,
            reason,
            reason_text: None,
            stars: 1,
            awarded_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn basic_operations() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let ray = store.insert_user(new_user("ray")).expect("insert user");
        let theo = store.insert_user(new_user("theo")).expect("insert user");
        assert_eq!(ray.id, UserId(1));
        assert_eq!(theo.id, UserId(2));
        assert_eq!(
            store.user_by_name("theo").expect("lookup").map(|u| u.id),
            Some(theo.id)
        );

        let reason = store.insert_reason(new_reason("dishes")).expect("reason");
        store.insert_star(new_star(ray.id, Some(reason.id))).expect("star");
        assert_eq!(store.stars_for_user(ray.id).expect("stars").len(), 1);
        assert!(store.stars_for_user(theo.id).expect("stars").is_empty());
    }

    #[test]
    fn duplicate_keys_conflict() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        store.insert_reason(new_reason("dishes")).expect("reason");
        let err = store.insert_reason(new_reason("dishes"));
        assert!(matches!(err, Err(LedgerError::Conflict(_))));
        assert_eq!(store.reasons().expect("reasons").len(), 1);
    }

    #[test]
    fn ledger_suffixes_colliding_keys() {
        use crate::ledger::{AwardRequest, Ledger};

        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let mut ledger = Ledger::new(store);
        ledger.store_mut().insert_user(new_user("ray")).expect("user");

        ledger
            .record_award(AwardRequest::for_text("ray", "Dishes!"))
            .expect("award");
        let second = ledger
            .record_award(AwardRequest::for_text("ray", "Dishes?"))
            .expect("award");
        let reason = ledger
            .store()
            .reason(second.reason.expect("reason"))
            .expect("lookup")
            .expect("reason");
        assert_eq!(reason.key, "Dishes_2");
        assert!(ledger.store().reason_key_taken("Dishes_2").expect("lookup"));

        let first = ledger.create_reward("Movie", 5, "", false).expect("reward");
        let again = ledger.create_reward("Movie", 7, "", false).expect("reward");
        assert_eq!(first.key, "Movie");
        assert_eq!(again.key, "Movie_2");
        assert!(!ledger.store().reward_key_taken("Movie_3").expect("lookup"));
    }

    #[test]
    fn persistence() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        let reason_id = {
            let mut store = RedbStore::open(&db_path).expect("open db");
            let user = store.insert_user(new_user("ray")).expect("user");
            let reason = store.insert_reason(new_reason("dishes")).expect("reason");
            store
                .set_translation(TranslationOwner::Reason(reason.id), "en", "Dishes")
                .expect("translation");
            store.insert_star(new_star(user.id, Some(reason.id))).expect("star");
            store.set_setting("default_lang", "fr").expect("setting");
            reason.id
        };

        let mut store = RedbStore::open(&db_path).expect("reopen db");
        assert_eq!(store.stars().expect("stars").len(), 1);
        assert_eq!(
            store
                .translation(TranslationOwner::Reason(reason_id), "en")
                .expect("translation")
                .as_deref(),
            Some("Dishes")
        );
        assert_eq!(
            store.setting("default_lang").expect("setting").as_deref(),
            Some("fr")
        );

        // Counters survive reopening.
        let next = store.insert_reason(new_reason("laundry")).expect("reason");
        assert_eq!(next.id, ReasonId(reason_id.0 + 1));
    }

    #[test]
    fn remove_user_cascades_in_one_transaction() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let theo = store.insert_user(new_user("theo")).expect("user").id;
        let mom = store.insert_user(new_user("mom")).expect("user").id;
        store.insert_star(new_star(theo, None)).expect("star");
        let mut granted = new_star(mom, None);
        granted.awarded_by = Some(theo);
        store.insert_star(granted).expect("star");
        let reward = store
            .insert_reward(NewReward {
                key: "movie".into(),
                cost: 10,
                icon: String::new(),
                adult_only: false,
                created_at: Utc::now(),
            })
            .expect("reward");
        store
            .insert_redemption(NewRedemption {
                user: theo,
                reward: reward.id,
                cost: Some(10),
                created_at: Utc::now(),
            })
            .expect("redemption");

        assert!(store.remove_user(theo).expect("remove"));
        assert!(store.redemptions().expect("redemptions").is_empty());
        let stars = store.stars().expect("stars");
        assert_eq!(stars.len(), 1);
        assert_eq!(stars[0].awarded_by, None);
    }

    #[test]
    fn pin_and_rewrite() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let user = store.insert_user(new_user("ray")).expect("user").id;
        let reason = store.insert_reason(new_reason("dishes")).expect("reason").id;
        store.insert_star(new_star(user, Some(reason))).expect("star");
        store.insert_star(new_star(user, None)).expect("star");
        assert_eq!(store.rewrite_reason_stars(reason, 4).expect("rewrite"), 1);

        let reward = store
            .insert_reward(NewReward {
                key: "movie".into(),
                cost: 10,
                icon: String::new(),
                adult_only: false,
                created_at: Utc::now(),
            })
            .expect("reward")
            .id;
        store
            .insert_redemption(NewRedemption {
                user,
                reward,
                cost: None,
                created_at: Utc::now(),
            })
            .expect("redemption");
        assert_eq!(store.pin_redemption_costs(reward, 10).expect("pin"), 1);
        assert_eq!(store.pin_redemption_costs(reward, 12).expect("pin"), 0);
        assert_eq!(
            store.redemptions().expect("redemptions")[0].cost,
            Some(10)
        );
    }

    #[test]
    fn failed_replace_catalog_changes_nothing() {
        use crate::store::{SnapshotReason, SnapshotStar};

        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let user = store.insert_user(new_user("ray")).expect("user").id;
        store.insert_reason(new_reason("keep")).expect("reason");

        // Duplicate keys are rejected before the transaction opens.
        let snapshot = CatalogSnapshot {
            reasons: vec![
                SnapshotReason {
                    reason: new_reason("a"),
                    translations: BTreeMap::new(),
                },
                SnapshotReason {
                    reason: new_reason("a"),
                    translations: BTreeMap::new(),
                },
            ],
            stars: vec![SnapshotStar {
                user,
                reason: Some(0),
                reason_text: None,
                stars: 1,
                awarded_by: None,
                created_at: Utc::now(),
            }],
            ..CatalogSnapshot::default()
        };
        assert!(store.replace_catalog(snapshot).is_err());

        let reasons = store.reasons().expect("reasons");
        assert_eq!(reasons.len(), 1);
        assert_eq!(reasons[0].key, "keep");
    }
}
