//! # Ledger Invariants
//!
//! End-to-end checks of the engine through its public API, on both backends.

use starjar_core::{
    AwardRequest, ImportMode, Ledger, LedgerError, LedgerStore, MemoryStore, NewUser, RedbStore,
    StorageBackend, TranslationOwner, UserId,
};
use tempfile::tempdir;

struct Family<S> {
    ledger: Ledger<S>,
    mom: UserId,
    theo: UserId,
}

/// Wrap `store` with one admin and one child.
///
/// Accounts go straight to the store; password hashing is not under test.
fn family<S: LedgerStore>(mut store: S) -> Family<S> {
    let mut insert = |name: &str, is_admin: bool| {
        store
            .insert_user(NewUser {
                username: name.into(),
                password_hash: String::new(),
                is_admin,
            })
            .expect("insert user")
            .id
    };
    let mom = insert("mom", true);
    let theo = insert("theo", false);
    Family {
        ledger: Ledger::new(store),
        mom,
        theo,
    }
}

/// Independent recomputation from raw ledger rows.
fn raw_balance<S: LedgerStore>(store: &S, user: UserId) -> i64 {
    let rewards = store.rewards().expect("rewards");
    let credits: i64 = store
        .stars()
        .expect("stars")
        .iter()
        .filter(|s| s.user == user)
        .map(|s| s.stars)
        .sum();
    let debits: i64 = store
        .redemptions()
        .expect("redemptions")
        .iter()
        .filter(|r| r.user == user)
        .map(|r| {
            r.cost.unwrap_or_else(|| {
                rewards
                    .iter()
                    .find(|w| w.id == r.reward)
                    .map_or(0, |w| w.cost)
            })
        })
        .sum();
    credits - debits
}

fn run_scenario<S: LedgerStore>(store: S) {
    let Family {
        mut ledger,
        mom,
        theo,
    } = family(store);

    let dishes = ledger
        .record_award(AwardRequest::for_text("theo", "Helped with dishes").awarded_by(mom))
        .expect("award");
    let reason = dishes.reason.expect("reason created");
    ledger.set_reason_stars(reason, 3, false).expect("stars");
    ledger
        .record_award(AwardRequest::for_reason("theo", reason))
        .expect("award");
    let movie = ledger.create_reward("Movie time", 2, "🎬", false).expect("reward");
    ledger.redeem("theo", movie.id).expect("redeem");
    ledger.set_reward_cost(movie.id, 3, true).expect("cost");

    assert_eq!(ledger.balance(theo).expect("balance"), 2);
    assert_eq!(ledger.balance(theo).expect("balance"), raw_balance(ledger.store(), theo));
}

// =============================================================================
// BALANCE
// =============================================================================

#[test]
fn balance_matches_raw_rows_in_memory() {
    run_scenario(MemoryStore::new());
}

#[test]
fn balance_matches_raw_rows_on_redb() {
    let dir = tempdir().expect("tempdir");
    let store = RedbStore::open(dir.path().join("starjar.redb")).expect("open");
    run_scenario(store);
}

#[test]
fn balance_matches_raw_rows_through_backend_enum() {
    let dir = tempdir().expect("tempdir");
    run_scenario(StorageBackend::open_redb(dir.path().join("jar.redb")).expect("open"));
    run_scenario(StorageBackend::default());
}

// =============================================================================
// AWARDS
// =============================================================================

#[test]
fn reason_id_award_uses_default_stars() {
    let Family { mut ledger, .. } = family(MemoryStore::new());
    let reason = ledger.create_reason("Homework", 4).expect("reason");
    let star = ledger
        .record_award(AwardRequest::for_reason("theo", reason.id))
        .expect("award");
    assert_eq!(star.stars, 4);
}

#[test]
fn free_text_creates_one_reason_then_reuses_it() {
    let Family { mut ledger, .. } = family(MemoryStore::new());

    let first = ledger
        .record_award(AwardRequest::for_text("theo", "Helped with dishes"))
        .expect("award");
    assert_eq!(ledger.store().reasons().expect("reasons").len(), 1);
    assert_eq!(ledger.store().stars().expect("stars").len(), 1);

    let second = ledger
        .record_award(AwardRequest::for_text("theo", "Helped with dishes"))
        .expect("award");
    assert_eq!(first.reason, second.reason);
    assert_eq!(ledger.store().reasons().expect("reasons").len(), 1);
}

// =============================================================================
// RETROACTIVITY
// =============================================================================

#[test]
fn retroactive_reason_stars_rewrite_history() {
    let Family {
        mut ledger, theo, ..
    } = family(MemoryStore::new());
    let reason = ledger.create_reason("Tidy room", 1).expect("reason");
    for _ in 0..3 {
        ledger
            .record_award(AwardRequest::for_reason("theo", reason.id))
            .expect("award");
    }

    ledger.set_reason_stars(reason.id, 5, false).expect("forward only");
    assert_eq!(ledger.balance(theo).expect("balance"), 3);

    ledger.set_reason_stars(reason.id, 5, true).expect("retroactive");
    assert!(
        ledger
            .store()
            .stars()
            .expect("stars")
            .iter()
            .all(|s| s.stars == 5)
    );
    assert_eq!(ledger.balance(theo).expect("balance"), 15);
}

#[test]
fn reward_cost_snapshot_policy() {
    let Family {
        mut ledger, theo, ..
    } = family(MemoryStore::new());
    ledger
        .record_award(AwardRequest::for_text("theo", "Chores").with_stars(20))
        .expect("award");
    let pinned = ledger.create_reward("Ice cream", 4, "🍦", false).expect("reward");
    let floating = ledger.create_reward("Park", 4, "🌳", false).expect("reward");
    ledger
        .record_redemption("theo", pinned.id)
        .expect("redemption");
    ledger
        .record_redemption("theo", floating.id)
        .expect("redemption");
    // Redemptions recorded without a snapshot float with the price.
    let mut store = ledger.into_store();
    for r in store.redemptions().expect("redemptions") {
        store.remove_redemption(r.id).expect("remove");
        store
            .insert_redemption(starjar_core::NewRedemption {
                user: r.user,
                reward: r.reward,
                cost: None,
                created_at: r.created_at,
            })
            .expect("insert");
    }
    let mut ledger = Ledger::new(store);

    ledger.set_reward_cost(pinned.id, 10, false).expect("cost");
    ledger.set_reward_cost(floating.id, 10, true).expect("cost");

    let entries = ledger.list_redemptions(None, Some(theo), "en").expect("list");
    let cost_of = |reward| {
        entries
            .iter()
            .find(|e| e.reward == reward)
            .map(|e| (e.cost, e.effective_cost))
            .expect("entry")
    };
    assert_eq!(cost_of(pinned.id), (Some(4), 4));
    assert_eq!(cost_of(floating.id), (None, 10));
    assert_eq!(ledger.balance(theo).expect("balance"), 20 - 4 - 10);
}

#[test]
fn insufficient_balance_leaves_balance_unchanged() {
    let Family {
        mut ledger, theo, ..
    } = family(MemoryStore::new());
    ledger
        .record_award(AwardRequest::for_text("theo", "Reading").with_stars(5))
        .expect("award");
    let bike = ledger.create_reward("Bike ride", 8, "🚲", false).expect("reward");

    let err = ledger.redeem("theo", bike.id);
    assert!(matches!(
        err,
        Err(LedgerError::InsufficientBalance { balance: 5, cost: 8 })
    ));
    assert_eq!(ledger.balance(theo).expect("balance"), 5);
    assert!(ledger.store().redemptions().expect("redemptions").is_empty());
}

// =============================================================================
// TRANSLATIONS
// =============================================================================

#[test]
fn translation_fallback_chain() {
    let Family {
        mut ledger, theo, ..
    } = family(MemoryStore::new());
    let reward = ledger.create_reward("Pizza night", 6, "🍕", false).expect("reward");

    let owner = TranslationOwner::Reward(reward.id);
    assert_eq!(ledger.display_text(owner, "fr"), "Pizza night");
    ledger.set_translation(owner, "fr", "Soirée pizza").expect("fr");
    assert_eq!(ledger.display_text(owner, "fr"), "Soirée pizza");

    assert_eq!(ledger.display_text(TranslationOwner::User(theo), "fr"), "theo");
    let reason = ledger.create_reason("Bedtime", 1).expect("reason");
    ledger.delete_reason(reason.id).expect("delete");
    assert_eq!(ledger.display_text(TranslationOwner::Reason(reason.id), "fr"), "");
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

#[test]
fn export_import_roundtrip_preserves_catalog_and_balances() {
    let dir = tempdir().expect("tempdir");
    let Family {
        mut ledger,
        mom,
        theo,
    } = family(RedbStore::open(dir.path().join("jar.redb")).expect("open"));

    ledger
        .record_award(AwardRequest::for_text("theo", "Helped with dishes").awarded_by(mom))
        .expect("award");
    ledger
        .record_award(AwardRequest::for_text("theo", "洗碗").with_stars(4))
        .expect("award");
    let reward = ledger.create_reward("Movie time", 3, "🎬", false).expect("reward");
    ledger
        .set_translation(TranslationOwner::Reward(reward.id), "zh-CN", "看电影")
        .expect("translation");
    ledger.redeem("theo", reward.id).expect("redeem");

    let before = ledger.export_document().expect("export");
    let balance_before = ledger.balance(theo).expect("balance");

    let json = ledger.export_json().expect("json");
    let report = ledger.import_json(&json, ImportMode::Atomic).expect("import");
    assert!(report.skipped.is_empty());

    let after = ledger.export_document().expect("export");
    assert_eq!(after.reasons, before.reasons);
    assert_eq!(after.rewards, before.rewards);
    assert_eq!(after.users, before.users);
    assert_eq!(after.stars.len(), before.stars.len());
    assert_eq!(ledger.balance(theo).expect("balance"), balance_before);
    assert_eq!(ledger.balance(mom).expect("balance"), 0);
}
