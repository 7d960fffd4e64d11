//! # Property-Based Tests
//!
//! Balance and key invariants over arbitrary operation sequences.

use proptest::collection::vec;
use proptest::prelude::*;
use starjar_core::{
    AwardRequest, Ledger, LedgerStore, MemoryStore, NewUser, RewardId, UserId, make_key, uniquify,
};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
enum Op {
    Award { child: usize, label: usize, stars: i64 },
    Redeem { child: usize, reward: usize },
    Reprice { reward: usize, cost: i64, retroactive: bool },
    Restar { label: usize, stars: i64, retroactive: bool },
}

const CHILDREN: [&str; 2] = ["theo", "ray"];
const LABELS: [&str; 3] = ["Dishes", "Homework", "Walk the dog"];

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..2, 0usize..3, -2i64..6).prop_map(|(child, label, stars)| Op::Award {
            child,
            label,
            stars
        }),
        (0usize..2, 0usize..2).prop_map(|(child, reward)| Op::Redeem { child, reward }),
        (0usize..2, -1i64..8, any::<bool>()).prop_map(|(reward, cost, retroactive)| {
            Op::Reprice {
                reward,
                cost,
                retroactive,
            }
        }),
        (0usize..3, -1i64..8, any::<bool>()).prop_map(|(label, stars, retroactive)| {
            Op::Restar {
                label,
                stars,
                retroactive,
            }
        }),
    ]
}

fn setup() -> (Ledger<MemoryStore>, Vec<UserId>, Vec<RewardId>) {
    let mut store = MemoryStore::new();
    let children = CHILDREN
        .iter()
        .map(|name| {
            store
                .insert_user(NewUser {
                    username: (*name).into(),
                    password_hash: String::new(),
                    is_admin: false,
                })
                .expect("insert")
                .id
        })
        .collect();
    let mut ledger = Ledger::new(store);
    let rewards = [("Movie time", 3), ("Ice cream", 5)]
        .iter()
        .map(|(name, cost)| ledger.create_reward(name, *cost, "", false).expect("reward").id)
        .collect();
    (ledger, children, rewards)
}

fn apply(ledger: &mut Ledger<MemoryStore>, rewards: &[RewardId], op: &Op) {
    match *op {
        Op::Award { child, label, stars } => {
            ledger
                .record_award(AwardRequest::for_text(CHILDREN[child], LABELS[label]).with_stars(stars))
                .expect("award");
        }
        Op::Redeem { child, reward } => {
            // Insufficient balance is an expected outcome here.
            let _ = ledger.redeem(CHILDREN[child], rewards[reward]);
        }
        Op::Reprice {
            reward,
            cost,
            retroactive,
        } => {
            ledger
                .set_reward_cost(rewards[reward], cost, retroactive)
                .expect("reprice");
        }
        Op::Restar {
            label,
            stars,
            retroactive,
        } => {
            let summaries = ledger.reasons("en").expect("reasons");
            if let Some(summary) = summaries.iter().find(|s| s.text == LABELS[label]) {
                ledger
                    .set_reason_stars(summary.reason.id, stars, retroactive)
                    .expect("restar");
            }
        }
    }
}

fn raw_balance(store: &MemoryStore, user: UserId) -> i64 {
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
            r.cost
                .or_else(|| rewards.iter().find(|w| w.id == r.reward).map(|w| w.cost))
                .unwrap_or(0)
        })
        .sum();
    credits - debits
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// The derived balance always equals an independent recomputation.
    #[test]
    fn balance_is_sum_of_ledgers(ops in vec(op(), 1..40)) {
        let (mut ledger, children, rewards) = setup();
        for op in &ops {
            apply(&mut ledger, &rewards, op);
        }
        for child in &children {
            prop_assert_eq!(
                ledger.balance(*child).expect("balance"),
                raw_balance(ledger.store(), *child)
            );
        }
    }

    /// A successful redemption never overdraws a balance.
    #[test]
    fn redemptions_never_overdraw_at_redemption_time(ops in vec(op(), 1..40)) {
        let (mut ledger, children, rewards) = setup();
        for op in ops.iter().filter(|op| !matches!(op, Op::Reprice { .. } | Op::Restar { .. })) {
            apply(&mut ledger, &rewards, op);
            for child in &children {
                prop_assert!(ledger.balance(*child).expect("balance") >= 0);
            }
        }
    }

    /// Awards always credit a positive amount.
    #[test]
    fn awards_are_positive(ops in vec(op(), 1..40)) {
        let (mut ledger, _, rewards) = setup();
        for op in &ops {
            apply(&mut ledger, &rewards, op);
        }
        let stars = ledger.store().stars().expect("stars");
        prop_assert!(stars.iter().all(|s| s.stars > 0));
    }

    /// Each distinct label maps to exactly one reason.
    #[test]
    fn labels_reuse_reasons(labels in vec(0usize..3, 1..20)) {
        let (mut ledger, _, _) = setup();
        for label in &labels {
            ledger
                .record_award(AwardRequest::for_text("theo", LABELS[*label]))
                .expect("award");
        }
        let distinct: BTreeSet<usize> = labels.iter().copied().collect();
        prop_assert_eq!(ledger.store().reasons().expect("reasons").len(), distinct.len());
    }

    /// Generated keys are ASCII identifiers and never empty.
    #[test]
    fn keys_are_ascii_identifiers(label in "\\PC{0,40}") {
        let key = make_key(&label);
        prop_assert!(!key.is_empty());
        prop_assert!(key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    /// Uniquified keys never collide with taken keys.
    #[test]
    fn uniquify_avoids_taken(base in "[a-z]{1,8}", extra in 0usize..6) {
        let mut taken: BTreeSet<String> = BTreeSet::new();
        taken.insert(base.clone());
        for n in 2..(2 + extra) {
            taken.insert(format!("{}_{}", base, n));
        }
        let key = uniquify(&base, |k| taken.contains(k));
        prop_assert!(!taken.contains(&key));
    }
}
