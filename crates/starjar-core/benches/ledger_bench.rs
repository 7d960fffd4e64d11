//! # Ledger Benchmarks
//!
//! Performance benchmarks for starjar-core ledger operations.
//!
//! Run with: `cargo bench -p starjar-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use starjar_core::{AwardRequest, Ledger, LedgerStore, MemoryStore, NewUser, UserId};
use std::hint::black_box;

const LABELS: [&str; 4] = ["Dishes", "Homework", "Tidy room", "Walk the dog"];

/// A ledger with one child and `size` awards spread over a few reasons.
fn populated_ledger(size: usize) -> (Ledger<MemoryStore>, UserId) {
    let mut store = MemoryStore::new();
    let theo = store
        .insert_user(NewUser {
            username: "theo".into(),
            password_hash: String::new(),
            is_admin: false,
        })
        .expect("insert")
        .id;
    let mut ledger = Ledger::new(store);
    let reward = ledger
        .create_reward("Movie time", 2, "🎬", false)
        .expect("reward");

    for i in 0..size {
        ledger
            .record_award(AwardRequest::for_text("theo", LABELS[i % LABELS.len()]).with_stars(3))
            .expect("award");
        if i % 4 == 0 {
            ledger.redeem("theo", reward.id).expect("redeem");
        }
    }
    (ledger, theo)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_record_award(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_award");

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(populated_ledger(size)));
        });
    }

    group.finish();
}

fn bench_balance(c: &mut Criterion) {
    let mut group = c.benchmark_group("balance");

    for size in [100, 1000, 10000].iter() {
        let (ledger, theo) = populated_ledger(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(ledger.balance(theo)));
        });
    }

    group.finish();
}

fn bench_leaderboard(c: &mut Criterion) {
    let mut group = c.benchmark_group("leaderboard");

    for size in [100, 1000].iter() {
        let (ledger, _) = populated_ledger(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(ledger.leaderboard("fr")));
        });
    }

    group.finish();
}

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");

    for size in [100, 1000].iter() {
        let (ledger, _) = populated_ledger(*size);

        group.bench_with_input(BenchmarkId::new("json", size), size, |b, _| {
            b.iter(|| black_box(ledger.export_json()));
        });
        group.bench_with_input(BenchmarkId::new("backup", size), size, |b, _| {
            b.iter(|| black_box(ledger.export_backup()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_record_award,
    bench_balance,
    bench_leaderboard,
    bench_export
);
criterion_main!(benches);
