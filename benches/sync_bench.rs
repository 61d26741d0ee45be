use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};

use finsync::aggregator::ReadAggregator;
use finsync::replacer::WriteReplacer;
use finsync::storage::InMemoryStorage;
use finsync::AggregateState;
use finsync_core::sort_periods;

fn periods(count: usize) -> Vec<Value> {
    // Spread start dates over several years, with duplicates, in scrambled order
    (0..count)
        .map(|i| {
            let n = (i * 7919) % count;
            let year = 2015 + (n / 120) % 10;
            let month = 1 + (n / 10) % 12;
            let day = 1 + n % 28;
            json!([
                { "startDate": format!("{:04}-{:02}-{:02}", year, month, day), "income": n },
                { "category": "Food", "amount": 12.5 },
            ])
        })
        .collect()
}

fn sample_state(count: usize) -> AggregateState {
    AggregateState {
        periods: periods(count),
        subcategories: serde_json::from_value(json!({
            "Food": ["Groceries", "Restaurants"],
            "Housing": ["Rent", "Utilities"],
        }))
        .unwrap(),
        bank_accounts: vec![json!({ "name": "Checking" }), json!({ "name": "Savings" })],
    }
}

fn bench_sort(c: &mut Criterion) {
    let unsorted = periods(1000);
    c.bench_function("sort_1000_periods", |b| {
        b.iter(|| {
            let mut periods = unsorted.clone();
            sort_periods(black_box(&mut periods));
            periods
        })
    });
}

fn bench_read(c: &mut Criterion) {
    let storage = Arc::new(InMemoryStorage::new());
    WriteReplacer::new(storage.clone())
        .replace(&sample_state(1000))
        .unwrap();
    let reader = ReadAggregator::new(storage);

    c.bench_function("read_1000_periods", |b| b.iter(|| reader.read().unwrap()));
}

fn bench_write(c: &mut Criterion) {
    let storage = Arc::new(InMemoryStorage::new());
    let writer = WriteReplacer::new(storage);
    let state = sample_state(1000);

    c.bench_function("replace_1000_periods", |b| {
        b.iter(|| writer.replace(black_box(&state)).unwrap())
    });
}

fn bench_parse(c: &mut Criterion) {
    let body = serde_json::to_vec(&sample_state(1000)).unwrap();
    c.bench_function("parse_save_body", |b| {
        b.iter(|| WriteReplacer::parse(black_box(&body)).unwrap())
    });
}

criterion_group!(benches, bench_sort, bench_read, bench_write, bench_parse);
criterion_main!(benches);
