// Throughput of the C2 ring-buffer pool under concurrent `get()` and the
// refill coordinator's replenishment cost, plus the C4 reusable-collection
// pool's random-draw operations for comparison.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pagegen_pool::pool::generated::{GeneratedPool, GeneratedPoolConfig};
use pagegen_pool::pool::reusable::ReusablePool;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn class_name_pool(capacity: i64) -> Arc<GeneratedPool<Arc<str>>> {
    let counter = Arc::new(AtomicU64::new(0));
    GeneratedPool::new(
        "cls",
        GeneratedPoolConfig {
            capacity,
            ..Default::default()
        },
        Arc::new(move || -> Arc<str> {
            Arc::from(format!("cls-{}", counter.fetch_add(1, Ordering::Relaxed)))
        }),
    )
}

fn bench_ring_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("generated_pool_get");
    for capacity in [1_000i64, 10_000, 100_000] {
        let pool = class_name_pool(capacity);
        group.bench_with_input(
            BenchmarkId::new("get", capacity),
            &capacity,
            |b, _| {
                b.iter(|| black_box(pool.get()));
            },
        );
    }
    group.finish();
}

fn bench_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("generated_pool_resize");
    group.bench_function("resize_10k_to_20k", |b| {
        b.iter_batched(
            || class_name_pool(10_000),
            |pool| pool.resize(black_box(20_000)),
            criterion::BatchSize::SmallInput,
        );
    });
    group.finish();
}

fn bench_reusable_draws(c: &mut Criterion) {
    let pool = ReusablePool::new("keywords");
    pool.load_group(1, (0..2000).map(|i| format!("keyword-{i}")).collect());

    let mut group = c.benchmark_group("reusable_pool_draws");
    group.bench_function("get_random", |b| {
        b.iter(|| black_box(pool.get_random(1)));
    });
    group.bench_function("get_unique_5", |b| {
        b.iter(|| black_box(pool.get_unique(1, 5)));
    });
    group.bench_function("next_in_group", |b| {
        b.iter(|| black_box(pool.next_in_group(1)));
    });
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(5));
    targets = bench_ring_get, bench_resize, bench_reusable_draws
}
criterion_main!(benches);
