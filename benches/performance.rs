//! Performance benchmarks for operator pipelines and checkpoints.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use resumable_rx::checkpoint;
use resumable_rx::operators::SubscribableExt;
use resumable_rx::testing::{on_completed, on_next, TestScheduler};
use resumable_rx::{Subscribable, SubscriptionVisitor};

/// Source of `n` elements, one per tick starting at 201.
fn messages(n: i64) -> Vec<resumable_rx::testing::Recorded<resumable_rx::Notification<i64>>> {
    let mut messages: Vec<_> = (0..n).map(|i| on_next(201 + i, i)).collect();
    messages.push(on_completed(201 + n));
    messages
}

/// Benchmark element throughput through a short pipeline under virtual time
fn bench_pipeline_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_throughput");

    for elements in [100i64, 1_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::new("select_filter_aggregate", elements),
            &elements,
            |b, &n| {
                b.iter(|| {
                    let scheduler = TestScheduler::new();
                    let xs = scheduler.create_hot_observable(messages(n));
                    let results = scheduler
                        .start(move || {
                            xs.clone()
                                .select(|x| Ok(x * 3))
                                .filter(|x| Ok(x % 2 == 0))
                                .aggregate(|acc, x| Ok(acc + x))
                        })
                        .unwrap();
                    black_box(results.values());
                });
            },
        );
    }

    group.finish();
}

/// Benchmark periodic sampling, which schedules a timer per period
fn bench_sample_timers(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_timers");

    for elements in [1_000i64, 10_000] {
        group.bench_with_input(BenchmarkId::new("period_10", elements), &elements, |b, &n| {
            b.iter(|| {
                let scheduler = TestScheduler::new();
                let xs = scheduler.create_hot_observable(messages(n));
                let results = scheduler
                    .start(move || xs.clone().sample(10).unwrap())
                    .unwrap();
                black_box(results.values());
            });
        });
    }

    group.finish();
}

/// Benchmark checkpoint save and load with varying buffered state
fn bench_checkpoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkpoint");

    for listed in [10usize, 1_000, 10_000] {
        let scheduler = TestScheduler::new();
        let xs = scheduler.create_hot_observable(messages(listed as i64));
        let live = xs
            .clone()
            .to_list()
            .subscribe(scheduler.create_observer::<Vec<i64>>());
        SubscriptionVisitor::new(&live)
            .initialize(&scheduler.context())
            .unwrap();
        // Stop before completion so the list stays buffered.
        scheduler
            .scheduler()
            .advance_to(201 + listed as i64 - 1)
            .unwrap();

        group.bench_with_input(BenchmarkId::new("save", listed), &live, |b, live| {
            b.iter(|| black_box(checkpoint::save(live)));
        });

        let saved = checkpoint::save(&live);
        group.bench_with_input(BenchmarkId::new("load", listed), &saved, |b, saved| {
            b.iter(|| {
                let fresh = xs
                    .clone()
                    .to_list()
                    .subscribe(scheduler.create_observer::<Vec<i64>>());
                checkpoint::load(&fresh, saved).unwrap();
                black_box(fresh);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_pipeline_throughput,
    bench_sample_timers,
    bench_checkpoint,
);

criterion_main!(benches);
