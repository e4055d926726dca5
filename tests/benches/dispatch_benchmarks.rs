//! # Filter Dispatch Benchmarks
//!
//! | Path | What is measured |
//! |------|------------------|
//! | `LogCriteria::matches` | single record against address and topic constraints |
//! | `Filter::match_logs` | subset extraction over a log batch |
//! | `FilterManager` | bus publish to last callback, many filters installed |

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use filter_manager::{Filter, FilterManager, LogCriteria};
use rand::Rng;
use shared_bus::{ChainEvent, EventPublisher, InMemoryEventBus};
use shared_types::LogRecord;

fn random_logs(n: usize) -> Vec<LogRecord> {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|i| LogRecord {
            address: [rng.gen_range(0..8u8); 20],
            topics: (0..rng.gen_range(1..4)).map(|_| [rng.gen_range(0..8u8); 32]).collect(),
            data: vec![0; 32],
            block_number: rng.gen_range(0..1_000),
            tx_hash: rng.gen(),
            log_index: i as u32,
        })
        .collect()
}

fn selective_criteria() -> LogCriteria {
    LogCriteria::any()
        .with_addresses([[1; 20], [2; 20]])
        .with_topic(None)
        .with_topic(Some(vec![[3; 32], [4; 32]]))
        .with_block_range(Some(100), Some(900))
}

// ============================================================================
// Matching
// ============================================================================

fn bench_criteria_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("log-criteria");
    let logs = random_logs(1_000);
    let criteria = selective_criteria();
    let any = LogCriteria::any();

    group.throughput(Throughput::Elements(logs.len() as u64));
    group.bench_function("selective", |b| {
        b.iter(|| logs.iter().filter(|l| criteria.matches(black_box(l))).count())
    });
    group.bench_function("wildcard", |b| {
        b.iter(|| logs.iter().filter(|l| any.matches(black_box(l))).count())
    });
    group.finish();
}

fn bench_match_logs(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter-match-logs");
    let filter = Filter::new().with_criteria(selective_criteria());

    for size in [10, 100, 1_000] {
        let logs = random_logs(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &logs, |b, logs| {
            b.iter(|| black_box(filter.match_logs(logs)))
        });
    }
    group.finish();
}

// ============================================================================
// End-to-end dispatch
// ============================================================================

fn bench_manager_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("filter-manager-dispatch");
    group.measurement_time(Duration::from_secs(10));

    for filters in [1, 16, 128] {
        let bus = Arc::new(InMemoryEventBus::new());
        bus.start();
        let manager = FilterManager::new(bus.clone());
        let delivered = Arc::new(AtomicU64::new(0));
        for _ in 0..filters {
            let d = delivered.clone();
            manager.install(Filter::new().on_logs(move |logs| {
                d.fetch_add(logs.len() as u64, Ordering::Relaxed);
            }));
        }
        runtime.block_on(async { manager.start().unwrap() });

        let batch = Arc::new(random_logs(64));
        let per_event = (filters * batch.len()) as u64;

        group.throughput(Throughput::Elements(filters as u64));
        group.bench_function(BenchmarkId::new("logs_batch_64", filters), |b| {
            b.iter(|| {
                let target = delivered.load(Ordering::Relaxed) + per_event;
                bus.publish(ChainEvent::Logs(batch.clone()));
                runtime.block_on(async {
                    while delivered.load(Ordering::Relaxed) < target {
                        tokio::task::yield_now().await;
                    }
                });
            })
        });

        manager.stop();
        runtime.block_on(manager.join());
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_criteria_matching,
    bench_match_logs,
    bench_manager_dispatch
);
criterion_main!(benches);
