use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use segid::{
    MemoryMaxIdStore, PoolConfig, PrefetchWorkerPool, SegmentChainId, SegmentConfig,
    SegmentIdFactory, SegmentIdGenerator, StoreSegmentDistributor, TimeSource,
};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::{Duration, Instant},
};

struct FixedMockTime {
    secs: u64,
}

impl TimeSource for FixedMockTime {
    fn current_secs(&self) -> u64 {
        self.secs
    }
}

// Number of IDs generated per benchmark iteration (per-thread for
// multi-threaded).
const TOTAL_IDS: usize = 4096;

fn foreground_only(step: u64) -> impl SegmentIdGenerator + Send + Sync {
    let store = Arc::new(MemoryMaxIdStore::with_auto_create());
    let distributor =
        StoreSegmentDistributor::new("bench", step, store, FixedMockTime { secs: 1 }).unwrap();
    SegmentChainId::new(distributor, SegmentConfig::with_step(step)).unwrap()
}

/// Benchmarks a generator with no prefetch worker: every `step` ids the
/// caller reserves the next segment itself.
fn bench_generator<G>(c: &mut Criterion, group_name: &str, generator_factory: impl Fn() -> G)
where
    G: SegmentIdGenerator,
{
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{}", TOTAL_IDS), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();

            for _ in 0..iters {
                let generator = generator_factory();
                for _ in 0..TOTAL_IDS {
                    black_box(generator.next_id().unwrap());
                }
            }

            start.elapsed()
        });
    });

    group.finish();
}

/// Benchmarks a shared generator across threads.
fn bench_generator_contended<G>(c: &mut Criterion, group_name: &str, generator_fn: impl Fn() -> G)
where
    G: SegmentIdGenerator + Send + Sync,
{
    let mut group = c.benchmark_group(group_name);

    for thread_count in [1, 2, 4, 8, 16] {
        let ids_per_thread = TOTAL_IDS / thread_count;

        group.throughput(Throughput::Elements(TOTAL_IDS as u64));
        group.bench_function(
            format!("elems/{}/threads/{}", TOTAL_IDS, thread_count),
            |b| {
                b.iter_custom(|iters| {
                    let start = Instant::now();

                    for _ in 0..iters {
                        let generator = Arc::new(generator_fn());
                        let barrier = Arc::new(Barrier::new(thread_count + 1));
                        scope(|s| {
                            for _ in 0..thread_count {
                                let generator = Arc::clone(&generator);
                                let barrier = Arc::clone(&barrier);
                                s.spawn(move || {
                                    barrier.wait();
                                    for _ in 0..ids_per_thread {
                                        black_box(generator.next_id().unwrap());
                                    }
                                });
                            }
                            barrier.wait();
                        });
                    }

                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

fn benchmark_foreground_step_100(c: &mut Criterion) {
    bench_generator(c, "foreground/step/100", || foreground_only(100));
}

fn benchmark_foreground_step_10000(c: &mut Criterion) {
    bench_generator(c, "foreground/step/10000", || foreground_only(10_000));
}

fn benchmark_foreground_contended(c: &mut Criterion) {
    bench_generator_contended(c, "foreground/contended/step/1000", || {
        foreground_only(1000)
    });
}

/// Generators from a factory backed by a running prefetch pool, so
/// exhaustion is usually absorbed by a prefetched segment.
fn benchmark_prefetched_contended(c: &mut Criterion) {
    let pool = Arc::new(
        PrefetchWorkerPool::new(PoolConfig {
            prefetch_period: Duration::from_millis(10),
            core_pool_size: 2,
            ..PoolConfig::default()
        })
        .unwrap(),
    );
    pool.start().unwrap();

    let store = Arc::new(MemoryMaxIdStore::with_auto_create());
    let factory =
        SegmentIdFactory::new(store, Arc::clone(&pool), SegmentConfig::with_step(1000)).unwrap();
    let generator = factory.generator("bench").unwrap();

    bench_generator_contended(c, "prefetched/contended/step/1000", || {
        Arc::clone(&generator)
    });
    pool.stop();
}

criterion_group!(
    benches,
    benchmark_foreground_step_100,
    benchmark_foreground_step_10000,
    benchmark_foreground_contended,
    benchmark_prefetched_contended,
);
criterion_main!(benches);
