use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use taskpool::{
    AsyncExecutor, CountdownBarrier, PoolConfig, Task, ThreadPool, BATCH_BALANCED, BATCH_HEAVIER,
    BATCH_HEAVY, BATCH_LIGHT, BATCH_SPARSE,
};

const TASKS: usize = 10_000;

fn bench_batch_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("schedule_and_forget");
    group.throughput(Throughput::Elements(TASKS as u64));

    for batch_size in [
        BATCH_SPARSE,
        BATCH_LIGHT,
        BATCH_BALANCED,
        BATCH_HEAVY,
        BATCH_HEAVIER,
    ] {
        let pool = ThreadPool::with_config(PoolConfig::default().with_batch_size(batch_size))
            .unwrap();

        group.bench_with_input(
            BenchmarkId::new("batch", batch_size),
            &batch_size,
            |b, _| {
                b.iter(|| {
                    let barrier = Arc::new(CountdownBarrier::new(TASKS));
                    for i in 0..TASKS {
                        let barrier = barrier.clone();
                        pool.schedule_and_forget(move || {
                            black_box(i);
                            barrier.notify().unwrap();
                        });
                    }
                    barrier.wait();
                });
            },
        );
    }

    group.finish();
}

fn bench_bulk_vs_single(c: &mut Criterion) {
    let mut group = c.benchmark_group("submission");
    group.throughput(Throughput::Elements(TASKS as u64));
    let pool = ThreadPool::new(0).unwrap();

    group.bench_function("bulk", |b| {
        b.iter(|| {
            let barrier = Arc::new(CountdownBarrier::new(TASKS));
            let tasks: Vec<Task> = (0..TASKS)
                .map(|_| {
                    let barrier = barrier.clone();
                    Task::new(move || {
                        barrier.notify().unwrap();
                    })
                })
                .collect();
            assert!(pool.schedule_bulk(tasks));
            barrier.wait();
        });
    });

    group.bench_function("with_results", |b| {
        b.iter(|| {
            let channels: Vec<_> = (0..TASKS)
                .map(|i| pool.schedule(move || black_box(i) * 2).unwrap())
                .collect();
            channels
                .into_iter()
                .map(|channel| channel.wait().unwrap())
                .sum::<usize>()
        });
    });

    group.finish();
}

fn bench_async_executor(c: &mut Criterion) {
    c.bench_function("async_executor_drain", |b| {
        let executor = AsyncExecutor::new();
        b.iter(|| {
            for i in 0..TASKS {
                executor.execute_async(move || {
                    black_box(i);
                });
            }
            executor.run()
        });
    });
}

criterion_group!(
    benches,
    bench_batch_sizes,
    bench_bulk_vs_single,
    bench_async_executor
);
criterion_main!(benches);
