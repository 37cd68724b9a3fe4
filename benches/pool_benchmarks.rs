use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use interpreter_pool::core::{BoxedTask, PrioritizedTask, TaskQueue};
use interpreter_pool::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn started_pool(size: usize) -> InterpreterPool {
    let pool = InterpreterPool::with_runtime(PoolConfig::new(size), Arc::new(ScriptRuntime::started()))
        .expect("Failed to create pool");
    pool.initialize().expect("Failed to initialize pool");
    pool
}

fn benchmark_pool_lifecycle(c: &mut Criterion) {
    c.bench_function("pool_initialize_shutdown", |b| {
        b.iter(|| {
            let pool = started_pool(4);
            pool.shutdown(true);
        });
    });
}

fn benchmark_task_submission(c: &mut Criterion) {
    let mut group = c.benchmark_group("task_submission");

    group.bench_function("native_tasks_100", |b| {
        b.iter_batched(
            || started_pool(4),
            |pool| {
                let futures: Vec<_> = (0..100)
                    .map(|i| {
                        pool.submit(
                            move |_: &ScriptRuntime| Ok(black_box(i as i64) + 1),
                            TaskPriority::Normal,
                        )
                    })
                    .collect();
                for future in futures {
                    black_box(future.wait());
                }
                pool.shutdown(true);
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("scripts_100", |b| {
        b.iter_batched(
            || started_pool(4),
            |pool| {
                let futures: Vec<_> = (0..100)
                    .map(|_| pool.execute_script("result = 40 + 2", None, None, TaskPriority::Normal))
                    .collect();
                for future in futures {
                    black_box(future.wait());
                }
                pool.shutdown(true);
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn benchmark_acquire_release(c: &mut Criterion) {
    let pool = started_pool(4);
    c.bench_function("acquire_release", |b| {
        b.iter(|| {
            let guard = pool.acquire(Duration::from_secs(1)).expect("acquire");
            black_box(guard.index());
        });
    });
    pool.shutdown(true);
}

fn benchmark_queue_ordering(c: &mut Criterion) {
    let priorities = [
        TaskPriority::Low,
        TaskPriority::High,
        TaskPriority::Normal,
        TaskPriority::Critical,
    ];

    c.bench_function("priority_queue_push_pop_1000", |b| {
        b.iter(|| {
            let mut queue = TaskQueue::new();
            let now = Instant::now();
            for seq in 0..1000u64 {
                let task: BoxedTask = Box::new(|| TaskResult::rejected("bench"));
                queue.push(PrioritizedTask::new(priorities[seq as usize % 4], now, seq, task));
            }
            while let Some(task) = queue.pop() {
                black_box(task.sequence());
            }
        });
    });
}

criterion_group!(
    benches,
    benchmark_pool_lifecycle,
    benchmark_task_submission,
    benchmark_acquire_release,
    benchmark_queue_ordering
);
criterion_main!(benches);
