// Transaction Management Performance Benchmarks
// Tests critical operations including lock acquire/release cycles,
// batch submission through the worker pool, and projection rewriting

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use petra_db::catalog::{Catalog, Schema};
use petra_db::execution::NoopExecutor;
use petra_db::optimizer::{Expression, ProjectionRewriter};
use petra_db::storage::{Extent, InMemoryDirectory};
use petra_db::transaction::{Command, CommandKind, LockMode, LockTable, TransactionManager};
use petra_db::Config;

fn bench_lock_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock_acquire_release");

    for mode in [LockMode::Shared, LockMode::Exclusive] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", mode)),
            &mode,
            |b, &mode| {
                let table = LockTable::new(1024, None);
                let mut txn = 0u64;
                b.iter(|| {
                    txn += 1;
                    table.acquire(txn, txn % 512, mode).unwrap();
                    table.release_all(txn, &[txn % 512]);
                    black_box(txn);
                });
            },
        );
    }

    group.finish();
}

fn bench_shared_fan_in(c: &mut Criterion) {
    c.bench_function("shared_fan_in_single_block", |b| {
        let table = LockTable::new(1024, None);
        b.iter(|| {
            for txn in 1..=10u64 {
                table.acquire(txn, 100, LockMode::Shared).unwrap();
            }
            for txn in 1..=10u64 {
                table.release_all(txn, &[100]);
            }
        });
    });
}

fn bench_submit_commit(c: &mut Criterion) {
    let directory = InMemoryDirectory::new();
    directory.register_table("bench", vec![Extent::new(0, 3)]);
    let manager = TransactionManager::new(
        Config::default(),
        Arc::new(directory),
        Arc::new(NoopExecutor::new()),
    );

    c.bench_function("submit_commit_select", |b| {
        b.iter(|| {
            let submission = manager.submit(vec![Command::new("bench", CommandKind::Select)]);
            black_box(submission.wait());
        });
    });
    manager.await_quiescence();
}

fn bench_projection_rewrite(c: &mut Criterion) {
    let catalog = Catalog::new();
    catalog.register_table(Schema::with_attributes("r", &["a", "b"]));
    catalog.register_table(Schema::with_attributes("s", &["c", "d"]));
    let rewriter = ProjectionRewriter::new(Arc::new(catalog));

    let expr = Expression::new()
        .projection("a;c")
        .theta_join("`a` = `c`")
        .relation("r")
        .relation("s");

    c.bench_function("projection_rewrite_theta_split", |b| {
        b.iter(|| black_box(rewriter.rewrite(&expr)));
    });
}

criterion_group!(
    benches,
    bench_lock_acquire_release,
    bench_shared_fan_in,
    bench_submit_commit,
    bench_projection_rewrite
);
criterion_main!(benches);
