//! Benchmarks for collection splices and record compaction.
//!
//! Run with: cargo bench -p tabula-runtime --bench collection_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tabula_core::{Comparator, KeySelector, Row, SortDescriptor};
use tabula_runtime::{IndexedCollection, TaskQueue};

fn rows(ids: impl Iterator<Item = i64>) -> Vec<Row> {
    ids.map(|id| Row::new().with("id", id)).collect()
}

fn by_id() -> Comparator<Row> {
    Comparator::by(SortDescriptor::new("id", |r: &Row| r.get("id").clone()))
}

fn bench_push_unsorted(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection/push");
    for n in [64_i64, 1024] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("unsorted", n), &n, |b, &n| {
            let queue = TaskQueue::new();
            b.iter(|| {
                let data = IndexedCollection::new("data", KeySelector::field("id"), queue.handle());
                data.push(rows(0..n)).expect("unique keys");
                let pending = data.pending_changes().len();
                data.clear_changes();
                black_box(pending)
            });
        });
    }
    group.finish();
}

fn bench_push_sorted(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection/push");
    for n in [64_i64, 1024] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("sorted_interleaved", n), &n, |b, &n| {
            let queue = TaskQueue::new();
            b.iter(|| {
                let data = IndexedCollection::with_sorted_items(
                    "data",
                    KeySelector::field("id"),
                    queue.handle(),
                    rows((0..n).map(|i| i * 2)),
                    by_id(),
                )
                .expect("unique keys");
                data.push(rows((0..n).map(|i| i * 2 + 1))).expect("unique keys");
                let pending = data.pending_changes().len();
                data.clear_changes();
                black_box(pending)
            });
        });
    }
    group.finish();
}

fn bench_splice_middle(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection/splice");
    for n in [64_i64, 1024] {
        group.bench_with_input(BenchmarkId::new("middle", n), &n, |b, &n| {
            let queue = TaskQueue::new();
            let data =
                IndexedCollection::with_items("data", KeySelector::field("id"), queue.handle(), rows(0..n))
                    .expect("unique keys");
            let mid = (n / 2) as isize;
            b.iter(|| {
                let removed = data.splice(mid, 4, Vec::new()).expect("removal");
                data.splice(mid, 0, removed).expect("reinsert");
                data.clear_changes();
                black_box(data.len())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_push_unsorted, bench_push_sorted, bench_splice_middle);
criterion_main!(benches);
