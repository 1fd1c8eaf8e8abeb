//! Benchmarks for attribute and node reconciliation.
//!
//! Run with: cargo bench -p tabula-render --bench reconcile_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tabula_render::{Document, NodeId, Tree, merge_nodes};

/// A `<tr>` with `cols` cells; `seed` varies text and one attribute.
fn build_row(doc: &mut Document, cols: usize, seed: usize) -> NodeId {
    let tr = doc.create_element("tr");
    doc.set_attribute(tr, "data-index", &seed.to_string());
    for c in 0..cols {
        let td = doc.create_element("td");
        doc.set_attribute(td, "data-column-id", &format!("c{c}"));
        if (c + seed) % 3 == 0 {
            doc.set_attribute(td, "class", "hot");
        }
        let text = doc.create_text(&format!("{}", c * 31 + seed));
        doc.append_child(td, text).expect("fresh nodes");
        doc.append_child(tr, td).expect("fresh nodes");
    }
    tr
}

fn bench_merge_identical(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_nodes/identical");
    for cols in [4, 16, 64] {
        group.throughput(Throughput::Elements(cols as u64));
        group.bench_with_input(BenchmarkId::new("row", cols), &cols, |b, &cols| {
            let mut doc = Document::new();
            let old = build_row(&mut doc, cols, 0);
            b.iter(|| {
                let new = build_row(&mut doc, cols, 0);
                let kept = merge_nodes(&mut doc, None, old, new).expect("merge");
                doc.discard(new);
                black_box(kept)
            });
        });
    }
    group.finish();
}

fn bench_merge_changed(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_nodes/changed");
    for cols in [4, 16, 64] {
        group.throughput(Throughput::Elements(cols as u64));
        group.bench_with_input(BenchmarkId::new("row", cols), &cols, |b, &cols| {
            let mut doc = Document::new();
            let old = build_row(&mut doc, cols, 0);
            let mut seed = 0;
            b.iter(|| {
                seed += 1;
                let new = build_row(&mut doc, cols, seed);
                let kept = merge_nodes(&mut doc, None, old, new).expect("merge");
                doc.discard(new);
                black_box(kept)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_merge_identical, bench_merge_changed);
criterion_main!(benches);
