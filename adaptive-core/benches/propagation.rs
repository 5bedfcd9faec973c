//! Benchmark: commit and pull through chains and fan-outs.
//!
//! Compares:
//! - A linear chain of derived values, read from the end
//! - A single source feeding many derived values, each read once

use std::hint::black_box;

use adaptive_core::{Adaptive, AdaptiveGraph, ChangeableValue, Derived};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

/// Build `source -> d1 -> d2 -> ... -> dn`.
fn chain(graph: &AdaptiveGraph, length: usize) -> (ChangeableValue<u64>, Derived<u64>) {
    let source = graph.source(0u64);
    let mut tail = source.map(|v| v + 1).unwrap();
    for _ in 1..length {
        tail = tail.map(|v| v + 1).unwrap();
    }
    (source, tail)
}

/// Build `source -> [d1, d2, ..., dn]`.
fn fan_out(graph: &AdaptiveGraph, width: usize) -> (ChangeableValue<u64>, Vec<Derived<u64>>) {
    let source = graph.source(0u64);
    let leaves = (0..width as u64)
        .map(|i| source.map(move |v| v.wrapping_mul(31).wrapping_add(i)).unwrap())
        .collect();
    (source, leaves)
}

fn benchmark_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation");

    for size in [1, 8, 64, 512] {
        group.bench_with_input(BenchmarkId::new("chain", size), &size, |b, &size| {
            let graph = AdaptiveGraph::new();
            let (source, tail) = chain(&graph, size);
            let mut next = 0u64;
            b.iter(|| {
                next += 1;
                graph.transact(|tx| tx.set(&source, next)).unwrap();
                black_box(tail.get_value().unwrap());
            });
        });

        group.bench_with_input(BenchmarkId::new("fan_out", size), &size, |b, &size| {
            let graph = AdaptiveGraph::new();
            let (source, leaves) = fan_out(&graph, size);
            let mut next = 0u64;
            b.iter(|| {
                next += 1;
                graph.transact(|tx| tx.set(&source, next)).unwrap();
                for leaf in &leaves {
                    black_box(leaf.get_value().unwrap());
                }
            });
        });
    }

    group.finish();
}

fn benchmark_cached_read(c: &mut Criterion) {
    let graph = AdaptiveGraph::new();
    let (_source, tail) = chain(&graph, 64);
    tail.get_value().unwrap();

    c.bench_function("cached_read", |b| {
        b.iter(|| black_box(tail.get_value().unwrap()));
    });
}

criterion_group!(benches, benchmark_propagation, benchmark_cached_read);
criterion_main!(benches);
