//! Criterion benchmarks for hybrid elimination.
//!
//! Run with: cargo bench
//! Run specific group: cargo bench -- sequential
//! Parallel back-substitution: cargo bench --features rayon -- optimize

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

#[allow(dead_code)]
#[path = "../tests/helpers/switching.rs"]
mod switching;

use switching::Switching;

const CHAIN_LENGTHS: [u64; 3] = [4, 6, 8];

// =============================================================================
// Elimination
// =============================================================================

fn bench_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential");
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(20);

    for k in CHAIN_LENGTHS {
        let s = Switching::new(k);
        group.bench_function(BenchmarkId::new("eliminate", k), |b| {
            b.iter(|| s.graph.eliminate_sequential(black_box(&s.ordering)).unwrap())
        });
    }
    group.finish();
}

fn bench_multifrontal(c: &mut Criterion) {
    let mut group = c.benchmark_group("multifrontal");
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(20);

    for k in CHAIN_LENGTHS {
        let s = Switching::new(k);
        group.bench_function(BenchmarkId::new("eliminate", k), |b| {
            b.iter(|| s.graph.eliminate_multifrontal(black_box(&s.ordering)).unwrap())
        });
    }
    group.finish();
}

// =============================================================================
// Inference on eliminated results
// =============================================================================

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize");
    group.sample_size(50);

    for k in CHAIN_LENGTHS {
        let s = Switching::new(k);
        let net = s.graph.eliminate_sequential(&s.ordering).unwrap();
        let tree = s.graph.eliminate_multifrontal(&s.ordering).unwrap();
        group.bench_function(BenchmarkId::new("bayes_net", k), |b| b.iter(|| net.optimize().unwrap()));
        group.bench_function(BenchmarkId::new("bayes_tree", k), |b| b.iter(|| tree.optimize().unwrap()));
    }
    group.finish();
}

fn bench_prune(c: &mut Criterion) {
    let mut group = c.benchmark_group("prune");
    group.sample_size(20);

    for k in CHAIN_LENGTHS {
        let s = Switching::new(k);
        let net = s.graph.eliminate_sequential(&s.ordering).unwrap();
        group.bench_function(BenchmarkId::new("keep_4", k), |b| b.iter(|| net.prune(black_box(4)).unwrap()));
    }
    group.finish();
}

criterion_group!(benches, bench_sequential, bench_multifrontal, bench_optimize, bench_prune);
criterion_main!(benches);
