//! Benchmarks for the perfect assignment hash
//!
//! Covers build cost (dominated by per-slot domain sorting and the
//! interning-style remap tables) and steady-state lookup cost
//! (`rank_vertex`/`rank_edge`), which sit on the hot path of every
//! consistency-graph sweep.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use grounder_core::grounding::assignment::PerfectAssignmentHash;
use grounder_core::object::{Object, ObjectTable};

fn domains_of(slots: usize, domain_size: usize) -> (ObjectTable, Vec<Vec<Object>>) {
    let mut table = ObjectTable::new();
    let objs: Vec<Object> = (0..domain_size).map(|i| table.intern(&format!("o{i}"))).collect();
    (table, vec![objs; slots])
}

/// Benchmark building a hash from scratch at increasing domain sizes.
fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("assignment_hash/build");

    for &size in &[10usize, 100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let (_table, domains) = domains_of(3, size);
            b.iter(|| {
                let hash = PerfectAssignmentHash::build(&domains).unwrap();
                black_box(hash)
            });
        });
    }

    group.finish();
}

/// Benchmark vertex rank lookups against a pre-built hash.
fn bench_rank_vertex(c: &mut Criterion) {
    let mut group = c.benchmark_group("assignment_hash/rank_vertex");

    for &size in &[100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let (_table, domains) = domains_of(2, size);
            let hash = PerfectAssignmentHash::build(&domains).unwrap();
            let objs = &domains[0];

            b.iter(|| {
                let mut acc = 0u32;
                for &o in objs {
                    acc = acc.wrapping_add(hash.rank_vertex(0, o).unwrap());
                }
                black_box(acc)
            });
        });
    }

    group.finish();
}

/// Benchmark edge rank lookups, which additionally multiply by
/// `vertex_count` -- the operation [`super::consistency_graph`] and
/// [`super::kpkc`] run for every candidate pair in the consistency
/// sweep.
fn bench_rank_edge(c: &mut Criterion) {
    let mut group = c.benchmark_group("assignment_hash/rank_edge");

    for &size in &[50usize, 200, 500] {
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let (_table, domains) = domains_of(2, size);
            let hash = PerfectAssignmentHash::build(&domains).unwrap();
            let objs = &domains[0];

            b.iter(|| {
                let mut acc = 0u32;
                for &o1 in objs {
                    for &o2 in objs {
                        if let Some(r) = hash.rank_edge(0, o1, 1, o2) {
                            acc = acc.wrapping_add(r);
                        }
                    }
                }
                black_box(acc)
            });
        });
    }

    group.finish();
}

/// Benchmark inverting vertex ranks back to objects.
fn bench_invert_vertex(c: &mut Criterion) {
    let mut group = c.benchmark_group("assignment_hash/invert_vertex");

    for &size in &[100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let (_table, domains) = domains_of(1, size);
            let hash = PerfectAssignmentHash::build(&domains).unwrap();
            let ranks: Vec<u32> = domains[0].iter().map(|&o| hash.rank_vertex(0, o).unwrap()).collect();

            b.iter(|| {
                let mut found = 0usize;
                for &r in &ranks {
                    if hash.invert_vertex(0, r).is_some() {
                        found += 1;
                    }
                }
                black_box(found)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build, bench_rank_vertex, bench_rank_edge, bench_invert_vertex);
criterion_main!(benches);
