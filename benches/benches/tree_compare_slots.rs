// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use canopy_tree::{FullTree, Tree};
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

type P2 = [f64; 2];
type Loc2 = fn(&P2, &mut [f64]);

fn locate2(p: &P2, out: &mut [f64]) {
    out.copy_from_slice(p);
}

fn compact_tree() -> Tree<f64, P2, Loc2> {
    Tree::new(&[0.0, 0.0], &[2000.0, 2000.0], locate2 as Loc2).expect("valid bounds")
}

fn full_tree() -> FullTree<f64, P2, Loc2> {
    FullTree::new(&[0.0, 0.0], &[2000.0, 2000.0], locate2 as Loc2).expect("valid bounds")
}

struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

fn gen_grid_points(n: usize, cell: f64) -> Vec<P2> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            out.push([x as f64 * cell + 0.5 * cell, y as f64 * cell + 0.5 * cell]);
        }
    }
    out
}

fn gen_random_points(count: usize, extent: f64) -> Vec<P2> {
    let mut out = Vec::with_capacity(count);
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    for _ in 0..count {
        out.push([rng.next_f64() * extent, rng.next_f64() * extent]);
    }
    out
}

fn gen_clustered_points(n_clusters: usize, per_cluster: usize, spread: f64) -> Vec<P2> {
    let mut out = Vec::with_capacity(n_clusters * per_cluster);
    let mut rng = Rng::new(0xC1A5_7E55_9999_ABCD);
    let mut centers = Vec::with_capacity(n_clusters);
    for _ in 0..n_clusters {
        centers.push((rng.next_f64() * 1800.0 + 100.0, rng.next_f64() * 1800.0 + 100.0));
    }
    for (cx, cy) in centers {
        for _ in 0..per_cluster {
            let dx = (rng.next_f64() - 0.5) * spread;
            let dy = (rng.next_f64() - 0.5) * spread;
            out.push([cx + dx, cy + dy]);
        }
    }
    out
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for &n in &[32usize, 64, 128] {
        let points = gen_grid_points(n, 10.0);
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("compact_grid_n{}", n), |b| {
            b.iter_batched(
                compact_tree,
                |mut tree| {
                    for p in points.iter().copied() {
                        let _ = tree.add(p);
                    }
                    black_box(tree.count());
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("full_grid_n{}", n), |b| {
            b.iter_batched(
                full_tree,
                |mut tree| {
                    for p in points.iter().copied() {
                        let _ = tree.add(p);
                    }
                    black_box(tree.count());
                },
                BatchSize::SmallInput,
            )
        });
    }
    let clustered = gen_clustered_points(64, 64, 24.0);
    group.throughput(Throughput::Elements(clustered.len() as u64));
    group.bench_function("compact_clustered", |b| {
        b.iter_batched(
            compact_tree,
            |mut tree| {
                for p in clustered.iter().copied() {
                    let _ = tree.add(p);
                }
                black_box(tree.count());
            },
            BatchSize::SmallInput,
        )
    });
    group.bench_function("full_clustered", |b| {
        b.iter_batched(
            full_tree,
            |mut tree| {
                for p in clustered.iter().copied() {
                    let _ = tree.add(p);
                }
                black_box(tree.count());
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_region_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("region_query");
    let points = gen_random_points(4096, 2000.0);

    let mut compact = compact_tree();
    let mut full = full_tree();
    for p in points.iter().copied() {
        let _ = compact.add(p);
        let _ = full.add(p);
    }

    group.throughput(Throughput::Elements(points.len() as u64));
    group.bench_function("compact_viewport", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            compact
                .for_each_in(&[100.0, 100.0], &[500.0, 500.0], |_| hits += 1)
                .expect("valid region");
            black_box(hits);
        })
    });
    group.bench_function("full_viewport", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            full.for_each_in(&[100.0, 100.0], &[500.0, 500.0], |_| hits += 1)
                .expect("valid region");
            black_box(hits);
        })
    });
    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");
    let points = gen_random_points(2048, 2000.0);

    group.throughput(Throughput::Elements(points.len() as u64));
    group.bench_function("compact_insert_remove_half", |b| {
        b.iter_batched(
            compact_tree,
            |mut tree| {
                for p in points.iter().copied() {
                    let _ = tree.add(p);
                }
                let removed = tree
                    .remove_region(&[0.0, 0.0], &[1000.0, 2000.0])
                    .expect("valid region");
                black_box(removed);
            },
            BatchSize::SmallInput,
        )
    });
    group.bench_function("full_insert_remove_half", |b| {
        b.iter_batched(
            full_tree,
            |mut tree| {
                for p in points.iter().copied() {
                    let _ = tree.add(p);
                }
                let removed = tree
                    .remove_region(&[0.0, 0.0], &[1000.0, 2000.0])
                    .expect("valid region");
                black_box(removed);
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_insert, bench_region_query, bench_churn);
criterion_main!(benches);
