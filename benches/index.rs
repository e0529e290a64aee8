use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use imdedup::distance::{Metric, cosine, euclidean};
use imdedup::index::{IndexKind, create_index};
use rand::prelude::*;

const DIM: usize = 256;

fn random_vectors(rng: &mut impl Rng, n: usize) -> Vec<Vec<f32>> {
    (0..n).map(|_| (0..DIM).map(|_| rng.random::<f32>() - 0.5).collect()).collect()
}

fn bench_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("Distance");
    let mut rng = rand::rng();
    let src = random_vectors(&mut rng, 1).remove(0);
    let dst = random_vectors(&mut rng, 4096).concat();

    group.throughput(Throughput::Elements(4096));
    group.bench_function("cosine", |b| {
        b.iter(|| dst.chunks_exact(DIM).map(|v| cosine(&src, black_box(v))).sum::<f32>())
    });
    group.bench_function("euclidean", |b| {
        b.iter(|| dst.chunks_exact(DIM).map(|v| euclidean(&src, black_box(v))).sum::<f32>())
    });
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("Search");
    group.sample_size(20);
    let mut rng = rand::rng();
    let data = random_vectors(&mut rng, 10_000);
    let queries = random_vectors(&mut rng, 16);

    for kind in [IndexKind::Flat, IndexKind::Hnsw] {
        let mut index = create_index(kind, DIM, Metric::Cosine, 64, 64);
        for (key, v) in data.iter().enumerate() {
            index.insert(key as u64, v).unwrap();
        }
        group.bench_with_input(BenchmarkId::new("cosine", format!("{kind:?}")), &queries, |b, queries| {
            b.iter(|| {
                queries
                    .iter()
                    .map(|q| index.search(q, black_box(0.1)).unwrap().len())
                    .sum::<usize>()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_distance, bench_search);
criterion_main!(benches);
