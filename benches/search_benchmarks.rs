//! Insert and search throughput benchmarks.
//!
//! Uses 1,000 vectors of dimension 64 so the suite stays fast in CI. Set
//! `BENCH_FULL_SCALE=1` to run against 50,000 vectors instead.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use smallworld::{DistanceMetric, Embedding, HnswConfig, HnswIndex};

const DIMENSION: usize = 64;
const CI_COUNT: usize = 1_000;
const FULL_SCALE_COUNT: usize = 50_000;

fn vector_count() -> usize {
    if std::env::var("BENCH_FULL_SCALE").is_ok() {
        FULL_SCALE_COUNT
    } else {
        CI_COUNT
    }
}

fn random_vectors(count: usize, rng: &mut StdRng) -> Vec<Embedding> {
    (0..count)
        .map(|_| {
            let data: Vec<f32> = (0..DIMENSION).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
            Embedding::new(data).unwrap()
        })
        .collect()
}

fn populated_index(vectors: &[Embedding]) -> HnswIndex {
    let index = HnswIndex::new(
        DIMENSION,
        vectors.len() + 1,
        DistanceMetric::Cosine,
        HnswConfig::new(16).with_ef_construction(100).with_seed(404),
    )
    .unwrap();
    for (i, v) in vectors.iter().enumerate() {
        index.insert(i as u64, v).unwrap();
    }
    index
}

fn bench_insert(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0);
    let vectors = random_vectors(vector_count(), &mut rng);

    c.bench_function("insert_all", |b| {
        b.iter(|| {
            let index = populated_index(black_box(&vectors));
            black_box(index.len())
        });
    });
}

fn bench_search(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let vectors = random_vectors(vector_count(), &mut rng);
    let index = populated_index(&vectors);
    let queries = random_vectors(100, &mut rng);

    let mut group = c.benchmark_group("search");
    for ef in [50usize, 200] {
        group.bench_function(format!("k10_ef{ef}"), |b| {
            let mut i = 0usize;
            b.iter(|| {
                let query = &queries[i % queries.len()];
                i += 1;
                black_box(index.search(black_box(query), 10, Some(ef)).unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_insert, bench_search);
criterion_main!(benches);
