use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vekta::core::types::{ChunkId, Metric};
use vekta::index::flat::FlatIndex;
use vekta::index::ivf::IvfIndex;
use vekta::index::VectorIndex;

const DIMENSION: usize = 32;

fn random_corpus(n: usize, seed: u64) -> Vec<(ChunkId, Vec<f32>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let vector: Vec<f32> = (0..DIMENSION).map(|_| rng.gen_range(-1.0..1.0)).collect();
            (ChunkId::new(), vector)
        })
        .collect()
}

fn flat_search_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_search");
    for size in [1_000usize, 10_000] {
        let corpus = random_corpus(size, 7);
        let mut index = FlatIndex::new(DIMENSION, Metric::Cosine);
        index.bulk_add(corpus).unwrap();
        let query = random_corpus(1, 11).remove(0).1;

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| index.search(&query, 10).unwrap());
        });
    }
    group.finish();
}

fn ivf_search_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("ivf_search");
    for size in [1_000usize, 10_000] {
        let corpus = random_corpus(size, 7);
        let mut index = IvfIndex::new(DIMENSION, Metric::Cosine, None, Some(8), 42, 25).unwrap();
        index.bulk_add(corpus).unwrap();
        index.search(&vec![0.0; DIMENSION], 1).unwrap(); // trigger lazy build once, outside the timed loop
        let query = random_corpus(1, 11).remove(0).1;

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| index.search(&query, 10).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, flat_search_benchmark, ivf_search_benchmark);
criterion_main!(benches);
