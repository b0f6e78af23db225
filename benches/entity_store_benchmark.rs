use std::collections::HashMap;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use vekta::core::types::{Chunk, Document, IndexConfig, IndexKind, Library};
use vekta::store::EntityStore;

fn seeded_store(chunk_count: usize) -> (EntityStore, vekta::core::types::DocumentId) {
    let store = EntityStore::new();
    let library = store
        .create_library(Library::new("bench".into(), HashMap::new(), IndexKind::Flat, IndexConfig::default()))
        .unwrap();
    let document = store
        .create_document(Document::new("doc".into(), HashMap::new(), library.id))
        .unwrap();
    for i in 0..chunk_count {
        store
            .create_chunk(Chunk::new(format!("seed {i}"), vec![1.0, 0.0], HashMap::new(), document.id))
            .unwrap();
    }
    (store, document.id)
}

fn batch_insert_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_store_batch_insert");
    for size in [10usize, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || seeded_store(0),
                |(store, document_id)| {
                    let chunks: Vec<Chunk> = (0..size)
                        .map(|i| Chunk::new(format!("chunk {i}"), vec![1.0, 0.0], HashMap::new(), document_id))
                        .collect();
                    store.create_chunks_batch(chunks).unwrap();
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn list_chunks_by_library_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_store_list_by_library");
    for size in [100usize, 1_000, 10_000] {
        let (store, _) = seeded_store(size);
        let library_id = store.list_libraries()[0].id;
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| store.list_chunks_by_library(library_id));
        });
    }
    group.finish();
}

criterion_group!(benches, batch_insert_benchmark, list_chunks_by_library_benchmark);
criterion_main!(benches);
