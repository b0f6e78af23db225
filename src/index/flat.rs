use std::collections::HashMap;

use rayon::prelude::*;

use crate::core::error::{Error, Result};
use crate::core::types::{ChunkId, Metric};
use crate::index::metric;
use crate::index::vector_index::VectorIndex;

/// Exact brute-force k-NN: scores every stored vector against the query and
/// returns the top-k. The correctness baseline; also the structure the IVF
/// index falls back on conceptually when `nprobe == nlist`.
pub struct FlatIndex {
    dimension: usize,
    metric: Metric,
    vectors: HashMap<ChunkId, (u64, Vec<f32>)>,
    next_seq: u64,
}

impl FlatIndex {
    pub fn new(dimension: usize, metric: Metric) -> Self {
        FlatIndex {
            dimension,
            metric,
            vectors: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::dimension_mismatch(self.dimension, vector.len()));
        }
        Ok(())
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

impl VectorIndex for FlatIndex {
    fn add(&mut self, id: ChunkId, vector: Vec<f32>) -> Result<()> {
        self.check_dimension(&vector)?;
        let seq = self.next_seq();
        self.vectors.insert(id, (seq, vector));
        Ok(())
    }

    fn update(&mut self, id: ChunkId, vector: Vec<f32>) -> Result<()> {
        self.check_dimension(&vector)?;
        let seq = self
            .vectors
            .get(&id)
            .map(|(seq, _)| *seq)
            .ok_or_else(|| Error::not_found(format!("vector {id} not in index")))?;
        self.vectors.insert(id, (seq, vector));
        Ok(())
    }

    fn delete(&mut self, id: ChunkId) -> Result<()> {
        self.vectors
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("vector {id} not in index")))
    }

    fn bulk_add(&mut self, vectors: Vec<(ChunkId, Vec<f32>)>) -> Result<()> {
        for (id, vector) in vectors {
            self.check_dimension(&vector)?;
            let seq = self.next_seq();
            self.vectors.insert(id, (seq, vector));
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.vectors.clear();
        self.next_seq = 0;
    }

    fn search(&mut self, query: &[f32], k: usize) -> Result<Vec<(ChunkId, f32)>> {
        self.check_dimension(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(ChunkId, u64, f32)> = self
            .vectors
            .par_iter()
            .map(|(id, (seq, vector))| (*id, *seq, metric::score(self.metric, query, vector)))
            .collect();

        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap().then(a.1.cmp(&b.1)));
        scored.truncate(k);
        Ok(scored.into_iter().map(|(id, _, s)| (id, s)).collect())
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(metric: Metric) -> FlatIndex {
        FlatIndex::new(3, metric)
    }

    #[test]
    fn add_then_search_returns_exact_match_first() {
        let mut index = idx(Metric::Cosine);
        let a = ChunkId::new();
        let b = ChunkId::new();
        let c = ChunkId::new();
        index.add(a, vec![1.0, 0.0, 0.0]).unwrap();
        index.add(b, vec![0.0, 1.0, 0.0]).unwrap();
        index.add(c, vec![0.0, 0.0, 1.0]).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 3).unwrap();
        assert_eq!(results[0].0, a);
        assert!((results[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn euclidean_orders_by_negated_distance() {
        let mut index = FlatIndex::new(2, Metric::Euclidean);
        let origin = ChunkId::new();
        let near1 = ChunkId::new();
        let near2 = ChunkId::new();
        let far = ChunkId::new();
        index.add(origin, vec![0.0, 0.0]).unwrap();
        index.add(near1, vec![1.0, 0.0]).unwrap();
        index.add(near2, vec![0.0, 1.0]).unwrap();
        index.add(far, vec![3.0, 4.0]).unwrap();

        let results = index.search(&[0.0, 0.0], 4).unwrap();
        assert_eq!(results[0], (origin, 0.0));
        assert_eq!(results[3], (far, -5.0));
        let middle: Vec<ChunkId> = results[1..3].iter().map(|(id, _)| *id).collect();
        assert!(middle.contains(&near1) && middle.contains(&near2));
    }

    #[test]
    fn k_zero_returns_nothing_k_over_count_returns_everything() {
        let mut index = idx(Metric::Cosine);
        index.add(ChunkId::new(), vec![1.0, 0.0, 0.0]).unwrap();
        index.add(ChunkId::new(), vec![0.0, 1.0, 0.0]).unwrap();

        assert!(index.search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
        assert_eq!(index.search(&[1.0, 0.0, 0.0], 50).unwrap().len(), 2);
    }

    #[test]
    fn dimension_mismatch_is_rejected_everywhere() {
        let mut index = idx(Metric::Cosine);
        assert!(index.add(ChunkId::new(), vec![1.0, 2.0]).is_err());
        let id = ChunkId::new();
        index.add(id, vec![1.0, 2.0, 3.0]).unwrap();
        assert!(index.update(id, vec![1.0, 2.0]).is_err());
        assert!(index.search(&[1.0, 2.0], 1).is_err());
    }

    #[test]
    fn update_and_delete_on_missing_id_fail() {
        let mut index = idx(Metric::Cosine);
        assert!(index.update(ChunkId::new(), vec![1.0, 2.0, 3.0]).is_err());
        assert!(index.delete(ChunkId::new()).is_err());
    }

    #[test]
    fn tie_breaks_favor_insertion_order() {
        let mut index = FlatIndex::new(1, Metric::Cosine);
        let first = ChunkId::new();
        let second = ChunkId::new();
        // Both positively collinear with the query -> identical cosine score.
        index.add(first, vec![2.0]).unwrap();
        index.add(second, vec![4.0]).unwrap();

        let results = index.search(&[1.0], 2).unwrap();
        assert_eq!(results[0].0, first);
        assert_eq!(results[1].0, second);
    }
}
