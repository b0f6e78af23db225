use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::core::error::{Error, Result};
use crate::core::types::{ChunkId, Metric};
use crate::index::metric;
use crate::index::vector_index::VectorIndex;

struct Cluster {
    centroid: Vec<f32>,
    members: Vec<ChunkId>,
}

/// Inverted-file clustered approximate k-NN index.
///
/// Partitioning is computed once, lazily, on the first `search` (or an
/// explicit `build()`), via k-means seeded deterministically from a value
/// derived from the owning library's identity — never from wall-clock time,
/// so the same corpus always partitions the same way. Clustering itself
/// always measures squared euclidean distance (the conventional k-means
/// distance); the configured metric is used for centroid probing and
/// candidate ranking at search time. This only matters when `nprobe <
/// nlist`: at `nprobe == nlist` every cluster is probed regardless of how
/// points were partitioned, so the index is exactly equivalent to a flat
/// scan over the same metric.
pub struct IvfIndex {
    dimension: usize,
    metric: Metric,
    nlist_config: Option<usize>,
    nprobe_config: Option<usize>,
    seed: u64,
    kmeans_max_iterations: usize,
    vectors: HashMap<ChunkId, (u64, Vec<f32>)>,
    next_seq: u64,
    built: bool,
    clusters: Vec<Cluster>,
}

impl IvfIndex {
    pub fn new(
        dimension: usize,
        metric: Metric,
        nlist: Option<usize>,
        nprobe: Option<usize>,
        seed: u64,
        kmeans_max_iterations: usize,
    ) -> Result<Self> {
        if let Some(0) = nlist {
            return Err(Error::validation("nlist must be a positive integer"));
        }
        if let Some(0) = nprobe {
            return Err(Error::validation("nprobe must be a positive integer"));
        }
        Ok(IvfIndex {
            dimension,
            metric,
            nlist_config: nlist,
            nprobe_config: nprobe,
            seed,
            kmeans_max_iterations,
            vectors: HashMap::new(),
            next_seq: 0,
            built: false,
            clusters: Vec::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
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

    fn effective_nlist(&self, n: usize) -> usize {
        let derived = ((n as f64).sqrt().floor() as usize).max(1);
        self.nlist_config.unwrap_or(derived).min(n).max(1)
    }

    fn effective_nprobe(&self, nlist: usize) -> usize {
        self.nprobe_config.unwrap_or(1).min(nlist).max(1)
    }

    fn remove_from_clusters(&mut self, id: ChunkId) {
        for cluster in &mut self.clusters {
            cluster.members.retain(|m| *m != id);
        }
    }

    fn assign_to_nearest(&mut self, id: ChunkId, vector: &[f32]) {
        if self.clusters.is_empty() {
            return;
        }
        let mut best = 0usize;
        let mut best_dist = f32::INFINITY;
        for (i, cluster) in self.clusters.iter().enumerate() {
            let d = squared_euclidean(&cluster.centroid, vector);
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }
        self.clusters[best].members.push(id);
    }

    /// Runs k-means over the currently stored vectors and replaces the
    /// partitioning. Idempotent: calling it again re-clusters from scratch.
    pub fn build(&mut self) -> Result<()> {
        let n = self.vectors.len();
        if n == 0 {
            self.clusters.clear();
            self.built = true;
            return Ok(());
        }

        let nlist = self.effective_nlist(n);

        let mut items: Vec<(ChunkId, u64, Vec<f32>)> = self
            .vectors
            .iter()
            .map(|(id, (seq, v))| (*id, *seq, v.clone()))
            .collect();
        items.sort_by_key(|(_, seq, _)| *seq);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let centroids = init_centroids_kmeans_pp(&items, nlist, &mut rng);

        let (final_centroids, assignment) =
            run_lloyd(&items, centroids, self.dimension, self.kmeans_max_iterations);

        let mut clusters: Vec<Cluster> = final_centroids
            .into_iter()
            .map(|centroid| Cluster {
                centroid,
                members: Vec::new(),
            })
            .collect();
        for (i, (id, _, _)) in items.iter().enumerate() {
            clusters[assignment[i]].members.push(*id);
        }

        self.clusters = clusters;
        self.built = true;
        Ok(())
    }
}

fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum
}

fn init_centroids_kmeans_pp(
    items: &[(ChunkId, u64, Vec<f32>)],
    nlist: usize,
    rng: &mut StdRng,
) -> Vec<Vec<f32>> {
    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(nlist);
    let first = rng.gen_range(0..items.len());
    centroids.push(items[first].2.clone());

    while centroids.len() < nlist {
        let weights: Vec<f32> = items
            .iter()
            .map(|(_, _, v)| {
                centroids
                    .iter()
                    .map(|c| squared_euclidean(c, v))
                    .fold(f32::INFINITY, f32::min)
            })
            .collect();
        let total: f32 = weights.iter().sum();

        if total <= 0.0 {
            let idx = rng.gen_range(0..items.len());
            centroids.push(items[idx].2.clone());
            continue;
        }

        let mut threshold = rng.gen::<f32>() * total;
        let mut chosen = items.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            if threshold <= *w {
                chosen = i;
                break;
            }
            threshold -= *w;
        }
        centroids.push(items[chosen].2.clone());
    }

    centroids
}

/// Lloyd's algorithm: alternates nearest-centroid assignment and
/// centroid-mean recomputation until no assignment changes or the
/// iteration cap is hit. A cluster that loses every member keeps its last
/// centroid rather than being reseeded.
fn run_lloyd(
    items: &[(ChunkId, u64, Vec<f32>)],
    mut centroids: Vec<Vec<f32>>,
    dimension: usize,
    max_iterations: usize,
) -> (Vec<Vec<f32>>, Vec<usize>) {
    let nlist = centroids.len();
    let mut assignment = vec![usize::MAX; items.len()];

    for _ in 0..max_iterations {
        let new_assignment: Vec<usize> = items
            .par_iter()
            .map(|(_, _, v)| {
                let mut best = 0usize;
                let mut best_dist = f32::INFINITY;
                for (c_idx, centroid) in centroids.iter().enumerate() {
                    let d = squared_euclidean(centroid, v);
                    if d < best_dist {
                        best_dist = d;
                        best = c_idx;
                    }
                }
                best
            })
            .collect();

        let changed = new_assignment != assignment;
        assignment = new_assignment;

        let mut sums = vec![vec![0.0f32; dimension]; nlist];
        let mut counts = vec![0usize; nlist];
        for (i, (_, _, v)) in items.iter().enumerate() {
            let c = assignment[i];
            counts[c] += 1;
            for d in 0..dimension {
                sums[c][d] += v[d];
            }
        }
        for c in 0..nlist {
            if counts[c] > 0 {
                for d in 0..dimension {
                    centroids[c][d] = sums[c][d] / counts[c] as f32;
                }
            }
        }

        if !changed {
            break;
        }
    }

    (centroids, assignment)
}

impl VectorIndex for IvfIndex {
    fn add(&mut self, id: ChunkId, vector: Vec<f32>) -> Result<()> {
        self.check_dimension(&vector)?;
        let seq = self.next_seq();
        self.vectors.insert(id, (seq, vector.clone()));
        if self.built {
            self.assign_to_nearest(id, &vector);
        }
        Ok(())
    }

    fn update(&mut self, id: ChunkId, vector: Vec<f32>) -> Result<()> {
        self.check_dimension(&vector)?;
        let seq = self
            .vectors
            .get(&id)
            .map(|(seq, _)| *seq)
            .ok_or_else(|| Error::not_found(format!("vector {id} not in index")))?;
        if self.built {
            self.remove_from_clusters(id);
        }
        self.vectors.insert(id, (seq, vector.clone()));
        if self.built {
            self.assign_to_nearest(id, &vector);
        }
        Ok(())
    }

    fn delete(&mut self, id: ChunkId) -> Result<()> {
        self.vectors
            .remove(&id)
            .ok_or_else(|| Error::not_found(format!("vector {id} not in index")))?;
        if self.built {
            self.remove_from_clusters(id);
        }
        Ok(())
    }

    fn bulk_add(&mut self, vectors: Vec<(ChunkId, Vec<f32>)>) -> Result<()> {
        for (id, vector) in vectors {
            self.check_dimension(&vector)?;
            let seq = self.next_seq();
            self.vectors.insert(id, (seq, vector.clone()));
            if self.built {
                self.assign_to_nearest(id, &vector);
            }
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.vectors.clear();
        self.clusters.clear();
        self.built = false;
        self.next_seq = 0;
    }

    fn search(&mut self, query: &[f32], k: usize) -> Result<Vec<(ChunkId, f32)>> {
        self.check_dimension(query)?;
        if k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }
        if !self.built {
            self.build()?;
        }

        let nlist = self.clusters.len();
        let nprobe = self.effective_nprobe(nlist);

        let mut cluster_order: Vec<usize> = (0..nlist).collect();
        cluster_order.sort_by(|&a, &b| {
            let sa = metric::score(self.metric, query, &self.clusters[a].centroid);
            let sb = metric::score(self.metric, query, &self.clusters[b].centroid);
            sb.partial_cmp(&sa).unwrap()
        });

        let mut candidates: Vec<(ChunkId, u64, f32)> = Vec::new();
        for &c_idx in cluster_order.iter().take(nprobe) {
            for &id in &self.clusters[c_idx].members {
                if let Some((seq, v)) = self.vectors.get(&id) {
                    candidates.push((id, *seq, metric::score(self.metric, query, v)));
                }
            }
        }

        candidates.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap().then(a.1.cmp(&b.1)));
        candidates.truncate(k);
        Ok(candidates.into_iter().map(|(id, _, s)| (id, s)).collect())
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}
