/// Engine-wide defaults that are not part of the per-library `IndexConfig`
/// callers supply, but that the IVF build and the search coordinator still
/// need a documented value for.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on the allowed `k` for a search request.
    pub max_k: usize,
    /// `m = k * over_fetch_factor` candidates are requested from the index
    /// when a custom predicate is present in the search bundle.
    pub over_fetch_factor: usize,
    /// k-means stops after this many iterations even without convergence.
    pub kmeans_max_iterations: usize,
    /// Default `nprobe` when a library's index config omits it.
    pub default_nprobe: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_k: 1000,
            over_fetch_factor: 3,
            kmeans_max_iterations: 25,
            default_nprobe: 1,
        }
    }
}
