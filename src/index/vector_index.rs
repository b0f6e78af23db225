use crate::core::error::Result;
use crate::core::types::ChunkId;

/// Common surface both the flat and IVF indexes implement. Mutating methods
/// take `&mut self`: the index registry gives each library's index its own
/// lock, so no index needs to manage its own interior mutability.
pub trait VectorIndex: Send {
    fn add(&mut self, id: ChunkId, vector: Vec<f32>) -> Result<()>;
    fn update(&mut self, id: ChunkId, vector: Vec<f32>) -> Result<()>;
    fn delete(&mut self, id: ChunkId) -> Result<()>;
    fn bulk_add(&mut self, vectors: Vec<(ChunkId, Vec<f32>)>) -> Result<()>;
    fn clear(&mut self);
    /// Top-`k` candidates for `query`, best score first. `k == 0` returns
    /// an empty vector; `k` larger than the stored count returns everything.
    fn search(&mut self, query: &[f32], k: usize) -> Result<Vec<(ChunkId, f32)>>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
