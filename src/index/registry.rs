use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, instrument};

use crate::core::config::EngineConfig;
use crate::core::error::{Error, Result};
use crate::core::types::{IndexKind, Library, LibraryId};
use crate::index::flat::FlatIndex;
use crate::index::ivf::IvfIndex;
use crate::index::vector_index::VectorIndex;
use crate::store::EntityStore;

/// A library's live index, shared by every caller that looked it up.
pub type SharedIndex = Arc<RwLock<Box<dyn VectorIndex>>>;

/// Owns one vector index per library and rebuilds it from the entity store
/// on demand.
///
/// Each library gets its own `RwLock`, so a search against library A never
/// waits on a write happening against library B: the promise the
/// concurrency model actually makes is cross-library parallelism, not
/// concurrent readers within one library (the IVF index's lazy build needs
/// `&mut self`, so within a single library, access is serialized by design).
pub struct IndexRegistry {
    store: Arc<EntityStore>,
    config: EngineConfig,
    indexes: Mutex<HashMap<LibraryId, SharedIndex>>,
    dirty: Mutex<HashSet<LibraryId>>,
}

impl IndexRegistry {
    pub fn new(store: Arc<EntityStore>, config: EngineConfig) -> Self {
        IndexRegistry {
            store,
            config,
            indexes: Mutex::new(HashMap::new()),
            dirty: Mutex::new(HashSet::new()),
        }
    }

    /// Marks a library's index as needing a rebuild before its next use.
    /// Idempotent: marking an already-dirty (or never-built) library is a
    /// no-op beyond the set insertion.
    pub fn mark_dirty(&self, library_id: LibraryId) {
        self.dirty.lock().insert(library_id);
    }

    pub fn drop_index(&self, library_id: LibraryId) {
        self.indexes.lock().remove(&library_id);
        self.dirty.lock().remove(&library_id);
    }

    pub fn is_dirty(&self, library_id: LibraryId) -> bool {
        self.dirty.lock().contains(&library_id)
    }

    /// Returns the shared, lock-guarded index for a library, constructing
    /// or rebuilding it first if necessary. Fails with `NotFound` if the
    /// library itself doesn't exist, or `EmptyLibrary` if it has no chunks.
    #[instrument(skip(self), fields(library_id = %library_id))]
    pub fn get_index(&self, library_id: LibraryId) -> Result<SharedIndex> {
        let library = self
            .store
            .get_library(library_id)
            .ok_or_else(|| Error::not_found(format!("library {library_id} not found")))?;

        let was_dirty = self.dirty.lock().remove(&library_id);
        let existing = self.indexes.lock().get(&library_id).cloned();

        if let Some(index) = existing {
            if was_dirty {
                let fresh = self.build_fresh(&library)?;
                *index.write() = fresh;
                debug!("index rebuilt after invalidation");
            }
            return Ok(index);
        }

        let fresh = self.build_fresh(&library)?;
        let shared: SharedIndex = Arc::new(RwLock::new(fresh));
        self.indexes.lock().insert(library_id, shared.clone());
        debug!("index built");
        Ok(shared)
    }

    fn build_fresh(&self, library: &Library) -> Result<Box<dyn VectorIndex>> {
        let chunks = self.store.list_chunks_by_library(library.id);
        if chunks.is_empty() {
            return Err(Error::empty_library(format!(
                "library {} has no chunks to index",
                library.id
            )));
        }
        let dimension = chunks[0].embedding.len();

        let mut index = self.new_index(library, dimension)?;
        let vectors = chunks.into_iter().map(|c| (c.id, c.embedding)).collect();
        index.bulk_add(vectors)?;
        Ok(index)
    }

    fn new_index(&self, library: &Library, dimension: usize) -> Result<Box<dyn VectorIndex>> {
        match library.index_kind {
            IndexKind::Flat => Ok(Box::new(FlatIndex::new(dimension, library.index_config.metric))),
            IndexKind::Ivf => {
                let seed = library_seed(library.id);
                let ivf = IvfIndex::new(
                    dimension,
                    library.index_config.metric,
                    library.index_config.nlist,
                    library.index_config.nprobe,
                    seed,
                    self.config.kmeans_max_iterations,
                )?;
                Ok(Box::new(ivf))
            }
        }
    }
}

/// Derives a k-means seed from a library's identity so the same corpus
/// always partitions the same way. Never touches wall-clock time.
fn library_seed(id: LibraryId) -> u64 {
    let (high, low) = id.value().as_u64_pair();
    high ^ low
}
