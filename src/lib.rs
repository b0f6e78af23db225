pub mod core;
pub mod index;
pub mod query;
pub mod search;
pub mod services;
pub mod store;

use std::sync::Arc;

use crate::core::config::EngineConfig;
use crate::core::error::Result;
use crate::core::types::LibraryId;
use crate::index::IndexRegistry;
use crate::query::filter::SearchFilters;
use crate::search::{SearchCoordinator, SearchResults};
use crate::services::EntityService;
use crate::store::EntityStore;

pub use crate::core::error::{Error, ErrorKind};

/*
┌──────────────────────────────────────────────────────────────────────┐
│                          VEKTA ENGINE LAYOUT                         │
└──────────────────────────────────────────────────────────────────────┘

┌─────────────────────────── struct Engine ─────────────────────────────┐
│ store: Arc<EntityStore>        // libraries/documents/chunks          │
│ registry: Arc<IndexRegistry>   // one vector index per library        │
│ entities: EntityService        // CRUD + dirty-marking                │
│ search: SearchCoordinator      // fetch, hydrate, filter, truncate    │
│ config: EngineConfig                                                  │
└─────────────────────────────────────────────────────────────────────┘

  EntityService ──mutates──> EntityStore
        │
        └──notifies──> IndexRegistry.mark_dirty(library)

  SearchCoordinator ──ensures-fresh──> IndexRegistry ──> VectorIndex (Flat | Ivf)
        │                                                       │
        └──hydrates from──> EntityStore              FilterEvaluator prunes candidates
*/

/// Explicitly constructed, owned entry point to the whole system. No
/// process-wide singleton: callers build one `Engine` at startup and pass
/// it down, typically wrapped in an `Arc` of their own alongside a
/// transport layer.
pub struct Engine {
    store: Arc<EntityStore>,
    registry: Arc<IndexRegistry>,
    entities: EntityService,
    search: SearchCoordinator,
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let store = Arc::new(EntityStore::new());
        let registry = Arc::new(IndexRegistry::new(store.clone(), config.clone()));
        let entities = EntityService::new(store.clone(), registry.clone());
        let search = SearchCoordinator::new(store.clone(), registry.clone(), config.clone());
        Engine {
            store,
            registry,
            entities,
            search,
            config,
        }
    }

    pub fn entities(&self) -> &EntityService {
        &self.entities
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn search(
        &self,
        library_id: LibraryId,
        query: &[f32],
        k: usize,
        filters: Option<SearchFilters>,
    ) -> Result<SearchResults> {
        self.search.search(library_id, query, k, filters)
    }

    /// Forces a library's index to be rebuilt on next use, independent of
    /// any mutation. Exposed for callers that change index configuration
    /// (metric, nlist, nprobe) via a raw library update rather than through
    /// the entity service's mutation paths.
    pub fn invalidate_index(&self, library_id: LibraryId) {
        self.registry.mark_dirty(library_id);
    }

    pub fn dimension_of(&self, library_id: LibraryId) -> Option<usize> {
        self.store.library_dimension(library_id)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{IndexConfig, IndexKind, Library};
    use std::collections::HashMap;

    #[test]
    fn end_to_end_create_and_search() {
        let engine = Engine::default();
        let library = engine
            .entities()
            .create_library(Library::new(
                "docs".into(),
                HashMap::new(),
                IndexKind::Flat,
                IndexConfig::default(),
            ))
            .unwrap();
        let document = engine
            .entities()
            .create_document(library.id, "readme".into(), HashMap::new())
            .unwrap();
        engine
            .entities()
            .create_chunk(document.id, "hello world".into(), vec![1.0, 0.0, 0.0], HashMap::new())
            .unwrap();
        engine
            .entities()
            .create_chunk(document.id, "goodbye world".into(), vec![0.0, 1.0, 0.0], HashMap::new())
            .unwrap();

        let results = engine.search(library.id, &[1.0, 0.0, 0.0], 2, None).unwrap();
        assert_eq!(results.results.len(), 2);
        assert_eq!(results.results[0].text, "hello world");
    }
}
