use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument};

use crate::core::config::EngineConfig;
use crate::core::error::{Error, Result};
use crate::core::types::{ChunkId, DocumentId, LibraryId, Metadata};
use crate::index::IndexRegistry;
use crate::query::filter::{FilterEvaluator, SearchFilters};
use crate::store::EntityStore;

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub text: String,
    pub score: f32,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct SearchResults {
    pub results: Vec<SearchResult>,
    pub total: usize,
    pub elapsed_ms: f64,
}

/// Orchestrates one search: fetch from the index, hydrate from the store,
/// prune by the predicate bundle, truncate, time.
pub struct SearchCoordinator {
    store: Arc<EntityStore>,
    registry: Arc<IndexRegistry>,
    config: EngineConfig,
}

impl SearchCoordinator {
    pub fn new(store: Arc<EntityStore>, registry: Arc<IndexRegistry>, config: EngineConfig) -> Self {
        SearchCoordinator { store, registry, config }
    }

    #[instrument(skip(self, query, filters), fields(library_id = %library_id, k = k, candidates = tracing::field::Empty, elapsed_ms = tracing::field::Empty))]
    pub fn search(
        &self,
        library_id: LibraryId,
        query: &[f32],
        k: usize,
        filters: Option<SearchFilters>,
    ) -> Result<SearchResults> {
        if k == 0 || k > self.config.max_k {
            return Err(Error::validation(format!(
                "k must be in [1, {}], got {k}",
                self.config.max_k
            )));
        }

        let start = Instant::now();

        let index = self.registry.get_index(library_id)?;

        let dimension = self.store.library_dimension(library_id).ok_or_else(|| {
            Error::internal(format!("library {library_id} has a live index but no established dimension"))
        })?;
        if query.len() != dimension {
            return Err(Error::dimension_mismatch(dimension, query.len()));
        }

        let has_custom = filters.as_ref().is_some_and(|f| f.has_custom());
        let fetch_size = if has_custom { k * self.config.over_fetch_factor } else { k };
        if has_custom {
            debug!(fetch_size, "over-fetch engaged for custom predicate");
        }

        let ranked = {
            let mut index = index.write();
            index.search(query, fetch_size)?
        };
        let candidate_count = ranked.len();

        let mut results = Vec::with_capacity(k.min(candidate_count));
        for (chunk_id, score) in ranked {
            if results.len() >= k {
                break;
            }
            let Some(chunk) = self.store.get_chunk(chunk_id) else {
                continue;
            };
            let keep = match &filters {
                Some(bundle) => FilterEvaluator::matches(bundle, &chunk),
                None => true,
            };
            if keep {
                results.push(SearchResult {
                    chunk_id: chunk.id,
                    document_id: chunk.document_id,
                    text: chunk.text,
                    score,
                    metadata: chunk.metadata,
                });
            }
        }

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let total = results.len();

        tracing::Span::current().record("candidates", candidate_count);
        tracing::Span::current().record("elapsed_ms", elapsed_ms);

        Ok(SearchResults { results, total, elapsed_ms })
    }
}
