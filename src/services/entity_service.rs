use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::core::error::Result;
use crate::core::types::{Chunk, ChunkId, Document, DocumentId, Library, LibraryId, Metadata};
use crate::index::IndexRegistry;
use crate::store::EntityStore;

/// CRUD façade in front of the entity store. Beyond pass-through, it
/// overrides caller-supplied parent identities on batch inserts with the
/// identity from the call path, and notifies the index registry whenever a
/// mutation changes the set of vectors reachable from a library or the
/// embedding of one already there. Pure text/metadata updates do not mark
/// an index dirty.
pub struct EntityService {
    store: Arc<EntityStore>,
    registry: Arc<IndexRegistry>,
}

impl EntityService {
    pub fn new(store: Arc<EntityStore>, registry: Arc<IndexRegistry>) -> Self {
        EntityService { store, registry }
    }

    // ------------------------------------------------------------------
    // Libraries
    // ------------------------------------------------------------------

    #[instrument(skip(self, library), fields(library_id = %library.id))]
    pub fn create_library(&self, library: Library) -> Result<Library> {
        info!("creating library");
        self.store.create_library(library)
    }

    #[instrument(skip(self), fields(library_id = %id))]
    pub fn get_library(&self, id: LibraryId) -> Option<Library> {
        debug!("fetching library");
        self.store.get_library(id)
    }

    #[instrument(skip(self))]
    pub fn list_libraries(&self) -> Vec<Library> {
        debug!("listing libraries");
        self.store.list_libraries()
    }

    #[instrument(skip(self, library), fields(library_id = %id))]
    pub fn update_library(&self, id: LibraryId, library: Library) -> Result<Library> {
        info!("updating library");
        self.store.update_library(id, library)
    }

    #[instrument(skip(self), fields(library_id = %id))]
    pub fn delete_library(&self, id: LibraryId) -> Result<()> {
        info!("deleting library");
        self.store.delete_library(id)?;
        self.registry.drop_index(id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    #[instrument(skip(self, name, metadata), fields(library_id = %library_id))]
    pub fn create_document(&self, library_id: LibraryId, name: String, metadata: Metadata) -> Result<Document> {
        info!("creating document");
        let document = Document::new(name, metadata, library_id);
        let created = self.store.create_document(document)?;
        self.registry.mark_dirty(library_id);
        Ok(created)
    }

    #[instrument(skip(self, documents), fields(library_id = %library_id, count = documents.len()))]
    pub fn create_documents_batch(&self, library_id: LibraryId, documents: Vec<Document>) -> Result<Vec<Document>> {
        info!("batch creating documents");
        let overridden: Vec<Document> = documents
            .into_iter()
            .map(|mut document| {
                document.library_id = library_id;
                document
            })
            .collect();
        let created = self.store.create_documents_batch(overridden)?;
        self.registry.mark_dirty(library_id);
        Ok(created)
    }

    #[instrument(skip(self), fields(document_id = %id))]
    pub fn get_document(&self, id: DocumentId) -> Option<Document> {
        debug!("fetching document");
        self.store.get_document(id)
    }

    #[instrument(skip(self), fields(library_id = %library_id))]
    pub fn list_documents_by_library(&self, library_id: LibraryId) -> Vec<Document> {
        debug!("listing documents");
        self.store.list_documents_by_library(library_id)
    }

    #[instrument(skip(self, document), fields(document_id = %id))]
    pub fn update_document(&self, id: DocumentId, document: Document) -> Result<Document> {
        info!("updating document");
        self.store.update_document(id, document)
    }

    #[instrument(skip(self), fields(document_id = %id))]
    pub fn delete_document(&self, id: DocumentId) -> Result<()> {
        info!("deleting document");
        let library_id = self.store.get_document(id).map(|document| document.library_id);
        self.store.delete_document(id)?;
        if let Some(library_id) = library_id {
            self.registry.mark_dirty(library_id);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Chunks
    // ------------------------------------------------------------------

    #[instrument(skip(self, text, embedding, metadata), fields(document_id = %document_id))]
    pub fn create_chunk(
        &self,
        document_id: DocumentId,
        text: String,
        embedding: Vec<f32>,
        metadata: Metadata,
    ) -> Result<Chunk> {
        info!("creating chunk");
        let chunk = Chunk::new(text, embedding, metadata, document_id);
        let created = self.store.create_chunk(chunk)?;
        if let Some(document) = self.store.get_document(document_id) {
            self.registry.mark_dirty(document.library_id);
        }
        Ok(created)
    }

    #[instrument(skip(self, chunks), fields(document_id = %document_id, count = chunks.len()))]
    pub fn create_chunks_batch(&self, document_id: DocumentId, chunks: Vec<Chunk>) -> Result<Vec<Chunk>> {
        info!("batch creating chunks");
        let overridden: Vec<Chunk> = chunks
            .into_iter()
            .map(|mut chunk| {
                chunk.document_id = document_id;
                chunk
            })
            .collect();
        let created = self.store.create_chunks_batch(overridden)?;
        if let Some(document) = self.store.get_document(document_id) {
            self.registry.mark_dirty(document.library_id);
        }
        Ok(created)
    }

    #[instrument(skip(self), fields(chunk_id = %id))]
    pub fn get_chunk(&self, id: ChunkId) -> Option<Chunk> {
        debug!("fetching chunk");
        self.store.get_chunk(id)
    }

    #[instrument(skip(self), fields(document_id = %document_id))]
    pub fn list_chunks_by_document(&self, document_id: DocumentId) -> Vec<Chunk> {
        debug!("listing chunks");
        self.store.list_chunks_by_document(document_id)
    }

    #[instrument(skip(self, chunk), fields(chunk_id = %id))]
    pub fn update_chunk(&self, id: ChunkId, chunk: Chunk) -> Result<Chunk> {
        info!("updating chunk");
        let embedding_changed = self
            .store
            .get_chunk(id)
            .map(|existing| existing.embedding != chunk.embedding)
            .unwrap_or(true);
        let updated = self.store.update_chunk(id, chunk)?;
        if embedding_changed {
            if let Some(document) = self.store.get_document(updated.document_id) {
                self.registry.mark_dirty(document.library_id);
            }
        }
        Ok(updated)
    }

    #[instrument(skip(self), fields(chunk_id = %id))]
    pub fn delete_chunk(&self, id: ChunkId) -> Result<()> {
        info!("deleting chunk");
        let library_id = self
            .store
            .get_chunk(id)
            .and_then(|chunk| self.store.get_document(chunk.document_id))
            .map(|document| document.library_id);
        self.store.delete_chunk(id)?;
        if let Some(library_id) = library_id {
            self.registry.mark_dirty(library_id);
        }
        Ok(())
    }
}
