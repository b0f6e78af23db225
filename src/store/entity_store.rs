use std::cell::RefCell;
use std::collections::HashMap;

use parking_lot::ReentrantMutex;
use tracing::{debug, instrument};

use crate::core::error::{Error, Result};
use crate::core::types::{Chunk, ChunkId, Document, DocumentId, Library, LibraryId, Metadata};

/// The actual tables, guarded by the store's reentrant mutex.
struct Inner {
    libraries: HashMap<LibraryId, Library>,
    documents: HashMap<DocumentId, Document>,
    chunks: HashMap<ChunkId, Chunk>,
    /// Embedding length established by the first chunk inserted into a
    /// library; cleared once the library holds no chunks, so a cleared-out
    /// library can be reseeded with a different dimension. Backs invariant
    /// 3 (uniform dimension per library).
    library_dimension: HashMap<LibraryId, usize>,
}

impl Inner {
    fn new() -> Self {
        Inner {
            libraries: HashMap::new(),
            documents: HashMap::new(),
            chunks: HashMap::new(),
            library_dimension: HashMap::new(),
        }
    }
}

/// Thread-safe owner of every library, document, and chunk in the process.
///
/// All reads and writes are serialized under a single reentrant mutex: the
/// cascading deletes below collect descendant identities under one lock
/// acquisition rather than recursing back through the public, lock-taking
/// API, which keeps the interior `RefCell` borrow scoped to one level at a
/// time while still presenting the single-critical-section semantics the
/// reentrant lock is there to support for composable callers above this
/// layer (see `services::`).
pub struct EntityStore {
    inner: ReentrantMutex<RefCell<Inner>>,
}

impl EntityStore {
    pub fn new() -> Self {
        EntityStore {
            inner: ReentrantMutex::new(RefCell::new(Inner::new())),
        }
    }

    // ------------------------------------------------------------------
    // Libraries
    // ------------------------------------------------------------------

    pub fn create_library(&self, library: Library) -> Result<Library> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if inner.libraries.contains_key(&library.id) {
            return Err(Error::integrity(format!("library {} already exists", library.id)));
        }
        inner.libraries.insert(library.id, library.clone());
        Ok(library)
    }

    pub fn get_library(&self, id: LibraryId) -> Option<Library> {
        let guard = self.inner.lock();
        guard.borrow().libraries.get(&id).cloned()
    }

    pub fn list_libraries(&self) -> Vec<Library> {
        let guard = self.inner.lock();
        guard.borrow().libraries.values().cloned().collect()
    }

    pub fn update_library(&self, id: LibraryId, library: Library) -> Result<Library> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if !inner.libraries.contains_key(&id) {
            return Err(Error::not_found(format!("library {id} not found")));
        }
        inner.libraries.insert(id, library.clone());
        Ok(library)
    }

    #[instrument(skip(self), fields(library_id = %id))]
    pub fn delete_library(&self, id: LibraryId) -> Result<()> {
        let guard = self.inner.lock();

        let document_ids = {
            let inner = guard.borrow();
            match inner.libraries.get(&id) {
                Some(library) => library.document_ids.clone(),
                None => return Err(Error::not_found(format!("library {id} not found"))),
            }
        };

        for document_id in document_ids {
            self.delete_document_within(&guard, document_id);
        }

        let mut inner = guard.borrow_mut();
        inner.libraries.remove(&id);
        inner.library_dimension.remove(&id);
        debug!("library deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    pub fn create_document(&self, document: Document) -> Result<Document> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();

        if inner.documents.contains_key(&document.id) {
            return Err(Error::integrity(format!("document {} already exists", document.id)));
        }
        if !inner.libraries.contains_key(&document.library_id) {
            return Err(Error::not_found(format!("library {} not found", document.library_id)));
        }

        inner.documents.insert(document.id, document.clone());
        let library = inner.libraries.get_mut(&document.library_id).unwrap();
        if !library.document_ids.contains(&document.id) {
            library.document_ids.push(document.id);
        }
        Ok(document)
    }

    pub fn get_document(&self, id: DocumentId) -> Option<Document> {
        let guard = self.inner.lock();
        guard.borrow().documents.get(&id).cloned()
    }

    pub fn list_documents_by_library(&self, library_id: LibraryId) -> Vec<Document> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        match inner.libraries.get(&library_id) {
            Some(library) => library
                .document_ids
                .iter()
                .filter_map(|id| inner.documents.get(id).cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn update_document(&self, id: DocumentId, document: Document) -> Result<Document> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if !inner.documents.contains_key(&id) {
            return Err(Error::not_found(format!("document {id} not found")));
        }
        inner.documents.insert(id, document.clone());
        Ok(document)
    }

    #[instrument(skip(self), fields(document_id = %id))]
    pub fn delete_document(&self, id: DocumentId) -> Result<()> {
        let guard = self.inner.lock();
        if guard.borrow().documents.get(&id).is_none() {
            return Err(Error::not_found(format!("document {id} not found")));
        }
        self.delete_document_within(&guard, id);
        Ok(())
    }

    /// Cascades a document delete while the caller already holds `guard`.
    /// Does not re-enter any lock-taking public method, so it cannot
    /// conflict with an in-progress `RefCell` borrow elsewhere on this
    /// thread's call stack.
    fn delete_document_within(
        &self,
        guard: &parking_lot::ReentrantMutexGuard<'_, RefCell<Inner>>,
        id: DocumentId,
    ) {
        let (chunk_ids, library_id) = {
            let inner = guard.borrow();
            match inner.documents.get(&id) {
                Some(document) => (document.chunk_ids.clone(), document.library_id),
                None => return,
            }
        };

        for chunk_id in chunk_ids {
            self.delete_chunk_within(guard, chunk_id);
        }

        let mut inner = guard.borrow_mut();
        inner.documents.remove(&id);
        if let Some(library) = inner.libraries.get_mut(&library_id) {
            library.document_ids.retain(|d| *d != id);
        }
    }

    pub fn create_documents_batch(&self, documents: Vec<Document>) -> Result<Vec<Document>> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();

        for document in &documents {
            if inner.documents.contains_key(&document.id) {
                return Err(Error::integrity(format!("document {} already exists", document.id)));
            }
            if !inner.libraries.contains_key(&document.library_id) {
                return Err(Error::not_found(format!("library {} not found", document.library_id)));
            }
        }

        for document in &documents {
            inner.documents.insert(document.id, document.clone());
            let library = inner.libraries.get_mut(&document.library_id).unwrap();
            if !library.document_ids.contains(&document.id) {
                library.document_ids.push(document.id);
            }
        }

        Ok(documents)
    }

    // ------------------------------------------------------------------
    // Chunks
    // ------------------------------------------------------------------

    pub fn create_chunk(&self, chunk: Chunk) -> Result<Chunk> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        Self::insert_chunk_validated(&mut inner, &chunk)?;
        Self::insert_chunk_unchecked(&mut inner, chunk.clone());
        Ok(chunk)
    }

    pub fn get_chunk(&self, id: ChunkId) -> Option<Chunk> {
        let guard = self.inner.lock();
        guard.borrow().chunks.get(&id).cloned()
    }

    pub fn list_chunks_by_document(&self, document_id: DocumentId) -> Vec<Chunk> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        match inner.documents.get(&document_id) {
            Some(document) => document
                .chunk_ids
                .iter()
                .filter_map(|id| inner.chunks.get(id).cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    /// All chunks reachable from a library, across every one of its
    /// documents. Used by the index registry to (re)build an index.
    pub fn list_chunks_by_library(&self, library_id: LibraryId) -> Vec<Chunk> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        let Some(library) = inner.libraries.get(&library_id) else {
            return Vec::new();
        };
        library
            .document_ids
            .iter()
            .filter_map(|doc_id| inner.documents.get(doc_id))
            .flat_map(|document| {
                document
                    .chunk_ids
                    .iter()
                    .filter_map(|id| inner.chunks.get(id).cloned())
            })
            .collect()
    }

    pub fn update_chunk(&self, id: ChunkId, chunk: Chunk) -> Result<Chunk> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if !inner.chunks.contains_key(&id) {
            return Err(Error::not_found(format!("chunk {id} not found")));
        }

        let library_id = {
            let document = inner
                .documents
                .get(&chunk.document_id)
                .ok_or_else(|| Error::not_found(format!("document {} not found", chunk.document_id)))?;
            document.library_id
        };
        Self::validate_dimension(&inner, library_id, chunk.embedding.len())?;

        inner.chunks.insert(id, chunk.clone());
        Ok(chunk)
    }

    #[instrument(skip(self), fields(chunk_id = %id))]
    pub fn delete_chunk(&self, id: ChunkId) -> Result<()> {
        let guard = self.inner.lock();
        if guard.borrow().chunks.get(&id).is_none() {
            return Err(Error::not_found(format!("chunk {id} not found")));
        }
        self.delete_chunk_within(&guard, id);
        Ok(())
    }

    fn delete_chunk_within(&self, guard: &parking_lot::ReentrantMutexGuard<'_, RefCell<Inner>>, id: ChunkId) {
        let mut inner = guard.borrow_mut();
        let Some(chunk) = inner.chunks.remove(&id) else {
            return;
        };
        if let Some(document) = inner.documents.get_mut(&chunk.document_id) {
            document.chunk_ids.retain(|c| *c != id);
            let library_id = document.library_id;
            let document_count = document.chunk_ids.len();
            if document_count == 0 {
                let still_has_chunks = inner
                    .libraries
                    .get(&library_id)
                    .map(|library| {
                        library.document_ids.iter().any(|doc_id| {
                            inner
                                .documents
                                .get(doc_id)
                                .map(|d| !d.chunk_ids.is_empty())
                                .unwrap_or(false)
                        })
                    })
                    .unwrap_or(false);
                if !still_has_chunks {
                    inner.library_dimension.remove(&library_id);
                }
            }
        }
    }

    pub fn create_chunks_batch(&self, chunks: Vec<Chunk>) -> Result<Vec<Chunk>> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();

        for chunk in &chunks {
            Self::insert_chunk_validated(&mut inner, chunk)?;
        }
        for chunk in &chunks {
            Self::insert_chunk_unchecked(&mut inner, chunk.clone());
        }
        Ok(chunks)
    }

    fn insert_chunk_validated(inner: &mut Inner, chunk: &Chunk) -> Result<()> {
        if inner.chunks.contains_key(&chunk.id) {
            return Err(Error::integrity(format!("chunk {} already exists", chunk.id)));
        }
        let document = inner
            .documents
            .get(&chunk.document_id)
            .ok_or_else(|| Error::not_found(format!("document {} not found", chunk.document_id)))?;
        Self::validate_dimension(inner, document.library_id, chunk.embedding.len())?;
        Ok(())
    }

    fn insert_chunk_unchecked(inner: &mut Inner, chunk: Chunk) {
        let document_id = chunk.document_id;
        let chunk_id = chunk.id;
        let embedding_len = chunk.embedding.len();

        inner.chunks.insert(chunk_id, chunk);
        if let Some(document) = inner.documents.get_mut(&document_id) {
            if !document.chunk_ids.contains(&chunk_id) {
                document.chunk_ids.push(chunk_id);
            }
            inner.library_dimension.entry(document.library_id).or_insert(embedding_len);
        }
    }

    fn validate_dimension(inner: &Inner, library_id: LibraryId, len: usize) -> Result<()> {
        if len == 0 {
            return Err(Error::validation("embedding must not be empty"));
        }
        if let Some(&expected) = inner.library_dimension.get(&library_id) {
            if expected != len {
                return Err(Error::dimension_mismatch(expected, len));
            }
        }
        Ok(())
    }

    /// The embedding dimension established for a library, if any chunk has
    /// been inserted into it yet.
    pub fn library_dimension(&self, library_id: LibraryId) -> Option<usize> {
        let guard = self.inner.lock();
        guard.borrow().library_dimension.get(&library_id).copied()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
