//! In-memory semantic store with per-student partitioning.
//!
//! Documents are session summaries keyed by a pseudonymous entity hash. The
//! global document list and the per-entity index live behind one lock, so a
//! document is either visible through both or through neither.

mod embedding;

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;

pub use embedding::{cosine_similarity, hash_entity_id, Embedder, HashEmbedder};

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Metadata key holding the entity (student) hash used for partitioning.
pub const ENTITY_HASH_KEY: &str = "student_id_hash";
/// Metadata key holding the originating session id.
pub const SESSION_ID_KEY: &str = "session_id";
/// Metadata key holding the session risk score.
pub const RISK_SCORE_KEY: &str = "risk_score";

/// Free-form document metadata.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Document
// ============================================================================

/// A stored session summary. Immutable once inserted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique document identifier, assigned at insertion.
    pub id: String,
    /// Summary text.
    pub content: String,
    /// Fixed-dimension embedding.
    pub embedding: Vec<f32>,
    /// Metadata (entity hash, session id, risk score, ...).
    pub metadata: Metadata,
    /// When the document was created.
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Entity hash from metadata, if present.
    pub fn entity_hash(&self) -> Option<&str> {
        self.metadata.get(ENTITY_HASH_KEY).and_then(|v| v.as_str())
    }

    /// Session id from metadata, if present.
    pub fn session_id(&self) -> Option<&str> {
        self.metadata.get(SESSION_ID_KEY).and_then(|v| v.as_str())
    }

    /// Risk score from metadata, if present and numeric.
    pub fn risk_score(&self) -> Option<f64> {
        self.metadata.get(RISK_SCORE_KEY).and_then(|v| v.as_f64())
    }
}

/// A ranked search hit.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched document.
    pub document: Arc<Document>,
    /// Cosine similarity to the query in `[-1, 1]`.
    pub similarity: f64,
    /// 1-based position in the returned list.
    pub rank: usize,
}

// ============================================================================
// Vector Store
// ============================================================================

#[derive(Debug, Default)]
struct StoreIndex {
    /// Documents in insertion order.
    documents: Vec<Arc<Document>>,
    /// Document id to position in `documents`.
    by_id: HashMap<String, usize>,
    /// Entity hash to positions in `documents`, in insertion order.
    by_entity: HashMap<String, Vec<usize>>,
}

/// In-memory document store with cosine similarity search.
///
/// Reads may run concurrently; insertions are serialized by the write lock.
pub struct VectorStore {
    dimension: usize,
    embedder: Arc<dyn Embedder>,
    index: RwLock<StoreIndex>,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("dimension", &self.dimension)
            .field("documents", &self.len())
            .finish()
    }
}

impl VectorStore {
    /// Create a store using the deterministic [`HashEmbedder`].
    pub fn new(dimension: usize) -> Self {
        Self::with_embedder(Arc::new(HashEmbedder::new(dimension)))
    }

    /// Create a store around a custom embedder. The embedder's dimension
    /// becomes the store's fixed dimension.
    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            dimension: embedder.dimension(),
            embedder,
            index: RwLock::new(StoreIndex::default()),
        }
    }

    /// Fixed embedding dimension of this store.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed text with the store's embedder.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        self.embedder.embed(text)
    }

    // Writers never leave the index half-updated, so a poisoned lock still
    // guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, StoreIndex> {
        self.index.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreIndex> {
        self.index.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a document timestamped now.
    pub fn add_document(
        &self,
        content: &str,
        metadata: Metadata,
        embedding: Option<Vec<f32>>,
    ) -> StoreResult<Arc<Document>> {
        self.add_document_at(content, metadata, embedding, Utc::now())
    }

    /// Insert a document with an explicit creation time.
    ///
    /// Without an embedding the content is embedded deterministically. A
    /// supplied embedding must match the store dimension.
    pub fn add_document_at(
        &self,
        content: &str,
        metadata: Metadata,
        embedding: Option<Vec<f32>>,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Arc<Document>> {
        let embedding = match embedding {
            Some(e) if e.len() != self.dimension => {
                return Err(StoreError::DimensionMismatch {
                    expected: self.dimension,
                    actual: e.len(),
                });
            }
            Some(e) => e,
            None => self.embedder.embed(content),
        };

        let document = Arc::new(Document {
            id: format!("doc_{}", Uuid::new_v4()),
            content: content.to_string(),
            embedding,
            metadata,
            created_at,
        });

        // Both indices are updated under the same guard.
        let mut index = self.write();
        let position = index.documents.len();
        index.documents.push(Arc::clone(&document));
        index.by_id.insert(document.id.clone(), position);
        if let Some(entity) = document.entity_hash() {
            index
                .by_entity
                .entry(entity.to_string())
                .or_default()
                .push(position);
        }
        drop(index);

        debug!(
            document_id = %document.id,
            entity = document.entity_hash().unwrap_or("-"),
            "Document added"
        );
        Ok(document)
    }

    /// Look up a document by id.
    pub fn get_document(&self, id: &str) -> Option<Arc<Document>> {
        let index = self.read();
        index
            .by_id
            .get(id)
            .map(|&pos| Arc::clone(&index.documents[pos]))
    }

    /// Embed `query` and return the `top_k` most similar documents.
    ///
    /// Candidates are the entity's documents when `entity_hash` is given,
    /// otherwise the whole store. Results below `min_similarity` are dropped.
    /// Ties keep insertion order.
    pub fn search(
        &self,
        query: &str,
        entity_hash: Option<&str>,
        top_k: usize,
        min_similarity: f64,
    ) -> Vec<SearchResult> {
        let query_embedding = self.embedder.embed(query);
        self.search_by_embedding(&query_embedding, entity_hash, top_k, min_similarity)
    }

    /// [`search`](Self::search) with a precomputed query embedding.
    pub fn search_by_embedding(
        &self,
        query_embedding: &[f32],
        entity_hash: Option<&str>,
        top_k: usize,
        min_similarity: f64,
    ) -> Vec<SearchResult> {
        if top_k == 0 {
            return Vec::new();
        }

        let index = self.read();
        let candidates: Vec<&Arc<Document>> = match entity_hash {
            Some(entity) => index
                .by_entity
                .get(entity)
                .map(|positions| positions.iter().map(|&p| &index.documents[p]).collect())
                .unwrap_or_default(),
            None => index.documents.iter().collect(),
        };

        let mut scored: Vec<(f64, &Arc<Document>)> = candidates
            .into_iter()
            .map(|doc| (cosine_similarity(query_embedding, &doc.embedding), doc))
            .filter(|(similarity, _)| *similarity >= min_similarity)
            .collect();

        // Stable sort keeps insertion order among equal similarities.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(i, (similarity, doc))| SearchResult {
                document: Arc::clone(doc),
                similarity,
                rank: i + 1,
            })
            .collect()
    }

    /// An entity's documents, oldest first, at most `limit`.
    pub fn get_entity_history(&self, entity_hash: &str, limit: usize) -> Vec<Arc<Document>> {
        let index = self.read();
        let mut history: Vec<Arc<Document>> = index
            .by_entity
            .get(entity_hash)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&p| Arc::clone(&index.documents[p]))
                    .collect()
            })
            .unwrap_or_default();
        drop(index);

        history.sort_by_key(|doc| doc.created_at);
        history.truncate(limit);
        history
    }

    /// Every document, in insertion order.
    pub fn documents(&self) -> Vec<Arc<Document>> {
        self.read().documents.clone()
    }

    /// Hashes of every entity with at least one document.
    pub fn entity_hashes(&self) -> Vec<String> {
        let mut hashes: Vec<String> = self.read().by_entity.keys().cloned().collect();
        hashes.sort();
        hashes
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.read().documents.len()
    }

    /// True when the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct entities.
    pub fn entity_count(&self) -> usize {
        self.read().by_entity.len()
    }

    /// Drop every document and index entry.
    pub fn clear(&self) {
        let mut index = self.write();
        *index = StoreIndex::default();
        debug!("Vector store cleared");
    }
}
