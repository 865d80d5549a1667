//! Vector-store collaborator and its in-process implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use meridian_common::{MeridianError, Result};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::embedding::{Embedder, cosine_similarity};
use crate::types::{DocumentChunk, ScoredChunk};

/// Collection key for a subject: its trimmed, uppercased identifier.
pub fn collection_key(subject_id: &str) -> String {
    subject_id.trim().to_uppercase()
}

/// Per-subject collections of embedded chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create an empty collection. Fails if `key` already exists.
    async fn create_collection(&self, key: &str) -> Result<()>;

    /// Drop a collection. A missing collection is not an error.
    async fn delete_collection(&self, key: &str) -> Result<()>;

    async fn has_collection(&self, key: &str) -> Result<bool>;

    async fn add(&self, key: &str, chunks: Vec<DocumentChunk>) -> Result<()>;

    /// The `top_k` chunks most similar to `query_text`, best first.
    async fn query(&self, key: &str, query_text: &str, top_k: usize) -> Result<Vec<ScoredChunk>>;

    async fn count(&self, key: &str) -> Result<usize>;
}

struct StoredChunk {
    chunk: DocumentChunk,
    embedding: Vec<f32>,
}

/// Vector store held in process memory.
pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    collections: RwLock<HashMap<String, Vec<StoredChunk>>>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            collections: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, key: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(key) {
            return Err(MeridianError::Memory(format!(
                "Collection '{key}' already exists"
            )));
        }
        collections.insert(key.to_string(), Vec::new());
        info!(collection = %key, "Created collection");
        Ok(())
    }

    async fn delete_collection(&self, key: &str) -> Result<()> {
        if self.collections.write().await.remove(key).is_some() {
            info!(collection = %key, "Deleted collection");
        }
        Ok(())
    }

    async fn has_collection(&self, key: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(key))
    }

    async fn add(&self, key: &str, chunks: Vec<DocumentChunk>) -> Result<()> {
        if !self.has_collection(key).await? {
            return Err(MeridianError::Memory(format!(
                "Collection '{key}' does not exist"
            )));
        }
        if chunks.is_empty() {
            return Ok(());
        }

        // Embed outside the lock.
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(key)
            .ok_or_else(|| MeridianError::Memory(format!("Collection '{key}' was dropped")))?;

        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            // Same id replaces, matching upsert semantics.
            collection.retain(|s| s.chunk.id != chunk.id);
            collection.push(StoredChunk { chunk, embedding });
        }

        debug!(collection = %key, total = collection.len(), "Added chunks");
        Ok(())
    }

    async fn query(&self, key: &str, query_text: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        if !self.has_collection(key).await? {
            return Err(MeridianError::NotIndexed(key.to_string()));
        }

        let query = self.embedder.embed(query_text).await?;

        let collections = self.collections.read().await;
        let Some(collection) = collections.get(key) else {
            return Err(MeridianError::NotIndexed(key.to_string()));
        };

        let mut scored: Vec<ScoredChunk> = collection
            .iter()
            .map(|s| ScoredChunk {
                chunk: s.chunk.clone(),
                score: cosine_similarity(&query, &s.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        debug!(collection = %key, top_k, returned = scored.len(), "Queried collection");
        Ok(scored)
    }

    async fn count(&self, key: &str) -> Result<usize> {
        Ok(self
            .collections
            .read()
            .await
            .get(key)
            .map(Vec::len)
            .unwrap_or(0))
    }
}
