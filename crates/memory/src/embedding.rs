//! Embedding backends for the vector store.
//!
//! Three implementations share the [`Embedder`] trait:
//!
//! - [`HashingEmbedder`]: deterministic feature hashing, no model download,
//!   used by default and in tests
//! - [`OpenAiEmbedder`]: `text-embedding-3-small` over an OpenAI-compatible
//!   HTTP endpoint
//! - `FastEmbedder`: a local fastembed model, behind the `fastembed` feature

use std::sync::Arc;

use async_trait::async_trait;
use meridian_common::{MeridianError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::types::{EmbedderKind, IndexConfig};

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize;
}

/// Build the embedder selected by `config`.
pub fn build_embedder(config: &IndexConfig, api_key: Option<String>) -> Result<Arc<dyn Embedder>> {
    match config.embedder {
        EmbedderKind::Hashing => Ok(Arc::new(HashingEmbedder::default())),
        EmbedderKind::OpenAi => Ok(Arc::new(OpenAiEmbedder::new(
            config.embedding_url.clone(),
            config.embedding_model.clone(),
            api_key,
        ))),
        #[cfg(feature = "fastembed")]
        EmbedderKind::FastEmbed => {
            let model = config
                .embedding_model
                .as_deref()
                .unwrap_or("all-MiniLM-L6-v2");
            Ok(Arc::new(FastEmbedder::from_model_str(model)?))
        }
        #[cfg(not(feature = "fastembed"))]
        EmbedderKind::FastEmbed => Err(MeridianError::Config(
            "embedder = \"fastembed\" requires building with the `fastembed` feature".into(),
        )),
    }
}

// ── Hashing ────────────────────────────────────────────────────────────────

const DEFAULT_HASH_DIM: usize = 384;

/// Bag-of-words feature hashing into a fixed number of buckets.
///
/// Texts sharing vocabulary land close in cosine space, which is enough for
/// keyword-style retrieval without a model.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        let tokens = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty());

        for token in tokens {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            // High bit picks the sign to keep collisions from only adding up.
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIM)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ── OpenAI ─────────────────────────────────────────────────────────────────

const OPENAI_EMBEDDING_URL: &str = "https://api.openai.com";
const OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(base_url: Option<String>, model: Option<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or_else(|| OPENAI_EMBEDDING_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or_else(|| OPENAI_EMBEDDING_MODEL.to_string()),
            api_key,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MeridianError::Collaborator("Empty embedding result".into()))
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let mut req = self.http_client.post(&url).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| MeridianError::Collaborator(format!("Embedding request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MeridianError::Collaborator(format!(
                "Embedding API error {status}: {body}"
            )));
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            MeridianError::Collaborator(format!("Failed to parse embedding response: {e}"))
        })?;

        if parsed.data.len() != texts.len() {
            return Err(MeridianError::Collaborator(format!(
                "Embedding API returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);
        debug!(count = parsed.data.len(), "Generated batch embeddings");
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }
}

// ── fastembed ──────────────────────────────────────────────────────────────

#[cfg(feature = "fastembed")]
pub use local::FastEmbedder;

#[cfg(feature = "fastembed")]
mod local {
    use std::sync::Arc;

    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use meridian_common::{MeridianError, Result};
    use once_cell::sync::OnceCell;
    use tokio::task;
    use tracing::{debug, info, instrument};

    use super::Embedder;

    /// Local embedding model, loaded on first use and shared afterwards.
    pub struct FastEmbedder {
        model_name: EmbeddingModel,
        dimension: usize,
        model: OnceCell<Arc<TextEmbedding>>,
    }

    impl FastEmbedder {
        pub fn new(model_name: EmbeddingModel, dimension: usize) -> Self {
            Self {
                model_name,
                dimension,
                model: OnceCell::new(),
            }
        }

        pub fn from_model_str(model_name: &str) -> Result<Self> {
            let (model, dim) = match model_name {
                "all-MiniLM-L6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
                "all-MiniLM-L12-v2" => (EmbeddingModel::AllMiniLML12V2, 384),
                "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
                "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
                "nomic-embed-text-v1.5" => (EmbeddingModel::NomicEmbedTextV15, 768),
                other => {
                    return Err(MeridianError::Config(format!(
                        "Unknown embedding model: '{other}'"
                    )));
                }
            };
            Ok(Self::new(model, dim))
        }

        #[instrument(skip(self))]
        fn get_or_init_model(&self) -> Result<Arc<TextEmbedding>> {
            self.model
                .get_or_try_init(|| {
                    info!(model = ?self.model_name, "Initializing embedding model");
                    let mut options = InitOptions::new(self.model_name.clone());
                    options.show_download_progress = true;
                    let model = TextEmbedding::try_new(options)
                        .map_err(|e| MeridianError::Memory(e.to_string()))?;
                    Ok(Arc::new(model))
                })
                .cloned()
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.embed_batch(&[text.to_string()])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| MeridianError::Memory("Empty embedding result".into()))
        }

        #[instrument(skip(self, texts), fields(batch_size = texts.len()))]
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let model = self.get_or_init_model()?;
            let texts = texts.to_vec();

            let embeddings = task::spawn_blocking(move || {
                model
                    .embed(texts, None)
                    .map_err(|e| MeridianError::Memory(e.to_string()))
            })
            .await
            .map_err(|e| MeridianError::Memory(format!("Blocking task failed: {e}")))??;

            debug!(batch_size = embeddings.len(), "Generated batch embeddings");
            Ok(embeddings)
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn known_models_resolve() {
            assert_eq!(
                FastEmbedder::from_model_str("all-MiniLM-L6-v2")
                    .unwrap()
                    .dimension(),
                384
            );
            assert!(FastEmbedder::from_model_str("unknown-model").is_err());
        }

        #[tokio::test]
        #[ignore = "Downloads model from network, slow"]
        async fn embeds_with_model_dimension() {
            let embedder = FastEmbedder::from_model_str("all-MiniLM-L6-v2").unwrap();
            let v = embedder.embed("Gross margin expanded").await.unwrap();
            assert_eq!(v.len(), 384);
        }
    }
}

/// Cosine similarity of two vectors; zero when either is all zeros.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
