//! Qualitative source documents and search over them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use meridian_agents::DataSource;
use meridian_common::{AnalysisContext, Capability, DocumentHandle, MeridianError, Result};
use meridian_memory::chunk_text;
use meridian_memory::embedding::{Embedder, cosine_similarity};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Locates the qualitative corpus (e.g. a 10-K) for a subject.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// A handle to the subject's document, or
    /// [`MeridianError::DocumentNotFound`].
    async fn fetch(&self, subject_id: &str) -> Result<DocumentHandle>;
}

/// Finds `<dir>/<SUBJECT>_10k.md`.
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, subject_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}_10k.md", subject_id.trim().to_uppercase()))
    }
}

#[async_trait]
impl DocumentSource for DirectorySource {
    async fn fetch(&self, subject_id: &str) -> Result<DocumentHandle> {
        let subject_id = subject_id.trim().to_uppercase();
        let path = self.path_for(&subject_id);

        if !tokio::fs::try_exists(&path).await? {
            return Err(MeridianError::DocumentNotFound(format!(
                "{subject_id} (looked for {})",
                path.display()
            )));
        }

        info!(subject = %subject_id, path = %path.display(), "Found source document");
        Ok(DocumentHandle::new(subject_id, path))
    }
}

const FILING_CHUNK_CHARS: usize = 1000;

/// A filing split into chunks, each with its embedding.
type EmbeddedChunks = Arc<Vec<(String, Vec<f32>)>>;

/// Top-k excerpts of the run's document, ranked by embedding similarity to
/// a risk and competition query.
///
/// Each document is chunked and embedded once per source; later calls for
/// the same path reuse the cached vectors until the file's modification
/// time changes.
pub struct FilingSearchSource {
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    cache: RwLock<HashMap<PathBuf, (Option<SystemTime>, EmbeddedChunks)>>,
}

impl FilingSearchSource {
    pub fn new(embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            embedder,
            top_k: top_k.max(1),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn query(context: &AnalysisContext) -> String {
        format!(
            "{} risk factors competition market share margins regulation",
            context.subject.display_name
        )
    }

    async fn embedded_chunks(&self, path: &Path) -> Result<EmbeddedChunks> {
        let modified = tokio::fs::metadata(path).await?.modified().ok();
        if let Some((stamp, cached)) = self.cache.read().await.get(path) {
            if *stamp == modified {
                return Ok(cached.clone());
            }
        }

        let text = tokio::fs::read_to_string(path).await?;
        let chunks = chunk_text(&text, FILING_CHUNK_CHARS);
        let vectors = if chunks.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&chunks).await?
        };
        let embedded: EmbeddedChunks = Arc::new(chunks.into_iter().zip(vectors).collect());

        debug!(path = %path.display(), chunks = embedded.len(), "Embedded filing");
        self.cache
            .write()
            .await
            .insert(path.to_path_buf(), (modified, embedded.clone()));
        Ok(embedded)
    }
}

#[async_trait]
impl DataSource for FilingSearchSource {
    fn capability(&self) -> Capability {
        Capability::FilingSearch
    }

    async fn fetch(&self, context: &AnalysisContext) -> Result<String> {
        let Some(document) = context.document.as_ref() else {
            return Ok("No 10-K data available".to_string());
        };

        let chunks = self.embedded_chunks(&document.path).await?;
        if chunks.is_empty() {
            return Ok("No 10-K data available".to_string());
        }

        let query = self.embedder.embed(&Self::query(context)).await?;
        let mut ranked: Vec<(f32, &str)> = chunks
            .iter()
            .map(|(text, vector)| (cosine_similarity(&query, vector), text.as_str()))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.truncate(self.top_k);

        debug!(
            subject = %context.subject.id,
            chunks = chunks.len(),
            returned = ranked.len(),
            "Filing search complete"
        );

        Ok(ranked
            .into_iter()
            .enumerate()
            .map(|(i, (_, chunk))| format!("[Excerpt {}]\n{}", i + 1, chunk.trim()))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
