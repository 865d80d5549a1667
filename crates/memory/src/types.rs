//! Chunk types and index configuration.

use serde::{Deserialize, Serialize};

/// One retrievable piece of an indexed report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Stable id derived from the source label and sequence index
    pub id: String,

    /// Analyst label, or the memo label for synthesis sections
    pub source_label: String,

    /// Memo section title, or `chunk_<n>` for analyst outputs
    pub section_label: String,

    pub text: String,
}

impl DocumentChunk {
    pub fn new(
        id: impl Into<String>,
        source_label: impl Into<String>,
        section_label: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_label: source_label.into(),
            section_label: section_label.into(),
            text: text.into(),
        }
    }
}

/// A chunk returned from a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,

    /// Cosine similarity to the query, higher is closer
    pub score: f32,
}

/// Which embedding backend the vector store uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Deterministic feature hashing, no network
    #[default]
    Hashing,
    /// OpenAI-compatible `/v1/embeddings`
    OpenAi,
    /// Local fastembed model (requires the `fastembed` feature)
    FastEmbed,
}

/// Configuration for indexing and chat retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Maximum characters per analyst chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Chunks retrieved per chat question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Prior chat turns forwarded per question
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Completion budget for chat answers
    #[serde(default = "default_chat_max_tokens")]
    pub chat_max_tokens: u32,

    #[serde(default)]
    pub embedder: EmbedderKind,

    /// Model name for the `openai` and `fastembed` embedders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    /// Base URL for the `openai` embedder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_url: Option<String>,
}

fn default_chunk_size() -> usize {
    1500
}

fn default_top_k() -> usize {
    5
}

fn default_max_history() -> usize {
    6
}

fn default_chat_max_tokens() -> u32 {
    4000
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            top_k: default_top_k(),
            max_history: default_max_history(),
            chat_max_tokens: default_chat_max_tokens(),
            embedder: EmbedderKind::default(),
            embedding_model: None,
            embedding_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_toml() {
        let config: IndexConfig = toml::from_str("").unwrap();
        assert_eq!(config.chunk_size, 1500);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.max_history, 6);
        assert_eq!(config.chat_max_tokens, 4000);
        assert_eq!(config.embedder, EmbedderKind::Hashing);
    }

    #[test]
    fn embedder_kind_parses_lowercase() {
        let config: IndexConfig = toml::from_str(
            r#"
embedder = "openai"
embedding_model = "text-embedding-3-small"
"#,
        )
        .unwrap();
        assert_eq!(config.embedder, EmbedderKind::OpenAi);
        assert_eq!(
            config.embedding_model.as_deref(),
            Some("text-embedding-3-small")
        );
    }
}
