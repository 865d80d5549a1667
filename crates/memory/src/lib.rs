//! Report indexing and retrieval for follow-up chat.
//!
//! A finished [`AnalysisReport`](meridian_common::AnalysisReport) is split
//! into bounded chunks and written to a per-subject collection in a
//! [`VectorStore`]. The [`ChatService`] answers questions by pulling the
//! top-k chunks for a question and handing them to the completion service.
//!
//! ```text
//!  AnalysisReport ──► ReportIndexer ──► VectorStore ◄── ChatService ◄── question
//!                      (sections,        (one collection     (top-k context,
//!                       chunks)           per subject)         last N turns)
//! ```

pub mod chunking;
pub mod embedding;
pub mod indexer;
pub mod retrieval;
pub mod store;
pub mod types;

pub use chunking::{SECTION_HEADERS, Section, chunk_text, split_into_sections};
pub use embedding::{Embedder, HashingEmbedder, OpenAiEmbedder, build_embedder};
pub use indexer::ReportIndexer;
pub use retrieval::{ChatService, MAX_CHAT_HISTORY};
pub use store::{InMemoryVectorStore, VectorStore, collection_key};
pub use types::{DocumentChunk, EmbedderKind, IndexConfig, ScoredChunk};

#[cfg(feature = "fastembed")]
pub use embedding::FastEmbedder;
