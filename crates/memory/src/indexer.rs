//! Builds the per-subject collection from a finished report.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use meridian_common::{AnalysisReport, AnalystRole, ERROR_MARKER, Result, with_deadline};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::chunking::{chunk_text, split_into_sections};
use crate::store::{VectorStore, collection_key};
use crate::types::DocumentChunk;

/// Source label for sections of the synthesis memo.
pub const MEMO_SOURCE: &str = "CIO Memo";

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(300);

pub struct ReportIndexer {
    store: Arc<dyn VectorStore>,
    chunk_size: usize,
    call_timeout: Duration,
    /// One lock per collection key; a rebuild holds it from delete to add.
    rebuilds: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ReportIndexer {
    pub fn new(store: Arc<dyn VectorStore>, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            rebuilds: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Replace the subject's collection with chunks from `report`.
    ///
    /// Any existing collection is deleted first, so nothing from an earlier
    /// run survives. Concurrent calls for the same subject run one after
    /// the other. Returns the number of chunks stored.
    #[instrument(skip(self, report), fields(subject = %subject_id))]
    pub async fn index(&self, subject_id: &str, report: &AnalysisReport) -> Result<usize> {
        let key = collection_key(subject_id);

        let lock = self
            .rebuilds
            .lock()
            .await
            .entry(key.clone())
            .or_default()
            .clone();
        let _guard = lock.lock().await;
        debug!(collection = %key, "Acquired rebuild lock");

        with_deadline(
            "vector store delete",
            self.call_timeout,
            self.store.delete_collection(&key),
        )
        .await?;
        with_deadline(
            "vector store create",
            self.call_timeout,
            self.store.create_collection(&key),
        )
        .await?;

        let chunks = self.build_chunks(report);
        let count = chunks.len();

        if count > 0 {
            with_deadline(
                "vector store add",
                self.call_timeout,
                self.store.add(&key, chunks),
            )
            .await?;
        }

        info!(collection = %key, chunks = count, "Indexed analysis");
        Ok(count)
    }

    /// Memo sections first, then bounded chunks of each analyst's output.
    pub fn build_chunks(&self, report: &AnalysisReport) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();

        for (i, section) in split_into_sections(&report.final_report)
            .into_iter()
            .enumerate()
        {
            chunks.push(DocumentChunk::new(
                format!("cio_{i}"),
                MEMO_SOURCE,
                section.label,
                section.text,
            ));
        }

        // The synthesis output is the memo itself.
        for (role, output) in &report.details {
            if *role == AnalystRole::Synthesis || output.starts_with(ERROR_MARKER) {
                continue;
            }
            let slug = role.label().to_lowercase().replace(' ', "_");
            for (j, text) in chunk_text(output, self.chunk_size).into_iter().enumerate() {
                chunks.push(DocumentChunk::new(
                    format!("{slug}_{j}"),
                    role.label(),
                    format!("chunk_{j}"),
                    text,
                ));
            }
        }

        chunks.retain(|c| !c.text.trim().is_empty());
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::store::InMemoryVectorStore;
    use crate::embedding::Embedder;
    use async_trait::async_trait;
    use meridian_common::{RevisionHistory, TaskResult};
    use std::collections::BTreeMap;

    fn report(memo: &str, quant: &str) -> AnalysisReport {
        let mut results = BTreeMap::new();
        results.insert(
            AnalystRole::Synthesis,
            TaskResult {
                output: memo.to_string(),
                history: RevisionHistory::new(AnalystRole::Synthesis),
            },
        );
        results.insert(
            AnalystRole::Quant,
            TaskResult {
                output: quant.to_string(),
                history: RevisionHistory::new(AnalystRole::Quant),
            },
        );
        AnalysisReport::from_results("run", "INTC", results)
    }

    fn indexer() -> ReportIndexer {
        let store = Arc::new(InMemoryVectorStore::new(Arc::new(HashingEmbedder::default())));
        ReportIndexer::new(store, 1500)
    }

    #[test]
    fn chunk_ids_and_labels() {
        let report = report(
            "Recommendation\n- Hold\n\nExecutive Summary\nMixed.",
            "Revenue fell 2% YoY.",
        );
        let chunks = indexer().build_chunks(&report);

        assert_eq!(chunks[0].id, "cio_0");
        assert_eq!(chunks[0].source_label, "CIO Memo");
        assert_eq!(chunks[0].section_label, "Recommendation");
        assert_eq!(chunks[1].section_label, "Executive Summary");

        let quant = chunks
            .iter()
            .find(|c| c.source_label == "Quantitative Analyst")
            .unwrap();
        assert_eq!(quant.id, "quantitative_analyst_0");
        assert_eq!(quant.section_label, "chunk_0");
    }

    #[test]
    fn failed_roles_and_blank_sections_are_skipped() {
        // Macro, Technical and Fundamental are missing and become error placeholders.
        let report = report("Recommendation\n- Hold", "   ");
        let chunks = indexer().build_chunks(&report);

        assert_eq!(chunks.len(), 1);
        assert!(chunks.iter().all(|c| !c.text.trim().is_empty()));
        assert!(chunks.iter().all(|c| !c.text.starts_with(ERROR_MARKER)));
    }

    #[tokio::test]
    async fn index_returns_count() {
        let indexer = indexer();
        let report = report("Recommendation\n- Buy", "Revenue grew 15%.");
        let n = indexer.index("intc", &report).await.unwrap();
        assert_eq!(n, 2);
        assert_eq!(indexer.store.count("INTC").await.unwrap(), 2);
    }

    /// Hashing embedder whose batch calls take a while.
    struct SlowEmbedder(HashingEmbedder);

    #[async_trait]
    impl Embedder for SlowEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.0.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.0.embed_batch(texts).await
        }

        fn dimension(&self) -> usize {
            self.0.dimension()
        }
    }

    #[tokio::test]
    async fn concurrent_rebuilds_do_not_merge() {
        let store = Arc::new(InMemoryVectorStore::new(Arc::new(SlowEmbedder(
            HashingEmbedder::default(),
        ))));
        let indexer = Arc::new(ReportIndexer::new(store.clone(), 100));

        let first = {
            let indexer = indexer.clone();
            tokio::spawn(async move {
                let old = "Old zebra note. ".repeat(30);
                indexer.index("INTC", &report(&old, &old)).await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = indexer.index("INTC", &report("New RSI 41.", "New RSI 41.")).await;

        first.await.unwrap().unwrap();
        assert_eq!(second.unwrap(), 2);

        let hits = store.query("INTC", "zebra", 100).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| !h.chunk.text.contains("zebra")));
    }
}
