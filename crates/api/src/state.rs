//! Application state for the API server.

use meridian_common::{AnalysisReport, Result};
use meridian_llm::build_llm_client;
use meridian_memory::{ChatService, InMemoryVectorStore, ReportIndexer, build_embedder};
use meridian_orchestrator::{MeridianConfig, Orchestrator};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for the API server.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,

    pub indexer: Arc<ReportIndexer>,

    pub chat: Arc<ChatService>,

    /// Latest report per subject, keyed by uppercased subject id
    pub reports: RwLock<HashMap<String, AnalysisReport>>,

    /// Server start time (for health checks)
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, indexer: ReportIndexer, chat: ChatService) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            indexer: Arc::new(indexer),
            chat: Arc::new(chat),
            reports: RwLock::new(HashMap::new()),
            start_time: std::time::Instant::now(),
        }
    }

    /// Build every service from `config`. The vector store and the filing
    /// search share one embedder.
    pub fn from_config(config: &MeridianConfig) -> Result<Self> {
        let call_timeout = config.revision.call_timeout();
        let embedder = build_embedder(&config.index, config.llm.resolve_api_key())?;
        let store = Arc::new(InMemoryVectorStore::new(embedder.clone()));

        let orchestrator = Orchestrator::from_config(config, embedder)?;
        let indexer =
            ReportIndexer::new(store.clone(), config.index.chunk_size).with_call_timeout(call_timeout);
        let chat = ChatService::new(store, build_llm_client(&config.llm)?, &config.index)
            .with_call_timeout(call_timeout);

        Ok(Self::new(orchestrator, indexer, chat))
    }

    /// Get the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Run an analysis, index it for chat and keep the report.
    ///
    /// Returns the report and the number of chunks indexed. An indexing
    /// failure is logged and reported as zero chunks; the report is kept.
    pub async fn analyze_and_index(&self, subject_id: &str) -> Result<(AnalysisReport, usize)> {
        let report = self.orchestrator.analyze(subject_id).await?;

        let chunks = match self.indexer.index(&report.subject_id, &report).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(subject = %report.subject_id, error = %e, "Indexing failed");
                0
            }
        };

        self.reports
            .write()
            .await
            .insert(report.subject_id.clone(), report.clone());
        Ok((report, chunks))
    }
}
