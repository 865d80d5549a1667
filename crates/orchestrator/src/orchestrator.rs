//! Three-phase scheduling of the analyst roles.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use meridian_agents::roles::{fundamental_task, phase_one_tasks, synthesis_task};
use meridian_agents::{
    Analyst, Critic, LlmAnalyst, ManagerCritic, PhaseExecutor, RevisionController,
    SnapshotSource, Toolbox, WebSearchSource, WorkerPool,
};
use meridian_common::{
    AnalysisContext, AnalysisReport, AnalystRole, Capability, DocumentHandle, Result,
    SubjectMetadata,
};
use meridian_llm::build_llm_client;
use meridian_memory::Embedder;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::config::MeridianConfig;
use crate::documents::{DirectorySource, DocumentSource, FilingSearchSource};

const SNAPSHOT_CAPABILITIES: [Capability; 4] = [
    Capability::FinancialMetrics,
    Capability::HistoricalFinancials,
    Capability::TechnicalIndicators,
    Capability::PriceHistory,
];

/// Runs a full analysis: the three independent roles concurrently, then the
/// fundamental strategist, then the CIO synthesis.
///
/// Owns the worker pool; call [`shutdown`](Self::shutdown) before dropping
/// to let in-flight tasks finish.
pub struct Orchestrator {
    pool: Arc<WorkerPool>,
    controller: Arc<RevisionController>,
    executor: PhaseExecutor,
    documents: Arc<dyn DocumentSource>,
}

impl Orchestrator {
    pub fn new(
        controller: RevisionController,
        pool: Arc<WorkerPool>,
        documents: Arc<dyn DocumentSource>,
    ) -> Self {
        let controller = Arc::new(controller);
        Self {
            executor: PhaseExecutor::new(pool.clone(), controller.clone()),
            pool,
            controller,
            documents,
        }
    }

    /// Wire the LLM analyst, manager critic and data sources from `config`.
    ///
    /// `embedder` ranks filing excerpts; the caller typically shares it with
    /// the vector store.
    pub fn from_config(config: &MeridianConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let call_timeout = config.revision.call_timeout();
        let generator = build_llm_client(&config.llm)?;
        let manager = build_llm_client(config.critic_llm())?;

        let mut toolbox = Toolbox::new(call_timeout);
        if let Some(ref dir) = config.data.snapshot_dir {
            for capability in SNAPSHOT_CAPABILITIES {
                toolbox.register(Arc::new(SnapshotSource::new(dir, capability)));
            }
        }
        match config.data.resolve_search_key() {
            Some(key) => {
                let search = WebSearchSource::new(key).with_timeout(call_timeout)?;
                toolbox.register(Arc::new(search));
            }
            None => warn!("No SERPER_API_KEY, web search disabled"),
        }
        toolbox.register(Arc::new(FilingSearchSource::new(
            embedder,
            config.documents.search_top_k,
        )));

        let analyst: Arc<dyn Analyst> = Arc::new(
            LlmAnalyst::new(generator, Arc::new(toolbox))
                .with_sampling(config.llm.temperature, config.llm.max_tokens),
        );
        let critic: Arc<dyn Critic> = Arc::new(ManagerCritic::new(manager));

        info!(
            model = %config.llm.model,
            critic_model = %config.critic_llm().model,
            workers = config.pool.workers,
            max_revisions = config.revision.max_revisions,
            "Initializing orchestrator"
        );

        Ok(Self::new(
            RevisionController::new(
                analyst,
                critic,
                config.revision.max_revisions,
                call_timeout,
            ),
            Arc::new(WorkerPool::new(config.pool.workers)),
            Arc::new(DirectorySource::new(&config.documents.dir)),
        ))
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Resolve the subject's document and run the analysis.
    ///
    /// A missing document aborts before any role runs.
    pub async fn analyze(&self, subject_id: &str) -> Result<AnalysisReport> {
        let document = self.documents.fetch(subject_id).await?;
        self.run(subject_id, SubjectMetadata::new(subject_id), Some(document))
            .await
    }

    /// Run all five roles for `subject_id`.
    ///
    /// A phase-1 role that fails is reported with an error marker and the
    /// run continues. A failure of the fundamental or synthesis role aborts
    /// the run.
    pub async fn run(
        &self,
        subject_id: &str,
        metadata: SubjectMetadata,
        document: Option<DocumentHandle>,
    ) -> Result<AnalysisReport> {
        let run_id = Uuid::new_v4().to_string();
        let subject_id = subject_id.trim().to_uppercase();
        let span = info_span!("analysis", run_id = %run_id, subject = %subject_id);

        async move {
            let start_time = Instant::now();
            let mut metadata = metadata;
            if metadata.id != subject_id {
                warn!(metadata_id = %metadata.id, "Subject metadata id differs, using run subject");
                metadata.id = subject_id.clone();
            }
            let ctx = AnalysisContext::new(metadata, document);

            info!("Phase 1: macro, quantitative and technical analysis");
            let mut results: BTreeMap<_, _> = self
                .executor
                .run_parallel(phase_one_tasks(&ctx))
                .await
                .into_iter()
                .collect();

            info!("Phase 2: fundamental analysis");
            let quant_output = results
                .get(&AnalystRole::Quant)
                .map(|r| r.output.clone())
                .unwrap_or_default();
            let fundamental = self
                .controller
                .execute(fundamental_task(&ctx, &quant_output))
                .await?;
            results.insert(AnalystRole::Fundamental, fundamental);

            info!("Phase 3: CIO synthesis");
            let outputs: BTreeMap<AnalystRole, String> = results
                .iter()
                .map(|(role, result)| (*role, result.output.clone()))
                .collect();
            let synthesis = self.controller.execute(synthesis_task(&ctx, &outputs)).await?;
            results.insert(AnalystRole::Synthesis, synthesis);

            let report = AnalysisReport::from_results(run_id, subject_id, results);
            let approved = report
                .revision_histories
                .iter()
                .filter(|h| h.final_approved())
                .count();
            info!(
                duration_ms = start_time.elapsed().as_millis() as u64,
                approved,
                "Analysis complete"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Stop accepting runs and wait for in-flight tasks.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
