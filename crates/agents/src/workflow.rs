//! Concurrent execution of independent analyst tasks.
//!
//! Every task in a phase runs its own revision loop on the shared
//! [`WorkerPool`]. The executor waits for all of them; a task that fails,
//! times out or panics is replaced by a failed [`TaskResult`] for that role
//! only.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use meridian_common::{AnalystRole, AnalystTaskSpec, TaskResult};
use tracing::{error, info, warn};

use crate::pool::WorkerPool;
use crate::revision::RevisionController;

pub struct PhaseExecutor {
    pool: Arc<WorkerPool>,
    controller: Arc<RevisionController>,
}

impl PhaseExecutor {
    pub fn new(pool: Arc<WorkerPool>, controller: Arc<RevisionController>) -> Self {
        Self { pool, controller }
    }

    /// Run `specs` concurrently and return one result per role.
    ///
    /// Completion order is not reflected in the returned map. A second spec
    /// for a role already in the batch is skipped.
    pub async fn run_parallel(
        &self,
        specs: Vec<AnalystTaskSpec>,
    ) -> HashMap<AnalystRole, TaskResult> {
        let start_time = Instant::now();
        info!(tasks = specs.len(), workers = self.pool.size(), "Starting concurrent phase");

        let mut results = HashMap::with_capacity(specs.len());
        let mut handles = Vec::with_capacity(specs.len());
        let mut scheduled = HashSet::new();

        for spec in specs {
            let role = spec.role;
            if !scheduled.insert(role) {
                warn!(role = %role, "Duplicate role in phase, skipping");
                continue;
            }

            let controller = self.controller.clone();
            match self.pool.spawn(async move { controller.execute(spec).await }) {
                Ok(handle) => handles.push((role, handle)),
                Err(e) => {
                    error!(role = %role, error = %e, "Could not schedule task");
                    results.insert(role, TaskResult::failed(role, e));
                }
            }
        }

        // Barrier: wait for every task, not the first to finish.
        for (role, handle) in handles {
            let result = match handle.await {
                Ok(Ok(result)) => {
                    info!(role = %role, iterations = result.history.total_iterations(), "Task completed");
                    result
                }
                Ok(Err(e)) => {
                    error!(role = %role, error = %e, "Task failed");
                    TaskResult::failed(role, e)
                }
                Err(e) => {
                    error!(role = %role, error = %e, "Task join error");
                    TaskResult::failed(role, format!("task aborted: {e}"))
                }
            };
            results.insert(role, result);
        }

        info!(
            tasks = results.len(),
            failed = results.values().filter(|r| r.is_failure()).count(),
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Concurrent phase completed"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{Analyst, Critic};
    use async_trait::async_trait;
    use meridian_common::{
        AnalysisContext, Critique, MeridianError, Result, SubjectMetadata,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fails for one role, panics for another, succeeds otherwise.
    struct MockAnalyst {
        fail_role: Option<AnalystRole>,
        panic_role: Option<AnalystRole>,
        call_count: AtomicUsize,
    }

    impl MockAnalyst {
        fn new() -> Self {
            Self {
                fail_role: None,
                panic_role: None,
                call_count: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Analyst for MockAnalyst {
        async fn draft(&self, spec: &AnalystTaskSpec) -> Result<String> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if Some(spec.role) == self.panic_role {
                panic!("analyst crashed");
            }
            if Some(spec.role) == self.fail_role {
                return Err(MeridianError::Collaborator("search quota exceeded".into()));
            }
            Ok(format!("{} output", spec.role))
        }
    }

    struct ApproveAll;

    #[async_trait]
    impl Critic for ApproveAll {
        async fn review(&self, _: AnalystRole, _: &str, _: &SubjectMetadata) -> Result<Critique> {
            Ok(Critique::approve())
        }
    }

    fn specs() -> Vec<AnalystTaskSpec> {
        let ctx = AnalysisContext::new(SubjectMetadata::new("INTC"), None);
        [AnalystRole::Macro, AnalystRole::Quant, AnalystRole::Technical]
            .into_iter()
            .map(|role| AnalystTaskSpec::new(role, ctx.clone()))
            .collect()
    }

    fn executor(analyst: Arc<MockAnalyst>) -> PhaseExecutor {
        let controller = RevisionController::new(
            analyst,
            Arc::new(ApproveAll),
            2,
            Duration::from_secs(5),
        );
        PhaseExecutor::new(Arc::new(WorkerPool::new(3)), Arc::new(controller))
    }

    #[tokio::test]
    async fn all_tasks_complete() {
        let analyst = Arc::new(MockAnalyst::new());
        let results = executor(analyst.clone()).run_parallel(specs()).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[&AnalystRole::Quant].output, "Quantitative Analyst output");
        assert!(results.values().all(|r| r.history.final_approved()));
        assert_eq!(analyst.call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn one_failure_is_isolated() {
        let analyst = Arc::new(MockAnalyst {
            fail_role: Some(AnalystRole::Macro),
            ..MockAnalyst::new()
        });
        let results = executor(analyst).run_parallel(specs()).await;

        assert_eq!(results.len(), 3);
        let macro_result = &results[&AnalystRole::Macro];
        assert!(macro_result.is_failure());
        assert!(macro_result.output.starts_with("Error: "));
        assert!(macro_result.output.contains("search quota exceeded"));
        assert!(!results[&AnalystRole::Quant].is_failure());
        assert!(!results[&AnalystRole::Technical].is_failure());
    }

    #[tokio::test]
    async fn panic_is_isolated() {
        let analyst = Arc::new(MockAnalyst {
            panic_role: Some(AnalystRole::Technical),
            ..MockAnalyst::new()
        });
        let results = executor(analyst).run_parallel(specs()).await;

        assert!(results[&AnalystRole::Technical].is_failure());
        assert!(!results[&AnalystRole::Macro].is_failure());
    }

    #[tokio::test]
    async fn duplicate_roles_run_once() {
        let analyst = Arc::new(MockAnalyst::new());
        let mut batch = specs();
        batch.push(batch[0].clone());

        let results = executor(analyst.clone()).run_parallel(batch).await;
        assert_eq!(results.len(), 3);
        assert_eq!(analyst.call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn closed_pool_fails_every_task() {
        let analyst = Arc::new(MockAnalyst::new());
        let exec = executor(analyst.clone());
        exec.pool.shutdown().await;

        let results = exec.run_parallel(specs()).await;
        assert_eq!(results.len(), 3);
        assert!(results.values().all(TaskResult::is_failure));
        assert_eq!(analyst.call_count.load(Ordering::SeqCst), 0);
    }
}
