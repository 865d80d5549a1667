//! Bounded draft → critique → revise loop for a single task.

use std::sync::Arc;
use std::time::Duration;

use meridian_common::{AnalystTaskSpec, Critique, Result, RevisionHistory, TaskResult, with_deadline};
use tracing::{debug, info, instrument, warn};

use crate::traits::{Analyst, Critic};

/// Where a task stands in the revision loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionState {
    Drafting,
    Critiquing,
    /// Rejected with iterations left; carries the manager's instructions.
    NeedsRevision(String),
    Approved,
    /// Out of iterations; the last draft is returned unapproved.
    Exhausted,
}

impl RevisionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RevisionState::Approved | RevisionState::Exhausted)
    }
}

pub struct RevisionController {
    analyst: Arc<dyn Analyst>,
    critic: Arc<dyn Critic>,
    max_revisions: u32,
    call_timeout: Duration,
}

impl RevisionController {
    /// `max_revisions` below 1 is raised to 1.
    pub fn new(
        analyst: Arc<dyn Analyst>,
        critic: Arc<dyn Critic>,
        max_revisions: u32,
        call_timeout: Duration,
    ) -> Self {
        Self {
            analyst,
            critic,
            max_revisions: max_revisions.max(1),
            call_timeout,
        }
    }

    pub fn max_revisions(&self) -> u32 {
        self.max_revisions
    }

    /// Run the loop for `spec`.
    ///
    /// Returns on the first approved draft, or with the last draft once
    /// `max_revisions` iterations have been critiqued. A failed or timed-out
    /// analyst or critic call aborts the task.
    #[instrument(skip(self, spec), fields(role = %spec.role))]
    pub async fn execute(&self, mut spec: AnalystTaskSpec) -> Result<TaskResult> {
        let role = spec.role;
        let base_description = spec.description.clone();
        let mut history = RevisionHistory::new(role);
        let mut iteration = 1u32;
        let mut draft = String::new();
        let mut state = RevisionState::Drafting;

        while !state.is_terminal() {
            state = match state {
                RevisionState::Drafting => {
                    info!(iteration, "Drafting");
                    draft = with_deadline(
                        format!("{role} draft"),
                        self.call_timeout,
                        self.analyst.draft(&spec),
                    )
                    .await?;
                    RevisionState::Critiquing
                }
                RevisionState::Critiquing => {
                    let critique: Critique = with_deadline(
                        format!("{role} critique"),
                        self.call_timeout,
                        self.critic.review(role, &draft, spec.subject()),
                    )
                    .await?;
                    history.record(iteration, &draft, &critique);

                    if critique.approved {
                        RevisionState::Approved
                    } else if iteration >= self.max_revisions {
                        RevisionState::Exhausted
                    } else {
                        RevisionState::NeedsRevision(critique.revision_instructions)
                    }
                }
                RevisionState::NeedsRevision(instructions) => {
                    iteration += 1;
                    debug!(iteration, "Revision requested");
                    spec.description =
                        revision_prompt(&base_description, &instructions, &draft, iteration);
                    RevisionState::Drafting
                }
                terminal => terminal,
            };
        }

        match state {
            RevisionState::Approved => info!(iterations = iteration, "Draft approved"),
            _ => warn!(iterations = iteration, "Max revisions reached, using last draft"),
        }

        Ok(TaskResult {
            output: draft,
            history,
        })
    }
}

/// Task description for revision round `iteration`: the original
/// description, the previous draft and the manager's instructions.
pub fn revision_prompt(
    base_description: &str,
    instructions: &str,
    previous_output: &str,
    iteration: u32,
) -> String {
    format!(
        "{base}\n\n\
         ---\n\
         **REVISION {iteration} REQUIRED**\n\n\
         Your previous output was reviewed by the Research Manager. Here is your previous work:\n\n\
         --- PREVIOUS OUTPUT ---\n{previous_output}\n--- END PREVIOUS OUTPUT ---\n\n\
         **Manager's Revision Instructions:**\n{instructions}\n\n\
         IMPORTANT: Address every point in the revision instructions. Build upon your previous \
         work - do not start from scratch. Keep what was good and fix what was flagged.\n\
         ---",
        base = base_description.trim_end(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use meridian_common::{AnalysisContext, AnalystRole, MeridianError, SubjectMetadata};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns "draft N" and records each description it was given.
    struct CountingAnalyst {
        calls: AtomicUsize,
        descriptions: Mutex<Vec<String>>,
    }

    impl CountingAnalyst {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                descriptions: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Analyst for CountingAnalyst {
        async fn draft(&self, spec: &AnalystTaskSpec) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.descriptions.lock().unwrap().push(spec.description.clone());
            Ok(format!("draft {n}"))
        }
    }

    /// Plays back a fixed sequence of verdicts.
    struct ScriptedCritic {
        verdicts: Mutex<VecDeque<Critique>>,
        calls: AtomicUsize,
    }

    impl ScriptedCritic {
        fn new(verdicts: Vec<Critique>) -> Arc<Self> {
            Arc::new(Self {
                verdicts: Mutex::new(verdicts.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Critic for ScriptedCritic {
        async fn review(&self, _: AnalystRole, _: &str, _: &SubjectMetadata) -> Result<Critique> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.verdicts.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    struct FailingCritic;

    #[async_trait]
    impl Critic for FailingCritic {
        async fn review(&self, _: AnalystRole, _: &str, _: &SubjectMetadata) -> Result<Critique> {
            Err(MeridianError::Collaborator("manager offline".into()))
        }
    }

    struct SlowAnalyst;

    #[async_trait]
    impl Analyst for SlowAnalyst {
        async fn draft(&self, _: &AnalystTaskSpec) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("late".into())
        }
    }

    fn spec() -> AnalystTaskSpec {
        let ctx = AnalysisContext::new(SubjectMetadata::new("INTC"), None);
        AnalystTaskSpec::new(AnalystRole::Technical, ctx).with_description("Analyze INTC price action.")
    }

    fn controller(
        analyst: Arc<dyn Analyst>,
        critic: Arc<dyn Critic>,
        max: u32,
    ) -> RevisionController {
        RevisionController::new(analyst, critic, max, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn approval_on_first_iteration_stops() {
        let analyst = CountingAnalyst::new();
        let critic = ScriptedCritic::new(vec![Critique::approve()]);
        let result = controller(analyst.clone(), critic.clone(), 2)
            .execute(spec())
            .await
            .unwrap();

        assert_eq!(result.output, "draft 1");
        assert_eq!(result.history.total_iterations(), 1);
        assert!(result.history.final_approved());
        assert_eq!(analyst.calls.load(Ordering::SeqCst), 1);
        assert_eq!(critic.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejection_then_approval() {
        let analyst = CountingAnalyst::new();
        let critic = ScriptedCritic::new(vec![
            Critique::reject("RSI missing", "add RSI value"),
            Critique::approve(),
        ]);
        let result = controller(analyst.clone(), critic, 2)
            .execute(spec())
            .await
            .unwrap();

        assert_eq!(result.output, "draft 2");
        assert_eq!(result.history.total_iterations(), 2);
        assert!(result.history.final_approved());
        assert!(!result.history.iterations[0].approved);

        let descriptions = analyst.descriptions.lock().unwrap();
        assert_eq!(descriptions[0], "Analyze INTC price action.");
        assert!(descriptions[1].starts_with("Analyze INTC price action."));
        assert!(descriptions[1].contains("**REVISION 2 REQUIRED**"));
        assert!(descriptions[1].contains("--- PREVIOUS OUTPUT ---\ndraft 1\n"));
        assert!(descriptions[1].contains("add RSI value"));
        assert!(descriptions[1].contains("Build upon your previous work"));
    }

    #[tokio::test]
    async fn exhaustion_returns_last_draft_unapproved() {
        let analyst = CountingAnalyst::new();
        let critic = ScriptedCritic::new(vec![
            Critique::reject("thin", "more"),
            Critique::reject("still thin", "even more"),
            Critique::approve(),
        ]);
        let result = controller(analyst.clone(), critic, 2)
            .execute(spec())
            .await
            .unwrap();

        assert_eq!(result.output, "draft 2");
        assert_eq!(result.history.total_iterations(), 2);
        assert!(!result.history.final_approved());
        assert_eq!(analyst.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn revision_prompt_is_rebuilt_from_base() {
        let analyst = CountingAnalyst::new();
        let critic = ScriptedCritic::new(vec![
            Critique::reject("a", "first fix"),
            Critique::reject("b", "second fix"),
        ]);
        controller(analyst.clone(), critic, 3)
            .execute(spec())
            .await
            .unwrap();

        let descriptions = analyst.descriptions.lock().unwrap();
        assert_eq!(descriptions.len(), 3);
        assert!(descriptions[2].contains("**REVISION 3 REQUIRED**"));
        assert!(descriptions[2].contains("second fix"));
        assert!(!descriptions[2].contains("first fix"));
        assert_eq!(descriptions[2].matches("REVISION").count(), 1);
    }

    #[tokio::test]
    async fn zero_max_revisions_still_runs_once() {
        let analyst = CountingAnalyst::new();
        let critic = ScriptedCritic::new(vec![Critique::reject("x", "y")]);
        let ctl = controller(analyst.clone(), critic, 0);
        assert_eq!(ctl.max_revisions(), 1);

        let result = ctl.execute(spec()).await.unwrap();
        assert_eq!(result.history.total_iterations(), 1);
        assert_eq!(result.output, "draft 1");
    }

    #[tokio::test]
    async fn critic_failure_aborts_task() {
        let result = controller(CountingAnalyst::new(), Arc::new(FailingCritic), 2)
            .execute(spec())
            .await;
        assert!(matches!(result, Err(MeridianError::Collaborator(m)) if m.contains("manager offline")));
    }

    #[tokio::test]
    async fn slow_analyst_times_out() {
        let ctl = RevisionController::new(
            Arc::new(SlowAnalyst),
            ScriptedCritic::new(vec![]),
            2,
            Duration::from_millis(20),
        );
        let result = ctl.execute(spec()).await;
        assert!(matches!(result, Err(MeridianError::Collaborator(m)) if m.contains("timed out")));
    }

    #[test]
    fn terminal_states() {
        assert!(RevisionState::Approved.is_terminal());
        assert!(RevisionState::Exhausted.is_terminal());
        assert!(!RevisionState::NeedsRevision(String::new()).is_terminal());
        assert!(!RevisionState::Drafting.is_terminal());
    }
}
