//! Critiques, revision histories and the aggregated analysis report.

use crate::role::AnalystRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Characters of each draft kept in an iteration record.
pub const OUTPUT_PREVIEW_CHARS: usize = 500;

/// Prefix marking a result that stands in for a failed task.
pub const ERROR_MARKER: &str = "Error: ";

/// A manager's verdict on one draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Critique {
    #[serde(default)]
    pub approved: bool,

    #[serde(default)]
    pub critique: String,

    #[serde(default)]
    pub revision_instructions: String,
}

impl Critique {
    pub fn approve() -> Self {
        Self {
            approved: true,
            ..Default::default()
        }
    }

    pub fn reject(critique: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            approved: false,
            critique: critique.into(),
            revision_instructions: instructions.into(),
        }
    }
}

/// One pass through draft and critique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: u32,
    pub output_preview: String,
    pub approved: bool,
    pub critique: String,
    pub revision_instructions: String,
}

/// Ordered record of every iteration a single task went through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RevisionSummary", from = "RevisionSummary")]
pub struct RevisionHistory {
    pub role: AnalystRole,
    pub iterations: Vec<IterationRecord>,
}

impl RevisionHistory {
    pub fn new(role: AnalystRole) -> Self {
        Self {
            role,
            iterations: Vec::new(),
        }
    }

    /// Append the record for `iteration`.
    pub fn record(&mut self, iteration: u32, draft: &str, critique: &Critique) {
        self.iterations.push(IterationRecord {
            iteration,
            output_preview: preview(draft, OUTPUT_PREVIEW_CHARS),
            approved: critique.approved,
            critique: critique.critique.clone(),
            revision_instructions: critique.revision_instructions.clone(),
        });
    }

    pub fn total_iterations(&self) -> usize {
        self.iterations.len()
    }

    pub fn final_approved(&self) -> bool {
        self.iterations.last().is_some_and(|it| it.approved)
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    /// Human-readable digest of the revision rounds.
    pub fn summary(&self) -> String {
        if self.iterations.is_empty() {
            return format!("{}: No revisions recorded", self.role);
        }

        let mut lines = vec![format!(
            "**{}** - {} iteration(s)",
            self.role,
            self.iterations.len()
        )];
        for it in &self.iterations {
            let status = if it.approved {
                "Approved"
            } else {
                "Revision needed"
            };
            lines.push(format!("  Round {}: {}", it.iteration, status));
            if !it.approved && !it.critique.is_empty() {
                lines.push(format!("    Feedback: {}", preview(&it.critique, 100)));
            }
        }
        lines.join("\n")
    }
}

/// Serialized shape of a [`RevisionHistory`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionSummary {
    pub role: AnalystRole,
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub total_iterations: usize,
    #[serde(default)]
    pub final_approved: bool,
    pub history: Vec<IterationRecord>,
}

impl From<RevisionHistory> for RevisionSummary {
    fn from(history: RevisionHistory) -> Self {
        Self {
            role: history.role,
            agent: history.role.label().to_string(),
            total_iterations: history.total_iterations(),
            final_approved: history.final_approved(),
            history: history.iterations,
        }
    }
}

impl From<RevisionSummary> for RevisionHistory {
    fn from(summary: RevisionSummary) -> Self {
        Self {
            role: summary.role,
            iterations: summary.history,
        }
    }
}

/// Final output of one role plus how it got there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub output: String,
    pub history: RevisionHistory,
}

impl TaskResult {
    /// Placeholder for a task whose invocation failed outright.
    pub fn failed(role: AnalystRole, message: impl std::fmt::Display) -> Self {
        Self {
            output: format!("{ERROR_MARKER}{message}"),
            history: RevisionHistory::new(role),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.history.is_empty() && self.output.starts_with(ERROR_MARKER)
    }
}

/// Aggregate of one orchestration run. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: String,
    pub subject_id: String,
    pub final_report: String,
    pub details: BTreeMap<AnalystRole, String>,
    pub revision_histories: Vec<RevisionHistory>,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisReport {
    /// Assemble a report from per-role results.
    ///
    /// Every role appears in `details` and `revision_histories`, in canonical
    /// role order; a role absent from `results` is reported as failed.
    pub fn from_results(
        run_id: impl Into<String>,
        subject_id: impl Into<String>,
        mut results: BTreeMap<AnalystRole, TaskResult>,
    ) -> Self {
        let mut details = BTreeMap::new();
        let mut revision_histories = Vec::with_capacity(AnalystRole::ALL.len());

        for role in AnalystRole::ALL {
            let result = results
                .remove(&role)
                .unwrap_or_else(|| TaskResult::failed(role, "no result produced"));
            details.insert(role, result.output);
            revision_histories.push(result.history);
        }

        let final_report = details
            .get(&AnalystRole::Synthesis)
            .cloned()
            .unwrap_or_default();

        Self {
            run_id: run_id.into(),
            subject_id: subject_id.into(),
            final_report,
            details,
            revision_histories,
            generated_at: Utc::now(),
        }
    }

    pub fn history_for(&self, role: AnalystRole) -> Option<&RevisionHistory> {
        self.revision_histories.iter().find(|h| h.role == role)
    }
}

/// First `max_chars` characters of `text`, with "..." when truncated.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
