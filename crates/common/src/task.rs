//! Task specifications handed to analysts.

use crate::role::{AnalystRole, Capability};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Identity of the subject under analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectMetadata {
    /// Uppercased subject identifier (e.g. a ticker)
    pub id: String,

    /// Display name, falls back to the identifier
    pub display_name: String,
}

impl SubjectMetadata {
    pub fn new(id: impl AsRef<str>) -> Self {
        let id = id.as_ref().trim().to_uppercase();
        Self {
            display_name: id.clone(),
            id,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.display_name = name;
        }
        self
    }
}

/// Handle to the qualitative source corpus for a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHandle {
    pub subject_id: String,
    pub path: PathBuf,
}

impl DocumentHandle {
    pub fn new(subject_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            subject_id: subject_id.into(),
            path: path.into(),
        }
    }
}

/// Per-run context shared read-only by every task in the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub subject: SubjectMetadata,
    pub document: Option<DocumentHandle>,
}

impl AnalysisContext {
    pub fn new(subject: SubjectMetadata, document: Option<DocumentHandle>) -> Arc<Self> {
        Arc::new(Self { subject, document })
    }
}

/// Everything a generator needs to draft one role's output.
///
/// Only `description` changes between iterations of the revision loop.
#[derive(Debug, Clone)]
pub struct AnalystTaskSpec {
    pub role: AnalystRole,
    pub goal: String,
    pub persona: String,
    pub capabilities: Vec<Capability>,
    pub description: String,
    pub expected_output: String,
    pub depends_on: Vec<AnalystRole>,
    pub context: Arc<AnalysisContext>,
}

impl AnalystTaskSpec {
    pub fn new(role: AnalystRole, context: Arc<AnalysisContext>) -> Self {
        Self {
            role,
            goal: String::new(),
            persona: String::new(),
            capabilities: Vec::new(),
            description: String::new(),
            expected_output: String::new(),
            depends_on: role.dependencies().to_vec(),
            context,
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = expected.into();
        self
    }

    pub fn subject(&self) -> &SubjectMetadata {
        &self.context.subject
    }
}
