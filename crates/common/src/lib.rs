//! Common types shared across the Meridian crates.
//!
//! This crate holds the domain vocabulary that the orchestrator, agents,
//! memory and API crates exchange: analyst roles, task specs, critiques,
//! revision histories, the aggregated report and chat turns.

pub mod error;
pub mod message;
pub mod report;
pub mod role;
pub mod task;

pub use error::{MeridianError, Result, with_deadline};
pub use message::{ChatTurn, TurnRole, recent_turns};
pub use report::{
    AnalysisReport, Critique, ERROR_MARKER, IterationRecord, RevisionHistory, RevisionSummary,
    TaskResult, preview,
};
pub use role::{AnalystRole, Capability};
pub use task::{AnalysisContext, AnalystTaskSpec, DocumentHandle, SubjectMetadata};
