//! Phase scheduling for Meridian analyses.
//!
//! The orchestrator turns a subject into a finished
//! [`AnalysisReport`](meridian_common::AnalysisReport) in three phases:
//!
//! ```text
//!   Phase 1 (concurrent)        Phase 2               Phase 3
//! ┌──────────────────────┐
//! │ Macro & Sentiment    │
//! │ Quantitative ────────┼──► Fundamental ──┐
//! │ Technical            │                  ├──► CIO Synthesis ──► AnalysisReport
//! └──────────┬───────────┘                  │
//!            └──────────────────────────────┘
//! ```
//!
//! Each role runs its own revision loop against the research manager.

pub mod config;
pub mod documents;
pub mod orchestrator;

pub use config::{DataConfig, DocumentsConfig, MeridianConfig, PoolConfig, RevisionConfig};
pub use documents::{DirectorySource, DocumentSource, FilingSearchSource};
pub use orchestrator::Orchestrator;
