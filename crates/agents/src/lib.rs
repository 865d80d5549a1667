//! Analyst roles and the machinery that drives them.
//!
//! - **Roles**: the five fixed analyst task specs ([`roles`])
//! - **Analyst / Critic**: drafting and manager review seams, with
//!   LLM-backed implementations ([`LlmAnalyst`], [`ManagerCritic`])
//! - **Revision loop**: bounded draft → critique → revise per task
//!   ([`RevisionController`])
//! - **Phase executor**: runs independent tasks concurrently on a shared
//!   [`WorkerPool`] and isolates their failures ([`PhaseExecutor`])
//!
//! ```text
//!   AnalystTaskSpec ──► RevisionController ──► TaskResult
//!                          │        ▲
//!                  draft   ▼        │ critique
//!                       Analyst   Critic
//!                          │
//!                       Toolbox ──► DataSource (snapshots, web search, filings)
//! ```

pub mod analyst;
pub mod critic;
pub mod pool;
pub mod revision;
pub mod roles;
pub mod sources;
pub mod traits;
pub mod workflow;

pub use analyst::LlmAnalyst;
pub use critic::{ManagerCritic, parse_critique};
pub use pool::WorkerPool;
pub use revision::{RevisionController, RevisionState, revision_prompt};
pub use sources::{SnapshotSource, WebSearchSource};
pub use traits::{Analyst, Critic, DataSource, Toolbox};
pub use workflow::PhaseExecutor;
