//! Error types for Meridian.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeridianError {
    /// An external collaborator (completion, critic, vector store, data
    /// source) failed or missed its deadline.
    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    #[error("No analysis indexed for {0}")]
    NotIndexed(String),

    #[error("Malformed critique: {0}")]
    MalformedCritique(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Memory error: {0}")]
    Memory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MeridianError {
    /// Build a collaborator failure for a call that exceeded its deadline.
    pub fn deadline(what: impl std::fmt::Display, after: std::time::Duration) -> Self {
        Self::Collaborator(format!("{what} timed out after {}s", after.as_secs()))
    }
}

pub type Result<T> = std::result::Result<T, MeridianError>;

/// Await `fut`, turning an elapsed `after` into a collaborator failure.
pub async fn with_deadline<T, F>(
    what: impl std::fmt::Display,
    after: std::time::Duration,
    fut: F,
) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(MeridianError::deadline(what, after)),
    }
}
