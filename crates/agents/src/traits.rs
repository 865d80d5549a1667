//! Collaborator seams for drafting, review and data retrieval.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use meridian_common::{
    AnalysisContext, AnalystRole, AnalystTaskSpec, Capability, Critique, Result, SubjectMetadata,
    with_deadline,
};
use tracing::{debug, warn};

/// Produces a draft for a task spec.
#[async_trait]
pub trait Analyst: Send + Sync {
    async fn draft(&self, spec: &AnalystTaskSpec) -> Result<String>;
}

/// Reviews a draft on behalf of the research manager.
///
/// Malformed reviewer output is not an error: implementations return an
/// unapproved, empty [`Critique`]. Errors mean the reviewer could not be
/// reached at all.
#[async_trait]
pub trait Critic: Send + Sync {
    async fn review(
        &self,
        role: AnalystRole,
        draft: &str,
        subject: &SubjectMetadata,
    ) -> Result<Critique>;
}

/// Read-only snapshot provider behind one capability.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn capability(&self) -> Capability;

    async fn fetch(&self, context: &AnalysisContext) -> Result<String>;
}

/// Registered data sources, keyed by the capability they serve.
pub struct Toolbox {
    sources: HashMap<Capability, Arc<dyn DataSource>>,
    call_timeout: Duration,
}

impl Default for Toolbox {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl Toolbox {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            sources: HashMap::new(),
            call_timeout,
        }
    }

    /// Register `source`, replacing any earlier source for its capability.
    pub fn register(&mut self, source: Arc<dyn DataSource>) -> &mut Self {
        self.sources.insert(source.capability(), source);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.register(source);
        self
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.sources.contains_key(&capability)
    }

    /// Fetch every capability `spec` declares and render them as one block.
    ///
    /// A missing or failing source becomes a "Data Unavailable" entry so the
    /// analyst can say so instead of guessing.
    pub async fn gather(&self, spec: &AnalystTaskSpec) -> String {
        let mut sections = Vec::with_capacity(spec.capabilities.len());

        for capability in &spec.capabilities {
            let body = match self.sources.get(capability) {
                Some(source) => {
                    let fetched = with_deadline(
                        capability.label(),
                        self.call_timeout,
                        source.fetch(&spec.context),
                    )
                    .await;
                    match fetched {
                        Ok(text) => {
                            debug!(role = %spec.role, capability = %capability, bytes = text.len(), "Fetched tool data");
                            text
                        }
                        Err(e) => {
                            warn!(role = %spec.role, capability = %capability, error = %e, "Data source failed");
                            format!("Data Unavailable ({e})")
                        }
                    }
                }
                None => "Data Unavailable (no source configured)".to_string(),
            };
            sections.push(format!("### {}\n{}", capability.label(), body));
        }

        sections.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_common::MeridianError;

    struct FixedSource(Capability, &'static str);

    #[async_trait]
    impl DataSource for FixedSource {
        fn capability(&self) -> Capability {
            self.0
        }

        async fn fetch(&self, context: &AnalysisContext) -> Result<String> {
            Ok(format!("{} for {}", self.1, context.subject.id))
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl DataSource for BrokenSource {
        fn capability(&self) -> Capability {
            Capability::PriceHistory
        }

        async fn fetch(&self, _context: &AnalysisContext) -> Result<String> {
            Err(MeridianError::Collaborator("quote service down".into()))
        }
    }

    fn spec(capabilities: Vec<Capability>) -> AnalystTaskSpec {
        let ctx = AnalysisContext::new(SubjectMetadata::new("intc"), None);
        AnalystTaskSpec::new(AnalystRole::Technical, ctx).with_capabilities(capabilities)
    }

    #[tokio::test]
    async fn gathers_each_declared_capability() {
        let toolbox = Toolbox::default()
            .with_source(Arc::new(FixedSource(Capability::TechnicalIndicators, "RSI 41")))
            .with_source(Arc::new(FixedSource(Capability::WebSearch, "unused")));

        let block = toolbox
            .gather(&spec(vec![Capability::TechnicalIndicators]))
            .await;
        assert_eq!(block, "### Get Technical Indicators\nRSI 41 for INTC");
    }

    #[tokio::test]
    async fn failing_and_missing_sources_degrade() {
        let toolbox = Toolbox::default().with_source(Arc::new(BrokenSource));

        let block = toolbox
            .gather(&spec(vec![
                Capability::PriceHistory,
                Capability::TechnicalIndicators,
            ]))
            .await;
        assert!(block.contains("### Get Price History\nData Unavailable"));
        assert!(block.contains("quote service down"));
        assert!(block.contains("### Get Technical Indicators\nData Unavailable (no source configured)"));
    }

    #[tokio::test]
    async fn no_capabilities_gives_empty_block() {
        assert!(Toolbox::default().gather(&spec(vec![])).await.is_empty());
    }
}
