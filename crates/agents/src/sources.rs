//! Data sources analysts draw on while drafting.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use meridian_common::{AnalysisContext, Capability, MeridianError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::traits::DataSource;

/// Serves one capability from pre-fetched files under
/// `<dir>/<SUBJECT>/<snapshot_name>.json` (or `.md`).
///
/// JSON snapshots are re-emitted pretty-printed; markdown is passed through.
pub struct SnapshotSource {
    dir: PathBuf,
    capability: Capability,
}

impl SnapshotSource {
    pub fn new(dir: impl Into<PathBuf>, capability: Capability) -> Self {
        Self {
            dir: dir.into(),
            capability,
        }
    }

    fn candidates(&self, subject_id: &str) -> [PathBuf; 2] {
        let base = self.dir.join(subject_id);
        let stem = self.capability.snapshot_name();
        [
            base.join(format!("{stem}.json")),
            base.join(format!("{stem}.md")),
        ]
    }
}

#[async_trait]
impl DataSource for SnapshotSource {
    fn capability(&self) -> Capability {
        self.capability
    }

    async fn fetch(&self, context: &AnalysisContext) -> Result<String> {
        let [json_path, md_path] = self.candidates(&context.subject.id);

        if tokio::fs::try_exists(&json_path).await? {
            let raw = tokio::fs::read_to_string(&json_path).await?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            debug!(path = %json_path.display(), "Loaded JSON snapshot");
            return Ok(serde_json::to_string_pretty(&value)?);
        }
        if tokio::fs::try_exists(&md_path).await? {
            debug!(path = %md_path.display(), "Loaded markdown snapshot");
            return Ok(tokio::fs::read_to_string(&md_path).await?);
        }

        Err(MeridianError::Collaborator(format!(
            "no {} snapshot for {}",
            self.capability.snapshot_name(),
            context.subject.id
        )))
    }
}

pub const SERPER_URL: &str = "https://google.serper.dev/search";
const RESULTS_PER_QUERY: u32 = 5;

#[derive(Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: u32,
}

#[derive(Deserialize, Default)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// News search through the Serper API.
pub struct WebSearchSource {
    api_key: String,
    url: String,
    http_client: reqwest::Client,
}

impl WebSearchSource {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            url: SERPER_URL.to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MeridianError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(self)
    }

    fn query(context: &AnalysisContext) -> String {
        let subject = &context.subject;
        if subject.display_name == subject.id {
            format!("{} stock news risks outlook", subject.id)
        } else {
            format!("{} ({}) news risks outlook", subject.display_name, subject.id)
        }
    }

    fn render(query: &str, response: SearchResponse) -> String {
        if response.organic.is_empty() {
            return format!("No search results for \"{query}\".");
        }
        response
            .organic
            .iter()
            .map(|r| format!("- {}\n  {}\n  {}", r.title, r.link, r.snippet))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl DataSource for WebSearchSource {
    fn capability(&self) -> Capability {
        Capability::WebSearch
    }

    async fn fetch(&self, context: &AnalysisContext) -> Result<String> {
        let query = Self::query(context);
        debug!(query = %query, "Searching");

        let response = self
            .http_client
            .post(&self.url)
            .header("X-API-KEY", &self.api_key)
            .json(&SearchRequest {
                q: &query,
                num: RESULTS_PER_QUERY,
            })
            .send()
            .await
            .map_err(|e| MeridianError::Collaborator(format!("Search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MeridianError::Collaborator(format!(
                "Search API error ({status}): {body}"
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| MeridianError::Collaborator(format!("Failed to parse search response: {e}")))?;
        Ok(Self::render(&query, parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_common::SubjectMetadata;

    fn context(id: &str) -> std::sync::Arc<AnalysisContext> {
        AnalysisContext::new(SubjectMetadata::new(id), None)
    }

    #[tokio::test]
    async fn json_snapshot_is_pretty_printed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("INTC")).unwrap();
        std::fs::write(
            dir.path().join("INTC/financial_metrics.json"),
            r#"{"pe_ratio":31.2,"fcf":-1.5}"#,
        )
        .unwrap();

        let source = SnapshotSource::new(dir.path(), Capability::FinancialMetrics);
        let text = source.fetch(&context("INTC")).await.unwrap();
        assert!(text.contains("\"pe_ratio\": 31.2"));
        assert!(text.contains('\n'));
    }

    #[tokio::test]
    async fn markdown_snapshot_is_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("INTC")).unwrap();
        std::fs::write(dir.path().join("INTC/price_history.md"), "| Month | Close |").unwrap();

        let source = SnapshotSource::new(dir.path(), Capability::PriceHistory);
        assert_eq!(source.fetch(&context("intc")).await.unwrap(), "| Month | Close |");
    }

    #[tokio::test]
    async fn missing_snapshot_is_collaborator_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = SnapshotSource::new(dir.path(), Capability::TechnicalIndicators);
        let err = source.fetch(&context("INTC")).await.unwrap_err();
        assert!(matches!(err, MeridianError::Collaborator(m) if m.contains("technical_indicators")));
    }

    #[tokio::test]
    async fn invalid_json_snapshot_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("INTC")).unwrap();
        std::fs::write(dir.path().join("INTC/financial_metrics.json"), "{not json").unwrap();

        let source = SnapshotSource::new(dir.path(), Capability::FinancialMetrics);
        assert!(matches!(
            source.fetch(&context("INTC")).await,
            Err(MeridianError::Serialization(_))
        ));
    }

    #[test]
    fn query_uses_display_name_when_known() {
        let ctx = AnalysisContext::new(
            SubjectMetadata::new("INTC").with_display_name("Intel Corporation"),
            None,
        );
        assert_eq!(
            WebSearchSource::query(&ctx),
            "Intel Corporation (INTC) news risks outlook"
        );
        assert_eq!(
            WebSearchSource::query(&context("AAPL")),
            "AAPL stock news risks outlook"
        );
    }

    #[test]
    fn renders_organic_results() {
        let response: SearchResponse = serde_json::from_str(
            r#"{"organic":[{"title":"Intel cuts guidance","link":"https://x.test/a","snippet":"Shares fell"}]}"#,
        )
        .unwrap();
        assert_eq!(
            WebSearchSource::render("q", response),
            "- Intel cuts guidance\n  https://x.test/a\n  Shares fell"
        );
        assert_eq!(
            WebSearchSource::render("q", SearchResponse::default()),
            "No search results for \"q\"."
        );
    }

    #[tokio::test]
    async fn unreachable_search_is_collaborator_error() {
        let source = WebSearchSource::new("key").with_url("http://127.0.0.1:9/search");
        assert!(matches!(
            source.fetch(&context("INTC")).await,
            Err(MeridianError::Collaborator(_))
        ));
    }
}
