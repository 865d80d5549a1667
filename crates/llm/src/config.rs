use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use meridian_common::{MeridianError, Result};
use serde::{Deserialize, Serialize};

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::openai::OpenAiClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" or "ollama"; both speak the OpenAI chat-completions dialect
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model: String,
    /// Falls back to OPENAI_API_KEY when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_max_concurrent() -> usize {
    4
}

fn default_timeout_ms() -> u64 {
    300_000
}

const OLLAMA_URL: &str = "http://localhost:11434";

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: "gpt-4o".into(),
            api_key: None,
            api_url: None,
            temperature: None,
            max_tokens: None,
            max_concurrent_requests: default_max_concurrent(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl LlmConfig {
    /// Explicit key first, then the provider's environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }

        match self.provider.as_str() {
            "openai" => std::env::var("OPENAI_API_KEY").ok(),
            _ => None,
        }
    }
}

/// Caps the number of in-flight requests against the wrapped client.
pub struct SemaphoredClient {
    inner: Arc<dyn LlmClient>,
    semaphore: Arc<tokio::sync::Semaphore>,
}

impl SemaphoredClient {
    pub fn new(inner: Arc<dyn LlmClient>, max_concurrent: usize) -> Self {
        Self {
            inner,
            semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent.max(1))),
        }
    }
}

#[async_trait]
impl LlmClient for SemaphoredClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| MeridianError::Collaborator(format!("Semaphore acquire failed: {e}")))?;
        self.inner.complete(request).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let api_url = match config.provider.as_str() {
        "openai" => config.api_url.clone(),
        "ollama" => Some(
            config
                .api_url
                .clone()
                .unwrap_or_else(|| OLLAMA_URL.to_string()),
        ),
        other => {
            return Err(MeridianError::Config(format!(
                "Unknown LLM provider: {other}"
            )));
        }
    };

    let base = OpenAiClient::new(api_url, config.model.clone(), config.resolve_api_key())
        .with_timeout(Duration::from_millis(config.timeout_ms))?;

    let semaphored = SemaphoredClient::new(Arc::new(base), config.max_concurrent_requests);

    Ok(Arc::new(semaphored))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_CONFIG: &str = r#"
provider = "ollama"
model = "llama3"
api_url = "http://localhost:11434"
max_concurrent_requests = 6
timeout_ms = 60000
"#;

    #[test]
    fn deserialize_config_from_toml() {
        let config: LlmConfig = toml::from_str(TOML_CONFIG).unwrap();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3");
        assert_eq!(config.api_url.as_deref(), Some("http://localhost:11434"));
        assert!(config.api_key.is_none());
        assert_eq!(config.max_concurrent_requests, 6);
        assert_eq!(config.timeout_ms, 60_000);
    }

    #[test]
    fn deserialize_config_defaults() {
        let config: LlmConfig = toml::from_str(r#"model = "gpt-4o""#).unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.max_concurrent_requests, 4);
        assert_eq!(config.timeout_ms, 300_000);
    }

    #[test]
    fn explicit_key_wins() {
        let config = LlmConfig {
            api_key: Some("sk-explicit".into()),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-explicit"));
    }

    #[test]
    fn ollama_needs_no_key() {
        let config = LlmConfig {
            provider: "ollama".into(),
            api_key: Some(String::new()),
            ..Default::default()
        };
        assert!(config.resolve_api_key().is_none());
    }

    #[test]
    fn build_openai_client() {
        let config = LlmConfig {
            model: "gpt-4o-mini".into(),
            ..Default::default()
        };
        let client = build_llm_client(&config).unwrap();
        assert_eq!(client.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn build_unknown_provider_fails() {
        let config = LlmConfig {
            provider: "gemini".into(),
            ..Default::default()
        };
        assert!(matches!(
            build_llm_client(&config),
            Err(MeridianError::Config(_))
        ));
    }

    #[tokio::test]
    async fn semaphored_client_limits_concurrency() {
        use std::sync::atomic::{AtomicU32, Ordering};

        struct CountingClient {
            concurrent: Arc<AtomicU32>,
            max_seen: Arc<AtomicU32>,
        }

        #[async_trait]
        impl LlmClient for CountingClient {
            async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
                let current = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_seen.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(LlmResponse {
                    content: "ok".to_string(),
                    model: "test".to_string(),
                    usage: None,
                    finish_reason: None,
                })
            }
            fn model_name(&self) -> &str {
                "test"
            }
        }

        let concurrent = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));

        let inner = Arc::new(CountingClient {
            concurrent: concurrent.clone(),
            max_seen: max_seen.clone(),
        });

        let semaphored = Arc::new(SemaphoredClient::new(inner, 2));

        let mut handles = vec![];
        for _ in 0..6 {
            let client = semaphored.clone();
            handles.push(tokio::spawn(async move {
                client.complete(LlmRequest::default()).await.unwrap();
            }));
        }

        for h in handles {
            h.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }
}
