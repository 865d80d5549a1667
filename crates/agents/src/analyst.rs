//! LLM-backed analyst.

use std::sync::Arc;

use async_trait::async_trait;
use meridian_common::{AnalystTaskSpec, Result};
use meridian_llm::{ChatMessage, LlmClient, LlmRequest};
use tracing::{debug, info};

use crate::traits::{Analyst, Toolbox};

/// Drafts a task by pre-fetching its tool data and asking the completion
/// service for the write-up.
pub struct LlmAnalyst {
    llm: Arc<dyn LlmClient>,
    toolbox: Arc<Toolbox>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl LlmAnalyst {
    pub fn new(llm: Arc<dyn LlmClient>, toolbox: Arc<Toolbox>) -> Self {
        Self {
            llm,
            toolbox,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_sampling(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn system_prompt(spec: &AnalystTaskSpec) -> String {
        format!(
            "You are the {role}.\n\n{persona}\n\nYour goal: {goal}",
            role = spec.role.label(),
            persona = spec.persona,
            goal = spec.goal,
        )
    }

    fn task_prompt(spec: &AnalystTaskSpec, tool_data: &str) -> String {
        let mut prompt = format!(
            "{}\n\nEXPECTED OUTPUT:\n{}",
            spec.description.trim(),
            spec.expected_output
        );
        if !tool_data.is_empty() {
            prompt.push_str("\n\nTOOL DATA:\n");
            prompt.push_str(tool_data);
        }
        prompt
    }
}

#[async_trait]
impl Analyst for LlmAnalyst {
    async fn draft(&self, spec: &AnalystTaskSpec) -> Result<String> {
        info!(role = %spec.role, subject = %spec.subject().id, "Drafting");

        let tool_data = self.toolbox.gather(spec).await;
        let mut request = LlmRequest::new(Self::system_prompt(spec))
            .with_message(ChatMessage::user(Self::task_prompt(spec, &tool_data)));
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;

        let response = self.llm.complete(request).await?;
        debug!(role = %spec.role, chars = response.content.len(), model = %response.model, "Draft received");
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_common::{AnalysisContext, AnalystRole, Capability, MeridianError, SubjectMetadata};
    use meridian_llm::LlmResponse;
    use std::sync::Mutex;

    struct EchoLlm {
        seen: Mutex<Option<LlmRequest>>,
    }

    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
            *self.seen.lock().unwrap() = Some(request);
            Ok(LlmResponse {
                content: "draft".into(),
                model: "echo".into(),
                usage: None,
                finish_reason: None,
            })
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    struct DownLlm;

    #[async_trait]
    impl LlmClient for DownLlm {
        async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
            Err(MeridianError::Collaborator("503".into()))
        }

        fn model_name(&self) -> &str {
            "down"
        }
    }

    fn spec() -> AnalystTaskSpec {
        let ctx = AnalysisContext::new(SubjectMetadata::new("INTC"), None);
        AnalystTaskSpec::new(AnalystRole::Quant, ctx)
            .with_goal("Report metrics.")
            .with_persona("You are a data auditor.")
            .with_capabilities(vec![Capability::FinancialMetrics])
            .with_description("Compute the revenue CAGR.")
            .with_expected_output("JSON summary.")
    }

    #[tokio::test]
    async fn prompt_carries_spec_and_tool_data() {
        let llm = Arc::new(EchoLlm {
            seen: Mutex::new(None),
        });
        let analyst = LlmAnalyst::new(llm.clone(), Arc::new(Toolbox::default()))
            .with_sampling(Some(0.2), Some(2048));

        assert_eq!(analyst.draft(&spec()).await.unwrap(), "draft");

        let request = llm.seen.lock().unwrap().take().unwrap();
        let system = request.system_prompt.unwrap();
        assert!(system.starts_with("You are the Quantitative Analyst."));
        assert!(system.contains("Your goal: Report metrics."));

        let user = &request.messages[0].content;
        assert!(user.starts_with("Compute the revenue CAGR."));
        assert!(user.contains("EXPECTED OUTPUT:\nJSON summary."));
        assert!(user.contains("### Get Financial Metrics\nData Unavailable"));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(2048));
        assert!(!request.json_mode);
    }

    #[tokio::test]
    async fn completion_failure_propagates() {
        let analyst = LlmAnalyst::new(Arc::new(DownLlm), Arc::new(Toolbox::default()));
        assert!(matches!(
            analyst.draft(&spec()).await,
            Err(MeridianError::Collaborator(_))
        ));
    }
}
