//! Retrieval-augmented chat over an indexed analysis.

use std::sync::Arc;
use std::time::Duration;

use meridian_common::{ChatTurn, MeridianError, Result, recent_turns, with_deadline};
use meridian_llm::{ChatMessage, LlmClient, LlmRequest};
use tracing::{debug, instrument, warn};

use crate::store::{VectorStore, collection_key};
use crate::types::{IndexConfig, ScoredChunk};

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Upper bound on prior turns forwarded per question, whatever the config says.
pub const MAX_CHAT_HISTORY: usize = 6;

/// Answers questions about a subject from its indexed collection.
///
/// Construct one per application and share it; collaborators are injected,
/// so tests can build as many independent instances as they need.
pub struct ChatService {
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LlmClient>,
    top_k: usize,
    max_history: usize,
    max_tokens: u32,
    call_timeout: Duration,
}

impl ChatService {
    pub fn new(store: Arc<dyn VectorStore>, llm: Arc<dyn LlmClient>, config: &IndexConfig) -> Self {
        Self {
            store,
            llm,
            top_k: config.top_k,
            max_history: config.max_history.min(MAX_CHAT_HISTORY),
            max_tokens: config.chat_max_tokens,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Whether a collection exists for the subject.
    pub async fn has_analysis(&self, subject_id: &str) -> bool {
        self.store
            .has_collection(&collection_key(subject_id))
            .await
            .unwrap_or(false)
    }

    /// Answer `question`, degrading every failure to a readable message.
    pub async fn chat(&self, subject_id: &str, question: &str, history: &[ChatTurn]) -> String {
        match self.answer(subject_id, question, history).await {
            Ok(answer) => answer,
            Err(MeridianError::NotIndexed(key)) => {
                format!("No analysis found for {key}. Please run an analysis first.")
            }
            Err(e) => {
                warn!(subject = %subject_id, error = %e, "Chat failed");
                format!("Error getting response: {e}")
            }
        }
    }

    /// Answer `question`, surfacing failures as errors.
    #[instrument(skip(self, question, history), fields(subject = %subject_id, history = history.len()))]
    pub async fn answer(
        &self,
        subject_id: &str,
        question: &str,
        history: &[ChatTurn],
    ) -> Result<String> {
        let key = collection_key(subject_id);
        if !self.has_analysis(&key).await {
            return Err(MeridianError::NotIndexed(key));
        }

        let hits = with_deadline(
            "vector store query",
            self.call_timeout,
            self.store.query(&key, question, self.top_k),
        )
        .await?;
        debug!(retrieved = hits.len(), "Retrieved context");

        let request = self.build_request(&key, question, &hits, history);
        let response = with_deadline(
            "chat completion",
            self.call_timeout,
            self.llm.complete(request),
        )
        .await?;

        Ok(response.content)
    }

    fn build_request(
        &self,
        subject_id: &str,
        question: &str,
        hits: &[ScoredChunk],
        history: &[ChatTurn],
    ) -> LlmRequest {
        let mut request = LlmRequest::new(system_prompt(subject_id, &build_context(hits)))
            .with_max_tokens(self.max_tokens);

        for turn in recent_turns(history, self.max_history) {
            request = request.with_message(ChatMessage::from(turn));
        }
        request.with_message(ChatMessage::user(question))
    }
}

/// Retrieved chunks, each tagged with the analyst it came from.
pub fn build_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| format!("[Source: {}]\n{}", hit.chunk.source_label, hit.chunk.text))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

fn system_prompt(subject_id: &str, context: &str) -> String {
    format!(
        "You are an assistant helping a user understand the equity analysis report for {subject_id}.\n\n\
         Answer from the context below. If it does not contain the answer, say so plainly.\n\n\
         Be specific, and when relevant name the analyst the information comes from \
         (Macro, Quant, Technical, Fundamental or CIO).\n\n\
         CONTEXT:\n{context}"
    )
}
