//! Research-manager critic.

use std::sync::Arc;

use async_trait::async_trait;
use meridian_common::{AnalystRole, Critique, MeridianError, Result, SubjectMetadata};
use meridian_llm::{ChatMessage, LlmClient, LlmRequest};
use tracing::{info, warn};

use crate::traits::Critic;

const MANAGER_SYSTEM_PROMPT: &str = r#"You are a Senior Investment Research Manager at a hedge fund.
You review analyst work for quality, completeness and accuracy before it reaches the CIO.

Macro analysis: company-specific macro risks, every PESTLE category with concrete examples,
a justified Macro Headwind Score, tariff/trade, interest-rate and regulatory risk.

Quantitative analysis: P/E, margins, FCF and revenue growth present, 3+ years of history,
calculations shown (CAGR, margin change), missing data flagged as "Data Unavailable".

Fundamental analysis: 10-K risk factors cited, financial metrics linked to qualitative risks,
competitive positioning and moat identified.

Technical analysis: support/resistance levels, RSI interpretation, 1-year trend context,
52-week high/low.

CIO memo: clear Buy/Sell/Hold, Conviction Score (0-10) with justification, Kill Switch Price
with method, a 2-3 sentence executive summary, all four analyst inputs synthesized, coherent
reasoning, data gaps acknowledged, actionable for a portfolio manager.

Critique must be actionable. Say exactly what is missing:
- BAD: "The macro analysis needs more depth"
- GOOD: "Missing: tariff risk for China exposure, interest rate sensitivity of the debt load"

Respond with a single JSON object:
{"approved": true/false, "critique": "...", "revision_instructions": "..."}
"#;

/// Reviews drafts through the completion service in JSON mode.
pub struct ManagerCritic {
    llm: Arc<dyn LlmClient>,
}

impl ManagerCritic {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn review_prompt(role: AnalystRole, draft: &str, subject: &SubjectMetadata) -> String {
        format!(
            "Review this {role} output for {name} ({id}):\n\n\
             --- AGENT OUTPUT ---\n{draft}\n--- END OUTPUT ---\n\n\
             Evaluate it against the standards for {role} work. Be strict but fair and \
             approve only if it meets professional standards.\n\n\
             Return your evaluation as JSON:\n\
             {{\"approved\": true/false, \"critique\": \"...\", \"revision_instructions\": \"...\"}}",
            name = subject.display_name,
            id = subject.id,
        )
    }
}

#[async_trait]
impl Critic for ManagerCritic {
    async fn review(
        &self,
        role: AnalystRole,
        draft: &str,
        subject: &SubjectMetadata,
    ) -> Result<Critique> {
        let request = LlmRequest::new(MANAGER_SYSTEM_PROMPT)
            .with_message(ChatMessage::user(Self::review_prompt(role, draft, subject)))
            .json();

        let response = self.llm.complete(request).await?;

        match parse_critique(&response.content) {
            Ok(critique) => {
                info!(role = %role, approved = critique.approved, "Manager reviewed draft");
                Ok(critique)
            }
            Err(e) => {
                warn!(role = %role, error = %e, "Discarding malformed critique");
                Ok(Critique::default())
            }
        }
    }
}

/// Parse the first JSON object in `raw` into a [`Critique`].
///
/// Missing fields take their defaults; anything that is not a JSON object
/// with correctly typed fields is a [`MeridianError::MalformedCritique`].
pub fn parse_critique(raw: &str) -> Result<Critique> {
    let json = extract_json_object(raw)
        .ok_or_else(|| MeridianError::MalformedCritique("no JSON object in response".into()))?;
    serde_json::from_str(json).map_err(|e| MeridianError::MalformedCritique(e.to_string()))
}

/// First balanced `{...}` span in `s`, skipping braces inside strings.
fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_object() {
        let c = parse_critique(
            r#"{"approved": false, "critique": "No RSI", "revision_instructions": "add RSI value"}"#,
        )
        .unwrap();
        assert!(!c.approved);
        assert_eq!(c.revision_instructions, "add RSI value");
    }

    #[test]
    fn parses_object_wrapped_in_prose() {
        let c = parse_critique("Here you go:\n```json\n{\"approved\": true}\n```").unwrap();
        assert!(c.approved);
        assert!(c.critique.is_empty());
    }

    #[test]
    fn braces_inside_strings_do_not_end_object() {
        let c = parse_critique(r#"{"approved": false, "critique": "use {x} }", "revision_instructions": ""}"#)
            .unwrap();
        assert_eq!(c.critique, "use {x} }");
    }

    #[test]
    fn missing_fields_default() {
        assert_eq!(parse_critique("{}").unwrap(), Critique::default());
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            parse_critique("Looks good to me!"),
            Err(MeridianError::MalformedCritique(_))
        ));
    }

    #[test]
    fn wrong_types_are_malformed() {
        assert!(matches!(
            parse_critique(r#"{"approved": "yes"}"#),
            Err(MeridianError::MalformedCritique(_))
        ));
    }

    #[test]
    fn unbalanced_is_malformed() {
        assert!(parse_critique(r#"{"approved": true"#).is_err());
    }
}
