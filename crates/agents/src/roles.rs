//! Task specs for the five analyst roles.
//!
//! Phase 1 roles depend only on the subject. The fundamental spec embeds the
//! quantitative output and the synthesis spec embeds all four outputs.

use std::collections::BTreeMap;
use std::sync::Arc;

use meridian_common::{AnalysisContext, AnalystRole, AnalystTaskSpec, Capability};

const DATA_UNAVAILABLE: &str = "Data Unavailable";

pub fn macro_task(ctx: &Arc<AnalysisContext>) -> AnalystTaskSpec {
    let name = &ctx.subject.display_name;
    let id = &ctx.subject.id;

    AnalystTaskSpec::new(AnalystRole::Macro, ctx.clone())
        .with_goal("Analyze the macro-economic cycle and news sentiment.")
        .with_persona(format!(
            "You are a macroeconomist who ties macro conditions to stock performance. \
             You only care about how macro factors affect {name} specifically and never \
             give generic industry commentary."
        ))
        .with_capabilities(vec![Capability::WebSearch])
        .with_description(format!(
            "Run a PESTLE macro analysis for **{name}** ({id}).\n\n\
             1. **Political/Legal:** antitrust suits, trade disputes, new tariffs.\n\
             2. **Economic:** how current inflation and rate sensitivity hit this sector.\n\
             3. **Social/Trends:** shifts in customer behaviour specific to the company.\n\
             4. **Technological:** AI disruption, supply-chain automation.\n\n\
             Return a bulleted list per category, then a single \"Macro Headwind Score\" \
             from 0 to 10 where 10 is severe headwinds."
        ))
        .with_expected_output("Structured PESTLE analysis and a numerical Macro Headwind Score.")
}

pub fn quant_task(ctx: &Arc<AnalysisContext>) -> AnalystTaskSpec {
    let name = &ctx.subject.display_name;
    let id = &ctx.subject.id;

    AnalystTaskSpec::new(AnalystRole::Quant, ctx.clone())
        .with_goal("Report accurate, up-to-date financial metrics.")
        .with_persona(format!(
            "You are a strict data auditor for {name}. You offer no opinions, only \
             verified data points. When a figure is missing you write '{DATA_UNAVAILABLE}' \
             rather than guessing."
        ))
        .with_capabilities(vec![
            Capability::FinancialMetrics,
            Capability::HistoricalFinancials,
        ])
        .with_description(format!(
            "Using only the financial metrics and historical statements provided for {id}:\n\n\
             - Calculate the revenue CAGR over the available period.\n\
             - State whether gross margins expanded or contracted over the last 3 years.\n\
             - State whether free cash flow is positive and growing.\n\n\
             Return a JSON summary with current ratios (P/E and others), the 3-year revenue \
             trend and the 3-year margin trend."
        ))
        .with_expected_output("JSON summary of current metrics and historical trends.")
}

pub fn technical_task(ctx: &Arc<AnalysisContext>) -> AnalystTaskSpec {
    let id = &ctx.subject.id;

    AnalystTaskSpec::new(AnalystRole::Technical, ctx.clone())
        .with_goal("Analyze price trends.")
        .with_persona("You are a chartist.")
        .with_capabilities(vec![
            Capability::TechnicalIndicators,
            Capability::PriceHistory,
        ])
        .with_description(format!(
            "Run a technical analysis on {id}.\n\n\
             1. Read the current signals (RSI, SMA, support and resistance).\n\
             2. From the monthly price history, identify the month with the biggest drop \
             and whether the stock trades near its 52-week high or low.\n\n\
             Combine current indicators with the 1-year trend context."
        ))
        .with_expected_output(
            "Technical report with support/resistance, RSI and 1-year trend analysis.",
        )
}

/// The three mutually independent roles.
pub fn phase_one_tasks(ctx: &Arc<AnalysisContext>) -> Vec<AnalystTaskSpec> {
    vec![macro_task(ctx), quant_task(ctx), technical_task(ctx)]
}

pub fn fundamental_task(ctx: &Arc<AnalysisContext>, quant_output: &str) -> AnalystTaskSpec {
    let name = &ctx.subject.display_name;
    let id = &ctx.subject.id;

    AnalystTaskSpec::new(AnalystRole::Fundamental, ctx.clone())
        .with_goal("Analyze the company's competitive moat and risks.")
        .with_persona(
            "You connect financial data with strategic risks disclosed in 10-K filings. \
             If the filing search returns nothing, say \"No 10-K data available\" and rely \
             only on the quantitative data. Never invent risk factors.",
        )
        .with_capabilities(vec![Capability::FilingSearch])
        .with_description(format!(
            "Write a strategic analysis for {name} ({id}) based on its 10-K filing.\n\n\
             **Context from the Quantitative Analyst:**\n{quant_output}\n\n\
             1. Use the filing excerpts on risk factors and competition.\n\
             2. Compare gross and profit margins from the quantitative data with the \
             qualitative risks. If margins are falling, find the reason in the text.\n\n\
             Keep it brief and link the numbers to the narrative."
        ))
        .with_expected_output("Strategic analysis linking financial ratios to text-based risks.")
}

/// Synthesis spec; the memo headers here are the ones the indexer splits on.
pub fn synthesis_task(
    ctx: &Arc<AnalysisContext>,
    outputs: &BTreeMap<AnalystRole, String>,
) -> AnalystTaskSpec {
    let name = &ctx.subject.display_name;
    let id = &ctx.subject.id;
    let output = |role: AnalystRole| {
        outputs
            .get(&role)
            .map(String::as_str)
            .unwrap_or(DATA_UNAVAILABLE)
    };

    AnalystTaskSpec::new(AnalystRole::Synthesis, ctx.clone())
        .with_goal("Synthesize a recommendation.")
        .with_persona(format!(
            "You are the CIO. You combine every analyst's input into a final Buy/Sell/Hold \
             call on {name}. You never invent data; when something is missing you say so \
             and may still recommend with that caveat."
        ))
        .with_description(format!(
            "Synthesize the manager-approved analyst reports below into a final decision \
             for {name} ({id}).\n\n\
             ---\n**MACRO & SENTIMENT ANALYSIS:**\n{macro_out}\n\n\
             ---\n**QUANTITATIVE ANALYSIS:**\n{quant_out}\n\n\
             ---\n**FUNDAMENTAL/STRATEGIC ANALYSIS:**\n{fund_out}\n\n\
             ---\n**TECHNICAL ANALYSIS:**\n{tech_out}\n\n\
             ---\n\
             If the quantitative analyst had no valid data, state \"Insufficient Data\". \
             Use only the figures above.\n\n\
             **OUTPUT FORMAT (use these exact section headers):**\n\n\
             Recommendation\n\
             - Position: [Buy/Sell/Hold]\n\
             - Conviction Score: [X] / 10\n\
             - Kill Switch Price: [price] (technical support level, or 5% below the current price)\n\
             - Rationale: [1-2 sentences]\n\n\
             Executive Summary\n[One paragraph on thesis, risks and catalysts]\n\n\
             Macro & Sentiment\n- Macro Headwind Score: [X/10]\n- [Key macro factors]\n\n\
             Quantitative Snapshot\n- [Revenue, margins, FCF, P/E, growth]\n- [3-year trends]\n\n\
             Fundamental Analysis\n- [Moat and positioning]\n- [Key 10-K risks]\n\n\
             Technical Analysis\n- Current Price, Trend, Key Levels, RSI\n\n\
             Scenario Analysis\n- Base, Bull and Bear cases with targets and probabilities\n\
             - Probability-weighted expected return\n\n\
             Actionable Takeaways\n- [Entry/exit conditions, sizing, catalysts]\n\n\
             Data Caveats\n- [Missing data or assumptions]",
            macro_out = output(AnalystRole::Macro),
            quant_out = output(AnalystRole::Quant),
            fund_out = output(AnalystRole::Fundamental),
            tech_out = output(AnalystRole::Technical),
        ))
        .with_expected_output(
            "Final investment memo with Recommendation, Conviction Score (x out of 10) and \
             Kill Switch Price, followed by an executive summary and the supporting points \
             from each analyst. If data is insufficient, state 'Insufficient Data'.",
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_common::SubjectMetadata;

    fn ctx() -> Arc<AnalysisContext> {
        AnalysisContext::new(
            SubjectMetadata::new("intc").with_display_name("Intel Corporation"),
            None,
        )
    }

    #[test]
    fn phase_one_covers_independent_roles() {
        let roles: Vec<_> = phase_one_tasks(&ctx()).iter().map(|s| s.role).collect();
        assert_eq!(
            roles,
            [AnalystRole::Macro, AnalystRole::Quant, AnalystRole::Technical]
        );
        for spec in phase_one_tasks(&ctx()) {
            assert!(spec.depends_on.is_empty());
            assert!(!spec.capabilities.is_empty());
        }
    }

    #[test]
    fn fundamental_embeds_quant_output() {
        let spec = fundamental_task(&ctx(), "Gross margin 41%, falling");
        assert!(spec.description.contains("Gross margin 41%, falling"));
        assert_eq!(spec.depends_on, vec![AnalystRole::Quant]);
        assert_eq!(spec.capabilities, vec![Capability::FilingSearch]);
    }

    #[test]
    fn synthesis_embeds_all_outputs_and_marks_missing() {
        let mut outputs = BTreeMap::new();
        outputs.insert(AnalystRole::Macro, "MACRO-OUT".to_string());
        outputs.insert(AnalystRole::Quant, "QUANT-OUT".to_string());
        outputs.insert(AnalystRole::Fundamental, "FUND-OUT".to_string());

        let spec = synthesis_task(&ctx(), &outputs);
        for needle in ["MACRO-OUT", "QUANT-OUT", "FUND-OUT", "Intel Corporation (INTC)"] {
            assert!(spec.description.contains(needle), "missing {needle}");
        }
        assert!(spec.description.contains("**TECHNICAL ANALYSIS:**\nData Unavailable"));
        assert!(spec.capabilities.is_empty());
    }

    #[test]
    fn synthesis_format_lists_every_memo_header() {
        let spec = synthesis_task(&ctx(), &BTreeMap::new());
        for header in [
            "Recommendation",
            "Executive Summary",
            "Macro & Sentiment",
            "Quantitative Snapshot",
            "Fundamental Analysis",
            "Technical Analysis",
            "Scenario Analysis",
            "Actionable Takeaways",
            "Data Caveats",
        ] {
            assert!(spec.description.contains(&format!("\n{header}\n")), "missing {header}");
        }
    }
}
