//! Analyst roles and the capabilities they draw on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five fixed identities in the analysis pipeline.
///
/// Declaration order is the canonical reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalystRole {
    /// Macro-economic cycle and news sentiment
    Macro,
    /// Verified financial metrics and historical trends
    Quant,
    /// Price action and indicators
    Technical,
    /// Competitive moat and filing risks, built on the quant output
    Fundamental,
    /// Final memo synthesising every other role
    Synthesis,
}

impl AnalystRole {
    pub const ALL: [AnalystRole; 5] = [
        AnalystRole::Macro,
        AnalystRole::Quant,
        AnalystRole::Technical,
        AnalystRole::Fundamental,
        AnalystRole::Synthesis,
    ];

    /// Human-readable label, also used as the source label of indexed chunks.
    pub fn label(&self) -> &'static str {
        match self {
            AnalystRole::Macro => "Macro & Sentiment Analyst",
            AnalystRole::Quant => "Quantitative Analyst",
            AnalystRole::Technical => "Technical Analyst",
            AnalystRole::Fundamental => "Fundamental Strategist",
            AnalystRole::Synthesis => "Chief Investment Officer",
        }
    }

    /// Roles whose output this role consumes.
    pub fn dependencies(&self) -> &'static [AnalystRole] {
        match self {
            AnalystRole::Macro | AnalystRole::Quant | AnalystRole::Technical => &[],
            AnalystRole::Fundamental => &[AnalystRole::Quant],
            AnalystRole::Synthesis => &[
                AnalystRole::Macro,
                AnalystRole::Quant,
                AnalystRole::Technical,
                AnalystRole::Fundamental,
            ],
        }
    }

    /// Phase (1-based) in which the role runs.
    pub fn phase(&self) -> u8 {
        match self {
            AnalystRole::Macro | AnalystRole::Quant | AnalystRole::Technical => 1,
            AnalystRole::Fundamental => 2,
            AnalystRole::Synthesis => 3,
        }
    }
}

impl fmt::Display for AnalystRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tool references a role may draw on while drafting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// News and web search
    WebSearch,
    /// Current ratios and key metrics
    FinancialMetrics,
    /// Multi-year income, balance sheet and cash flow statements
    HistoricalFinancials,
    /// RSI, moving averages, support and resistance
    TechnicalIndicators,
    /// Monthly price action over the last year
    PriceHistory,
    /// Search over the subject's qualitative source document
    FilingSearch,
}

impl Capability {
    pub fn label(&self) -> &'static str {
        match self {
            Capability::WebSearch => "Search the internet",
            Capability::FinancialMetrics => "Get Financial Metrics",
            Capability::HistoricalFinancials => "Get Historical Financials",
            Capability::TechnicalIndicators => "Get Technical Indicators",
            Capability::PriceHistory => "Get Price History",
            Capability::FilingSearch => "Search 10-K Content",
        }
    }

    /// File stem used for on-disk snapshots of this capability.
    pub fn snapshot_name(&self) -> &'static str {
        match self {
            Capability::WebSearch => "web_search",
            Capability::FinancialMetrics => "financial_metrics",
            Capability::HistoricalFinancials => "historical_financials",
            Capability::TechnicalIndicators => "technical_indicators",
            Capability::PriceHistory => "price_history",
            Capability::FilingSearch => "filing_search",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
