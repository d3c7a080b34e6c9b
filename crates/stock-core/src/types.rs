use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{StockError, Table};

/// Sectors used for the top company / ETF / fund rankings.
pub const SECTORS: [&str; 11] = [
    "basic materials",
    "communication services",
    "consumer cyclical",
    "consumer defensive",
    "energy",
    "financial services",
    "healthcare",
    "industrials",
    "real estate",
    "technology",
    "utilities",
];

/// A ticker tracked in the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedTicker {
    pub symbol: String,
    pub quantity: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-supplied upsert payload. Timestamps are server-assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerInput {
    pub symbol: String,
    pub quantity: f64,
}

impl TickerInput {
    pub fn new(symbol: impl Into<String>, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
        }
    }

    /// Symbols are stored exactly as given, blank ones included.
    pub fn validate(&self) -> Result<(), StockError> {
        if !self.quantity.is_finite() {
            return Err(StockError::InvalidInput(format!(
                "quantity for {} must be a finite number",
                self.symbol
            )));
        }
        Ok(())
    }
}

/// Statement granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFrequency {
    Quarterly,
    Annual,
}

impl ReportFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFrequency::Quarterly => "quarterly",
            ReportFrequency::Annual => "annual",
        }
    }
}

/// The three statements for one frequency, each indexed by reporting period.
#[derive(Debug, Clone, Default)]
pub struct FinancialStatements {
    pub income: Table,
    pub balance_sheet: Table,
    pub cash_flow: Table,
}

/// Rankings published for one sector.
#[derive(Debug, Clone, Default)]
pub struct SectorOverview {
    pub top_companies: Table,
    /// symbol -> fund name
    pub top_etfs: crate::Record,
    /// symbol -> fund name
    pub top_mutual_funds: crate::Record,
}

/// Analyst recommendation counts for the most recent month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationBreakdown {
    pub strong_buy: i64,
    pub buy: i64,
    pub hold: i64,
    pub sell: i64,
    pub strong_sell: i64,
}

/// Raw fundamentals for one symbol, as reported upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fundamentals {
    pub symbol: String,
    pub name: Option<String>,

    // Price & multiples
    pub current_price: Option<f64>,
    #[serde(rename = "trailingPE")]
    pub trailing_pe: Option<f64>,
    #[serde(rename = "forwardPE")]
    pub forward_pe: Option<f64>,
    pub price_to_book: Option<f64>,
    pub enterprise_to_ebitda: Option<f64>,

    // Earnings & growth
    pub eps_trailing_twelve_months: Option<f64>,
    pub eps_forward: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub earnings_growth: Option<f64>,

    // Profitability
    pub return_on_equity: Option<f64>,
    pub profit_margins: Option<f64>,

    // Cash & debt
    pub free_cashflow: Option<i64>,
    pub total_debt: Option<i64>,
    pub total_cash: Option<i64>,
    pub debt_to_equity: Option<f64>,

    // Dividends
    pub dividend_rate: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub payout_ratio: Option<f64>,
    #[serde(rename = "dividendGrowth5Y")]
    pub dividend_growth_5y: Option<f64>,

    // Analyst
    pub target_mean_price: Option<f64>,
    pub recommendation_key: Option<String>,
    pub recommendation_mean: Option<f64>,
    pub average_analyst_rating: Option<String>,
    pub recommendation_breakdown: Option<RecommendationBreakdown>,
}

/// Values derived from [`Fundamentals`]; never accepted as input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationMetrics {
    pub discount_to_target: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub undervaluation_score: f64,
}

/// Fundamentals plus derived valuation, serialized as one flat object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerSummary {
    #[serde(flatten)]
    pub fundamentals: Fundamentals,
    #[serde(flatten)]
    pub valuation: ValuationMetrics,
}
