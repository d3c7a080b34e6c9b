use stock_core::{Fundamentals, TickerSummary, ValuationMetrics};

pub mod dividends;

pub use dividends::dividend_growth_5y;

const DISCOUNT_WEIGHT: f64 = 0.4;
const PEG_WEIGHT: f64 = 0.3;
const PE_WEIGHT: f64 = 0.2;
const DIVIDEND_WEIGHT: f64 = 0.1;

/// Benchmark P/E a stock is compared against.
const BENCHMARK_PE: f64 = 15.0;

/// Derives valuation metrics from raw fundamentals.
///
/// Runs as a separate pass after all raw fields are populated, so no derived
/// value depends on field declaration order.
pub struct ValuationScorer;

impl ValuationScorer {
    pub fn new() -> Self {
        Self
    }

    /// `(target - price) / target`; undefined when either is absent or the target is zero.
    pub fn calculate_discount_to_target(
        &self,
        current_price: Option<f64>,
        target_mean_price: Option<f64>,
    ) -> Option<f64> {
        let price = finite(current_price)?;
        let target = finite(target_mean_price)?;
        if target == 0.0 {
            return None;
        }
        Some((target - price) / target)
    }

    /// `forward P/E / earnings growth`; undefined when either is absent or growth is zero.
    pub fn calculate_peg_ratio(
        &self,
        forward_pe: Option<f64>,
        earnings_growth: Option<f64>,
    ) -> Option<f64> {
        let pe = finite(forward_pe)?;
        let growth = finite(earnings_growth)?;
        if growth == 0.0 {
            return None;
        }
        Some(pe / growth)
    }

    /// Weighted sum of the defined terms, each clamped to [0, 100] before
    /// weighting, rounded to two decimals.
    ///
    /// Terms whose input is undefined are left out rather than counted as zero,
    /// so a summary with missing inputs tops out below 100.
    pub fn calculate_undervaluation_score(
        &self,
        discount_to_target: Option<f64>,
        peg_ratio: Option<f64>,
        trailing_pe: Option<f64>,
        dividend_yield: Option<f64>,
    ) -> f64 {
        let mut score = 0.0;

        if let Some(discount) = finite(discount_to_target) {
            score += clamp_pct(discount * 100.0) * DISCOUNT_WEIGHT;
        }
        if let Some(peg) = finite(peg_ratio).filter(|p| *p > 0.0) {
            score += clamp_pct((1.0 / peg) * 100.0) * PEG_WEIGHT;
        }
        if let Some(pe) = finite(trailing_pe).filter(|p| *p > 0.0) {
            score += clamp_pct((BENCHMARK_PE / pe) * 100.0) * PE_WEIGHT;
        }
        if let Some(dy) = finite(dividend_yield) {
            score += clamp_pct(dy * 100.0) * DIVIDEND_WEIGHT;
        }

        round2(score)
    }

    pub fn evaluate(&self, fundamentals: &Fundamentals) -> ValuationMetrics {
        let discount_to_target = self.calculate_discount_to_target(
            fundamentals.current_price,
            fundamentals.target_mean_price,
        );
        let peg_ratio =
            self.calculate_peg_ratio(fundamentals.forward_pe, fundamentals.earnings_growth);
        let undervaluation_score = self.calculate_undervaluation_score(
            discount_to_target,
            peg_ratio,
            fundamentals.trailing_pe,
            fundamentals.dividend_yield,
        );

        ValuationMetrics {
            discount_to_target,
            peg_ratio,
            undervaluation_score,
        }
    }

    pub fn summarize(&self, fundamentals: Fundamentals) -> TickerSummary {
        let valuation = self.evaluate(&fundamentals);
        TickerSummary {
            fundamentals,
            valuation,
        }
    }
}

impl Default for ValuationScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn clamp_pct(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
