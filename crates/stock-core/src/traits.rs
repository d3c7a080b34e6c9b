use async_trait::async_trait;

use crate::{
    FinancialStatements, Record, ReportFrequency, SectorOverview, StockError, Table, TickerInput,
    TrackedTicker,
};

/// Durable store of tracked tickers, keyed by symbol.
#[async_trait]
pub trait PortfolioRepository: Send + Sync {
    /// Insert unseen symbols, overwrite the quantity of known ones.
    async fn save(&self, tickers: &[TickerInput]) -> Result<(), StockError>;

    async fn get_all(&self) -> Result<Vec<TrackedTicker>, StockError>;

    /// Fails with `NotFound` when no record matches exactly.
    async fn get_by_symbol(&self, symbol: &str) -> Result<TrackedTicker, StockError>;

    /// Fails with `NotFound` when no record matches exactly.
    async fn delete_by_symbol(&self, symbol: &str) -> Result<bool, StockError>;
}

/// Upstream provider of company and market data.
///
/// Implementations return raw, provider-shaped tables; reshaping into records
/// happens in the service layer.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Flat map of company fundamentals and profile fields.
    async fn ticker_info(&self, symbol: &str) -> Result<Record, StockError>;

    async fn financial_statements(
        &self,
        symbol: &str,
        frequency: ReportFrequency,
    ) -> Result<FinancialStatements, StockError>;

    /// Auto-adjusted OHLCV bars indexed by bar time.
    async fn price_history(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Table, StockError>;

    /// Dividends and stock splits indexed by date.
    async fn corporate_actions(&self, symbol: &str) -> Result<Table, StockError>;

    async fn recommendations(&self, symbol: &str) -> Result<Table, StockError>;

    async fn upgrades_downgrades(&self, symbol: &str) -> Result<Table, StockError>;

    async fn price_targets(&self, symbol: &str) -> Result<Record, StockError>;

    async fn calendar(&self, symbol: &str) -> Result<Record, StockError>;

    async fn news(&self, symbol: &str) -> Result<Vec<serde_json::Value>, StockError>;

    async fn sector_overview(&self, sector: &str) -> Result<SectorOverview, StockError>;
}
