use chrono::Datelike;
use serde_json::Value;
use std::sync::Arc;
use stock_core::{
    Cell, MarketDataSource, Record, ReportFrequency, StockError, Table, TickerSummary, SECTORS,
};
use valuation_scorer::{dividend_growth_5y, ValuationScorer};

pub mod fundamentals;

pub use fundamentals::{fundamentals_from_info, recommendation_breakdown};

pub const DEFAULT_PERIOD: &str = "5y";
pub const DEFAULT_INTERVAL: &str = "1d";

pub const VALID_PERIODS: [&str; 11] = [
    "1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max",
];
pub const VALID_INTERVALS: [&str; 13] = [
    "1m", "2m", "5m", "15m", "30m", "60m", "90m", "1h", "1d", "5d", "1wk", "1mo", "3mo",
];

/// Resolves symbols against the market-data source and reshapes its tables
/// into JSON-safe records.
pub struct StockService {
    source: Arc<dyn MarketDataSource>,
    scorer: ValuationScorer,
}

impl StockService {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            source,
            scorer: ValuationScorer::new(),
        }
    }

    /// Fetch the info map, failing when the provider knows nothing about the symbol.
    async fn resolve(&self, symbol: &str) -> Result<Record, StockError> {
        let info = match self.source.ticker_info(symbol).await {
            Ok(info) => info,
            Err(e) if e.is_not_found() => {
                return Err(StockError::NotFound("Symbol not found".to_string()))
            }
            Err(e) => return Err(e),
        };

        if info.len() <= 1 {
            return Err(StockError::NotFound("Symbol not found".to_string()));
        }
        Ok(info)
    }

    pub async fn ticker_info(&self, symbol: &str) -> Result<Record, StockError> {
        tracing::info!("Extracting ticker info for {}", symbol);
        self.resolve(symbol).await
    }

    pub async fn quarterly_financials(&self, symbol: &str) -> Result<Vec<Record>, StockError> {
        tracing::info!("Extracting quarterly financials for {}", symbol);
        self.financials(symbol, ReportFrequency::Quarterly).await
    }

    pub async fn yearly_financials(&self, symbol: &str) -> Result<Vec<Record>, StockError> {
        tracing::info!("Extracting yearly financials for {}", symbol);
        self.financials(symbol, ReportFrequency::Annual).await
    }

    async fn financials(
        &self,
        symbol: &str,
        frequency: ReportFrequency,
    ) -> Result<Vec<Record>, StockError> {
        self.resolve(symbol).await?;
        let statements = self.source.financial_statements(symbol, frequency).await?;
        let merged = record_pipeline::merge_statements(
            &statements.income,
            &statements.balance_sheet,
            &statements.cash_flow,
        );

        let label = match frequency {
            ReportFrequency::Quarterly => "quarterly",
            ReportFrequency::Annual => "yearly",
        };
        Ok(records_or_warn(&merged, &format!("{} financials", label), symbol))
    }

    pub async fn market_data(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Vec<Record>, StockError> {
        validate_period(period)?;
        validate_interval(interval)?;

        tracing::info!(
            "Extracting market data for {} (period={}, interval={})",
            symbol,
            period,
            interval
        );
        self.resolve(symbol).await?;
        let history = self.source.price_history(symbol, period, interval).await?;

        Ok(records_or_warn(&history.reset_index("Date"), "market data", symbol))
    }

    pub async fn corporate_actions(&self, symbol: &str) -> Result<Vec<Record>, StockError> {
        tracing::info!("Extracting corporate actions data for {}", symbol);
        self.resolve(symbol).await?;
        let actions = self.source.corporate_actions(symbol).await?;

        Ok(records_or_warn(&actions.reset_index("Date"), "corporate action data", symbol))
    }

    pub async fn recommendations(&self, symbol: &str) -> Result<Vec<Record>, StockError> {
        tracing::info!("Extracting recommendations data for {}", symbol);
        self.resolve(symbol).await?;
        let trend = self.source.recommendations(symbol).await?;

        Ok(records_or_warn(&trend, "recommendations", symbol))
    }

    pub async fn revisions(&self, symbol: &str) -> Result<Vec<Record>, StockError> {
        tracing::info!("Extracting revisions data for {}", symbol);
        self.resolve(symbol).await?;
        let history = self.source.upgrades_downgrades(symbol).await?;

        Ok(records_or_warn(&history.reset_index("GradeDate"), "revisions", symbol))
    }

    pub async fn price_targets(&self, symbol: &str) -> Result<Record, StockError> {
        tracing::info!("Extracting price targets data for {}", symbol);
        self.resolve(symbol).await?;
        let targets = self.source.price_targets(symbol).await?;
        if targets.is_empty() {
            tracing::warn!("No price targets found for {}", symbol);
        }
        Ok(targets)
    }

    pub async fn calendar(&self, symbol: &str) -> Result<Record, StockError> {
        tracing::info!("Extracting calendar data for {}", symbol);
        self.resolve(symbol).await?;
        let calendar = self.source.calendar(symbol).await?;
        if calendar.is_empty() {
            tracing::warn!("No calendar found for {}", symbol);
        }
        Ok(calendar)
    }

    pub async fn news(&self, symbol: &str) -> Result<Vec<Value>, StockError> {
        tracing::info!("Extracting news data for {}", symbol);
        self.resolve(symbol).await?;
        let news = self.source.news(symbol).await?;
        if news.is_empty() {
            tracing::warn!("No news found for {}", symbol);
        }
        Ok(news)
    }

    /// Top companies of every sector in one list, tagged with a `sector` column.
    pub async fn top_companies(&self) -> Result<Vec<Record>, StockError> {
        tracing::info!("Extracting top companies");
        let mut tables = Vec::new();
        for sector in SECTORS {
            match self.source.sector_overview(sector).await {
                Ok(overview) if !overview.top_companies.is_empty() => {
                    let mut companies = overview.top_companies;
                    companies.push_column("sector", Cell::from(sector));
                    tables.push(companies);
                }
                Ok(_) => tracing::debug!("No top companies for sector {}", sector),
                Err(e) => tracing::warn!("Skipping sector {}: {}", sector, e),
            }
        }

        Ok(records_or_warn(&Table::concat(tables), "top companies", "any sector"))
    }

    pub async fn top_etfs(&self) -> Result<Record, StockError> {
        tracing::info!("Extracting top ETFs");
        self.per_sector(|overview| overview.top_etfs).await
    }

    pub async fn top_funds(&self) -> Result<Record, StockError> {
        tracing::info!("Extracting top Funds");
        self.per_sector(|overview| overview.top_mutual_funds).await
    }

    async fn per_sector<F>(&self, pick: F) -> Result<Record, StockError>
    where
        F: Fn(stock_core::SectorOverview) -> Record,
    {
        let mut result = Record::new();
        for sector in SECTORS {
            match self.source.sector_overview(sector).await {
                Ok(overview) => {
                    result.insert(sector.to_string(), Value::Object(pick(overview)));
                }
                Err(e) => tracing::warn!("Skipping sector {}: {}", sector, e),
            }
        }
        Ok(result)
    }

    /// Scored fundamentals for each symbol, in request order.
    ///
    /// Symbols that fail to resolve are logged and left out.
    pub async fn listing_summary(&self, symbols: &[String]) -> Result<Vec<TickerSummary>, StockError> {
        tracing::info!("Extracting listing summary for {} symbols", symbols.len());
        let current_year = chrono::Utc::now().year();

        let mut summaries = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match self.summarize(symbol, current_year).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => tracing::warn!("Skipping {} in listing summary: {}", symbol, e),
            }
        }

        if summaries.is_empty() && !symbols.is_empty() {
            tracing::warn!("No listing summary could be built for {:?}", symbols);
        }
        Ok(summaries)
    }

    async fn summarize(&self, symbol: &str, current_year: i32) -> Result<TickerSummary, StockError> {
        let info = self.resolve(symbol).await?;
        let mut fundamentals = fundamentals_from_info(symbol, &info);

        match self.source.recommendations(symbol).await {
            Ok(trend) => fundamentals.recommendation_breakdown = recommendation_breakdown(&trend),
            Err(e) => tracing::warn!("No recommendation trend for {}: {}", symbol, e),
        }
        match self.source.corporate_actions(symbol).await {
            Ok(actions) => fundamentals.dividend_growth_5y = dividend_growth_5y(&actions, current_year),
            Err(e) => tracing::warn!("No dividend history for {}: {}", symbol, e),
        }

        Ok(self.scorer.summarize(fundamentals))
    }
}

fn records_or_warn(table: &Table, what: &str, symbol: &str) -> Vec<Record> {
    let records = record_pipeline::to_records(table);
    if records.is_empty() {
        tracing::warn!("No {} found for {}", what, symbol);
    }
    records
}

pub fn validate_period(period: &str) -> Result<(), StockError> {
    if VALID_PERIODS.contains(&period) {
        Ok(())
    } else {
        Err(StockError::InvalidInput(format!(
            "Invalid period '{}'. Valid periods: {}",
            period,
            VALID_PERIODS.join(", ")
        )))
    }
}

pub fn validate_interval(interval: &str) -> Result<(), StockError> {
    if VALID_INTERVALS.contains(&interval) {
        Ok(())
    } else {
        Err(StockError::InvalidInput(format!(
            "Invalid interval '{}'. Valid intervals: {}",
            interval,
            VALID_INTERVALS.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::HashMap;
    use stock_core::{FinancialStatements, SectorOverview};

    #[derive(Default)]
    struct FakeSource {
        infos: HashMap<String, Record>,
        statements: FinancialStatements,
        history: Table,
        actions: Table,
        trend: Table,
        sectors: HashMap<String, SectorOverview>,
    }

    #[async_trait]
    impl MarketDataSource for FakeSource {
        async fn ticker_info(&self, symbol: &str) -> Result<Record, StockError> {
            Ok(self.infos.get(symbol).cloned().unwrap_or_default())
        }

        async fn financial_statements(
            &self,
            _symbol: &str,
            _frequency: ReportFrequency,
        ) -> Result<FinancialStatements, StockError> {
            Ok(self.statements.clone())
        }

        async fn price_history(&self, _: &str, _: &str, _: &str) -> Result<Table, StockError> {
            Ok(self.history.clone())
        }

        async fn corporate_actions(&self, _: &str) -> Result<Table, StockError> {
            Ok(self.actions.clone())
        }

        async fn recommendations(&self, _: &str) -> Result<Table, StockError> {
            Ok(self.trend.clone())
        }

        async fn upgrades_downgrades(&self, _: &str) -> Result<Table, StockError> {
            Ok(Table::new(["Firm"]).with_index_name("GradeDate"))
        }

        async fn price_targets(&self, _: &str) -> Result<Record, StockError> {
            Ok(Record::new())
        }

        async fn calendar(&self, _: &str) -> Result<Record, StockError> {
            Ok(Record::new())
        }

        async fn news(&self, _: &str) -> Result<Vec<Value>, StockError> {
            Ok(vec![json!({"title": "Apple ships"})])
        }

        async fn sector_overview(&self, sector: &str) -> Result<SectorOverview, StockError> {
            self.sectors
                .get(sector)
                .cloned()
                .ok_or_else(|| StockError::Upstream(format!("no sector {}", sector)))
        }
    }

    fn apple_info() -> Record {
        json!({
            "symbol": "AAPL",
            "shortName": "Apple Inc.",
            "currentPrice": 90.0,
            "targetMeanPrice": 100.0
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn service(source: FakeSource) -> StockService {
        StockService::new(Arc::new(source))
    }

    fn day(year: i32, month: u32, d: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, d, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_not_found() {
        let mut source = FakeSource::default();
        let mut stub = Record::new();
        stub.insert("trailingPegRatio".to_string(), Value::Null);
        source.infos.insert("ZZZZ".to_string(), stub);
        let service = service(source);

        let err = service.ticker_info("ZZZZ").await.unwrap_err();
        assert_eq!(err, StockError::NotFound("Symbol not found".to_string()));
        assert!(service.news("NOPE").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_quarterly_financials_merged_with_period() {
        let mut income = Table::new(["Total Revenue"]);
        income.push_row(day(2024, 3, 31), vec![Cell::from(100.0)]);
        let mut balance = Table::new(["Total Assets"]);
        balance.push_row(day(2024, 3, 31), vec![Cell::from(500.0)]);

        let mut source = FakeSource::default();
        source.infos.insert("AAPL".to_string(), apple_info());
        source.statements = FinancialStatements {
            income,
            balance_sheet: balance,
            cash_flow: Table::default(),
        };

        let records = service(source).quarterly_financials("AAPL").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["period"], "2024-03-31T00:00:00+00:00");
        assert_eq!(records[0]["Total Revenue"], 100.0);
        assert_eq!(records[0]["Total Assets"], 500.0);
    }

    #[tokio::test]
    async fn test_empty_financials_are_not_an_error() {
        let mut source = FakeSource::default();
        source.infos.insert("AAPL".to_string(), apple_info());

        let records = service(source).yearly_financials("AAPL").await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_market_data_has_date_column() {
        let mut history = Table::new(["Close", "Volume"]).with_index_name("Date");
        history.push_row(day(2024, 1, 2), vec![Cell::from(185.2), Cell::Integer(1000)]);

        let mut source = FakeSource::default();
        source.infos.insert("AAPL".to_string(), apple_info());
        source.history = history;

        let records = service(source)
            .market_data("AAPL", DEFAULT_PERIOD, DEFAULT_INTERVAL)
            .await
            .unwrap();
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, vec!["Date", "Close", "Volume"]);
        assert_eq!(records[0]["Date"], "2024-01-02T00:00:00+00:00");
        assert_eq!(records[0]["Volume"], 1000);
    }

    #[tokio::test]
    async fn test_market_data_rejects_bad_period_and_interval() {
        let mut source = FakeSource::default();
        source.infos.insert("AAPL".to_string(), apple_info());
        let service = service(source);

        let err = service.market_data("AAPL", "7y", "1d").await.unwrap_err();
        assert!(matches!(err, StockError::InvalidInput(_)));
        let err = service.market_data("AAPL", "1y", "7m").await.unwrap_err();
        assert!(matches!(err, StockError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_revisions_keep_grade_date_column_when_empty() {
        let mut source = FakeSource::default();
        source.infos.insert("AAPL".to_string(), apple_info());

        assert!(service(source).revisions("AAPL").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_top_companies_tagged_and_empty_sectors_skipped() {
        let mut companies = Table::new(["symbol", "name"]);
        companies.push_row(Cell::Integer(0), vec![Cell::from("NVDA"), Cell::from("NVIDIA")]);
        companies.push_row(Cell::Integer(1), vec![Cell::from("AAPL"), Cell::from("Apple")]);

        let mut source = FakeSource::default();
        source.sectors.insert(
            "technology".to_string(),
            SectorOverview {
                top_companies: companies,
                ..Default::default()
            },
        );
        source.sectors.insert("energy".to_string(), SectorOverview::default());

        let records = service(source).top_companies().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["symbol"], "NVDA");
        assert_eq!(records[1]["sector"], "technology");
    }

    #[tokio::test]
    async fn test_top_etfs_keyed_by_sector() {
        let mut etfs = Record::new();
        etfs.insert("XLK".to_string(), json!("Technology Select Sector SPDR"));

        let mut source = FakeSource::default();
        source.sectors.insert(
            "technology".to_string(),
            SectorOverview {
                top_etfs: etfs,
                ..Default::default()
            },
        );

        let result = service(source).top_etfs().await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result["technology"]["XLK"], "Technology Select Sector SPDR");
    }

    #[tokio::test]
    async fn test_listing_summary_scores_and_skips_unknown() {
        let mut actions = Table::new(["Dividends", "Stock Splits"]).with_index_name("Date");
        let this_year = Utc::now().year();
        actions.push_row(day(this_year - 5, 5, 10), vec![Cell::from(1.0), Cell::from(0.0)]);
        actions.push_row(day(this_year - 1, 5, 10), vec![Cell::from(1.0), Cell::from(0.0)]);

        let mut source = FakeSource::default();
        source.infos.insert("AAPL".to_string(), apple_info());
        source.actions = actions;

        let symbols = vec!["NOPE".to_string(), "AAPL".to_string()];
        let summaries = service(source).listing_summary(&symbols).await.unwrap();

        assert_eq!(summaries.len(), 1);
        let apple = &summaries[0];
        assert_eq!(apple.fundamentals.symbol, "AAPL");
        assert_eq!(apple.fundamentals.dividend_growth_5y, Some(0.0));
        assert!((apple.valuation.discount_to_target.unwrap() - 0.1).abs() < 1e-12);
        // only the discount term is defined: 10 * 0.4
        assert_eq!(apple.valuation.undervaluation_score, 4.0);
    }

    #[test]
    fn test_validation_lists() {
        assert!(validate_period("ytd").is_ok());
        assert!(validate_period("max").is_ok());
        assert!(validate_interval("1wk").is_ok());
        assert!(validate_interval("1y").is_err());
    }
}
