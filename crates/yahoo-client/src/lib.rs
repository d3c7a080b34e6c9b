pub mod models;
pub mod parse;
pub mod statements;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, StatusCode, Url};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use stock_core::{
    FinancialStatements, MarketDataSource, Record, ReportFrequency, SectorOverview, StockError,
    Table,
};
use tokio::sync::RwLock;

use crate::models::ChartResponse;
use crate::statements::{timeseries_types, BALANCE_SHEET_KEYS, CASH_FLOW_KEYS, INCOME_KEYS};

const QUERY1: &str = "https://query1.finance.yahoo.com";
const QUERY2: &str = "https://query2.finance.yahoo.com";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const INFO_MODULES: &str = "financialData,quoteType,defaultKeyStatistics,assetProfile,summaryDetail,price";
/// Earliest period the timeseries endpoint is asked for (mid 1985).
const TIMESERIES_START: i64 = 493_590_046;
const MAX_ATTEMPTS: u32 = 3;
const RATE_LIMIT_WAIT_SECS: u64 = 5;

#[derive(Clone, Debug)]
struct Crumb {
    cookie: String,
    value: String,
}

/// Client for Yahoo Finance's unofficial JSON endpoints.
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    crumb: Arc<RwLock<Option<Crumb>>>,
}

impl YahooClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            crumb: Arc::new(RwLock::new(None)),
        }
    }

    async fn ensure_crumb(&self) -> Result<Crumb, StockError> {
        if let Some(crumb) = self.crumb.read().await.as_ref() {
            return Ok(crumb.clone());
        }

        let response = self
            .client
            .get(COOKIE_URL)
            .send()
            .await
            .map_err(|e| StockError::Upstream(format!("Failed to get cookie: {}", e)))?;

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split_once(';').map(|(v, _)| v.to_string()))
            .ok_or_else(|| StockError::Upstream("Failed to parse Yahoo cookie".to_string()))?;

        let value = self
            .client
            .get(format!("{}/v1/test/getcrumb", QUERY1))
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .map_err(|e| StockError::Upstream(format!("Failed to get crumb: {}", e)))?
            .text()
            .await
            .map_err(|e| StockError::Upstream(format!("Failed to read crumb: {}", e)))?;

        let crumb = Crumb { cookie, value };
        *self.crumb.write().await = Some(crumb.clone());
        tracing::debug!("Obtained new Yahoo crumb");

        Ok(crumb)
    }

    async fn clear_crumb(&self) {
        *self.crumb.write().await = None;
    }

    /// GET a JSON body, refreshing the crumb on auth failures and backing
    /// off on 429.
    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, StockError> {
        for attempt in 0..MAX_ATTEMPTS {
            let crumb = self.ensure_crumb().await?;
            let response = self
                .client
                .get(url)
                .query(params)
                .query(&[("crumb", &crumb.value)])
                .header(header::COOKIE, &crumb.cookie)
                .send()
                .await
                .map_err(|e| StockError::Upstream(e.to_string()))?;

            match response.status() {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    tracing::warn!("Yahoo rejected crumb, refreshing (attempt {}/{})", attempt + 1, MAX_ATTEMPTS);
                    self.clear_crumb().await;
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    tracing::warn!(
                        "Yahoo 429 rate limited, waiting {}s before retry {}/{}",
                        RATE_LIMIT_WAIT_SECS,
                        attempt + 1,
                        MAX_ATTEMPTS
                    );
                    tokio::time::sleep(Duration::from_secs(RATE_LIMIT_WAIT_SECS)).await;
                }
                StatusCode::NOT_FOUND => {
                    return Err(StockError::NotFound("Symbol not found".to_string()));
                }
                status if !status.is_success() => {
                    return Err(StockError::Upstream(format!("Yahoo returned {} for {}", status, url)));
                }
                _ => {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| StockError::Upstream(format!("Invalid Yahoo response: {}", e)));
                }
            }
        }

        Err(StockError::Upstream(format!("Yahoo request failed after {} attempts", MAX_ATTEMPTS)))
    }

    /// First quoteSummary result for `symbol` with the given modules.
    async fn quote_summary(&self, symbol: &str, modules: &str) -> Result<Map<String, Value>, StockError> {
        let url = endpoint(QUERY1, &["v10", "finance", "quoteSummary", symbol])?;
        let body = self.get_json(url.as_str(), &[("modules", modules.to_string())]).await?;

        body.pointer("/quoteSummary/result/0")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| StockError::NotFound("Symbol not found".to_string()))
    }

    async fn quote(&self, symbol: &str) -> Result<Map<String, Value>, StockError> {
        let url = format!("{}/v7/finance/quote", QUERY1);
        let body = self.get_json(&url, &[("symbols", symbol.to_string())]).await?;

        Ok(body
            .pointer("/quoteResponse/result/0")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default())
    }

    async fn chart(
        &self,
        symbol: &str,
        range: &str,
        interval: &str,
    ) -> Result<Option<models::ChartResult>, StockError> {
        let url = endpoint(QUERY2, &["v8", "finance", "chart", symbol])?;
        let params = [
            ("range", range.to_string()),
            ("interval", interval.to_string()),
            ("events", "div,splits".to_string()),
            ("includeAdjustedClose", "true".to_string()),
        ];
        let body = self.get_json(url.as_str(), &params).await?;
        let response: ChartResponse = serde_json::from_value(body)
            .map_err(|e| StockError::Upstream(format!("Invalid chart response: {}", e)))?;

        if let Some(error) = response.chart.error {
            let description = error.description.unwrap_or_else(|| "unknown chart error".to_string());
            return Err(StockError::Upstream(description));
        }

        Ok(response.chart.result.and_then(|mut r| (!r.is_empty()).then(|| r.remove(0))))
    }

    async fn statement(
        &self,
        symbol: &str,
        frequency: ReportFrequency,
        keys: &[&str],
    ) -> Result<Table, StockError> {
        let url = endpoint(
            QUERY2,
            &["ws", "fundamentals-timeseries", "v1", "finance", "timeseries", symbol],
        )?;
        let params = [
            ("symbol", symbol.to_string()),
            ("type", timeseries_types(frequency.as_str(), keys)),
            ("period1", TIMESERIES_START.to_string()),
            ("period2", Utc::now().timestamp().to_string()),
        ];
        let body = self.get_json(url.as_str(), &params).await?;

        Ok(parse::parse_timeseries(&body, frequency, keys))
    }
}

/// `base` with each segment appended percent-encoded. A `/`, `?` or `#` in a
/// symbol stays inside its segment.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, StockError> {
    let mut url = Url::parse(base)
        .map_err(|e| StockError::Upstream(format!("Invalid Yahoo URL {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| StockError::Upstream(format!("Yahoo URL {} cannot take a path", base)))?
        .extend(segments);
    Ok(url)
}

/// `"consumer cyclical"` -> `"consumer-cyclical"`, the sector endpoint's key.
pub fn sector_key(sector: &str) -> String {
    sector.trim().to_lowercase().replace(' ', "-")
}

#[async_trait]
impl MarketDataSource for YahooClient {
    async fn ticker_info(&self, symbol: &str) -> Result<Record, StockError> {
        let summary = self.quote_summary(symbol, INFO_MODULES).await?;
        let mut info = parse::flatten_quote_summary(&summary);

        // EPS and analyst rating only come from the v7 quote
        match self.quote(symbol).await {
            Ok(quote) => parse::merge_quote_fields(&mut info, &quote),
            Err(e) => tracing::warn!("Quote lookup failed for {}: {}", symbol, e),
        }

        Ok(info)
    }

    async fn financial_statements(
        &self,
        symbol: &str,
        frequency: ReportFrequency,
    ) -> Result<FinancialStatements, StockError> {
        let (income, balance_sheet, cash_flow) = tokio::try_join!(
            self.statement(symbol, frequency, INCOME_KEYS),
            self.statement(symbol, frequency, BALANCE_SHEET_KEYS),
            self.statement(symbol, frequency, CASH_FLOW_KEYS),
        )?;

        Ok(FinancialStatements {
            income,
            balance_sheet,
            cash_flow,
        })
    }

    async fn price_history(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Table, StockError> {
        Ok(self
            .chart(symbol, period, interval)
            .await?
            .map(|result| parse::parse_history(&result, interval))
            .unwrap_or_default())
    }

    async fn corporate_actions(&self, symbol: &str) -> Result<Table, StockError> {
        Ok(self
            .chart(symbol, "max", "1d")
            .await?
            .map(|result| parse::parse_actions(&result))
            .unwrap_or_default())
    }

    async fn recommendations(&self, symbol: &str) -> Result<Table, StockError> {
        let summary = self.quote_summary(symbol, "recommendationTrend").await?;
        Ok(parse::parse_recommendation_trend(summary.get("recommendationTrend")))
    }

    async fn upgrades_downgrades(&self, symbol: &str) -> Result<Table, StockError> {
        let summary = self.quote_summary(symbol, "upgradeDowngradeHistory").await?;
        Ok(parse::parse_upgrades_downgrades(summary.get("upgradeDowngradeHistory")))
    }

    async fn price_targets(&self, symbol: &str) -> Result<Record, StockError> {
        let summary = self.quote_summary(symbol, "financialData").await?;
        Ok(parse::parse_price_targets(summary.get("financialData")))
    }

    async fn calendar(&self, symbol: &str) -> Result<Record, StockError> {
        let summary = self.quote_summary(symbol, "calendarEvents").await?;
        Ok(parse::parse_calendar(summary.get("calendarEvents")))
    }

    async fn news(&self, symbol: &str) -> Result<Vec<Value>, StockError> {
        let url = format!("{}/v1/finance/search", QUERY2);
        let params = [
            ("q", symbol.to_string()),
            ("newsCount", "10".to_string()),
            ("quotesCount", "0".to_string()),
        ];
        let body = self.get_json(&url, &params).await?;

        Ok(body
            .get("news")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    async fn sector_overview(&self, sector: &str) -> Result<SectorOverview, StockError> {
        let key = sector_key(sector);
        let url = endpoint(QUERY1, &["v1", "finance", "sectors", key.as_str()])?;
        let body = self.get_json(url.as_str(), &[]).await?;
        Ok(parse::parse_sector(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sector_key() {
        assert_eq!(sector_key("consumer cyclical"), "consumer-cyclical");
        assert_eq!(sector_key("Technology"), "technology");
    }

    #[test]
    fn test_endpoint_encodes_symbol_segment() {
        let url = endpoint(QUERY1, &["v10", "finance", "quoteSummary", "BRK/B?x#y"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://query1.finance.yahoo.com/v10/finance/quoteSummary/BRK%2FB%3Fx%23y"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let url = endpoint(QUERY2, &["v8", "finance", "chart", "BRK-B"]).unwrap();
        assert_eq!(url.as_str(), "https://query2.finance.yahoo.com/v8/finance/chart/BRK-B");
    }

    #[tokio::test]
    async fn test_clear_crumb_resets_cache() {
        let client = YahooClient::new(Duration::from_secs(1));
        *client.crumb.write().await = Some(Crumb {
            cookie: "A1=x".to_string(),
            value: "abc".to_string(),
        });

        // cached crumb is served without a network round trip
        assert_eq!(client.ensure_crumb().await.unwrap().value, "abc");
        client.clear_crumb().await;
        assert!(client.crumb.read().await.is_none());
    }
}
