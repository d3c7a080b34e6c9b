use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stock_core::{PortfolioRepository, StockError, TickerInput, TrackedTicker};

use crate::db::PortfolioDb;

#[derive(sqlx::FromRow)]
struct TickerRow {
    symbol: String,
    quantity: f64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TickerRow> for TrackedTicker {
    type Error = StockError;

    fn try_from(row: TickerRow) -> Result<Self, Self::Error> {
        Ok(TrackedTicker {
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            symbol: row.symbol,
            quantity: row.quantity,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StockError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StockError::Storage(format!("Invalid timestamp '{}': {}", value, e)))
}

fn storage(err: sqlx::Error) -> StockError {
    StockError::Storage(err.to_string())
}

/// SQLite-backed portfolio of tracked tickers.
///
/// Each operation runs as one statement or one transaction, so callers on
/// other connections (or other processes sharing the file) never observe a
/// partially applied batch. Symbol uniqueness is enforced by the schema.
pub struct SqlitePortfolioRepository {
    db: PortfolioDb,
}

impl SqlitePortfolioRepository {
    pub fn new(db: PortfolioDb) -> Self {
        Self { db }
    }

    /// Get a reference to the database
    pub fn db(&self) -> &PortfolioDb {
        &self.db
    }
}

#[async_trait]
impl PortfolioRepository for SqlitePortfolioRepository {
    async fn save(&self, tickers: &[TickerInput]) -> Result<(), StockError> {
        for ticker in tickers {
            ticker.validate()?;
        }

        let mut tx = self.db.pool().begin().await.map_err(storage)?;
        for ticker in tickers {
            sqlx::query(
                r#"
                INSERT INTO tickers (symbol, quantity) VALUES (?, ?)
                ON CONFLICT(symbol) DO UPDATE SET
                    quantity = excluded.quantity,
                    updated_at = max(
                        strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                        strftime('%Y-%m-%dT%H:%M:%fZ', tickers.updated_at, '+0.001 seconds')
                    )
                "#,
            )
            .bind(&ticker.symbol)
            .bind(ticker.quantity)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }
        tx.commit().await.map_err(storage)?;

        Ok(())
    }

    /// All tracked tickers, ordered by symbol.
    async fn get_all(&self) -> Result<Vec<TrackedTicker>, StockError> {
        let rows = sqlx::query_as::<_, TickerRow>(
            "SELECT symbol, quantity, created_at, updated_at FROM tickers ORDER BY symbol",
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(storage)?;

        rows.into_iter().map(TrackedTicker::try_from).collect()
    }

    async fn get_by_symbol(&self, symbol: &str) -> Result<TrackedTicker, StockError> {
        let row = sqlx::query_as::<_, TickerRow>(
            "SELECT symbol, quantity, created_at, updated_at FROM tickers WHERE symbol = ?",
        )
        .bind(symbol)
        .fetch_optional(self.db.pool())
        .await
        .map_err(storage)?;

        match row {
            Some(row) => TrackedTicker::try_from(row),
            None => Err(StockError::NotFound(format!("Ticker {} not found", symbol))),
        }
    }

    async fn delete_by_symbol(&self, symbol: &str) -> Result<bool, StockError> {
        let result = sqlx::query("DELETE FROM tickers WHERE symbol = ?")
            .bind(symbol)
            .execute(self.db.pool())
            .await
            .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(StockError::NotFound(format!("Ticker {} not found", symbol)));
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn setup_repository(dir: &tempfile::TempDir) -> SqlitePortfolioRepository {
        let path = dir.path().join("portfolio.db");
        let db = PortfolioDb::open(&path.to_string_lossy()).await.unwrap();
        SqlitePortfolioRepository::new(db)
    }

    #[tokio::test]
    async fn test_get_all_on_fresh_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = setup_repository(&dir).await;

        assert!(repo.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let repo = setup_repository(&dir).await;

        repo.save(&[TickerInput::new("AAPL", 10.0)]).await.unwrap();

        let ticker = repo.get_by_symbol("AAPL").await.unwrap();
        assert_eq!(ticker.symbol, "AAPL");
        assert_eq!(ticker.quantity, 10.0);
        assert!(ticker.created_at <= ticker.updated_at);
    }

    #[tokio::test]
    async fn test_second_upsert_overwrites_quantity_only() {
        let dir = tempfile::tempdir().unwrap();
        let repo = setup_repository(&dir).await;

        repo.save(&[TickerInput::new("AAPL", 10.0)]).await.unwrap();
        let first = repo.get_by_symbol("AAPL").await.unwrap();

        repo.save(&[TickerInput::new("AAPL", 25.5)]).await.unwrap();
        let second = repo.get_by_symbol("AAPL").await.unwrap();

        assert_eq!(repo.get_all().await.unwrap().len(), 1);
        assert_eq!(second.quantity, 25.5);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
    }

    #[tokio::test]
    async fn test_back_to_back_upserts_advance_updated_at() {
        let dir = tempfile::tempdir().unwrap();
        let repo = setup_repository(&dir).await;

        for i in 0..50 {
            let symbol = format!("SYM{}", i);
            repo.save(&[TickerInput::new(symbol.as_str(), 1.0)]).await.unwrap();
            let first = repo.get_by_symbol(&symbol).await.unwrap();
            repo.save(&[TickerInput::new(symbol.as_str(), 2.0)]).await.unwrap();
            let second = repo.get_by_symbol(&symbol).await.unwrap();

            assert!(second.updated_at > first.updated_at, "{}", symbol);
            assert_eq!(second.created_at, first.created_at);
        }
    }

    #[tokio::test]
    async fn test_repeated_symbol_in_one_batch_advances_updated_at() {
        let dir = tempfile::tempdir().unwrap();
        let repo = setup_repository(&dir).await;

        repo.save(&[TickerInput::new("AMD", 1.0)]).await.unwrap();
        let before = repo.get_by_symbol("AMD").await.unwrap();
        repo.save(&[TickerInput::new("AMD", 2.0), TickerInput::new("AMD", 3.0)])
            .await
            .unwrap();
        let after = repo.get_by_symbol("AMD").await.unwrap();

        assert!(after.updated_at - before.updated_at >= chrono::Duration::milliseconds(2));
    }

    #[tokio::test]
    async fn test_batch_upsert_with_repeated_symbol_keeps_last() {
        let dir = tempfile::tempdir().unwrap();
        let repo = setup_repository(&dir).await;

        repo.save(&[
            TickerInput::new("MSFT", 1.0),
            TickerInput::new("GOOG", 2.0),
            TickerInput::new("MSFT", 3.0),
        ])
        .await
        .unwrap();

        let all = repo.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(repo.get_by_symbol("MSFT").await.unwrap().quantity, 3.0);
    }

    #[tokio::test]
    async fn test_get_all_ordered_by_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let repo = setup_repository(&dir).await;

        repo.save(&[
            TickerInput::new("TSLA", 1.0),
            TickerInput::new("AAPL", 2.0),
            TickerInput::new("MSFT", 3.0),
        ])
        .await
        .unwrap();

        let symbols: Vec<String> = repo
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.symbol)
            .collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT", "TSLA"]);
    }

    #[tokio::test]
    async fn test_symbols_are_case_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let repo = setup_repository(&dir).await;

        repo.save(&[TickerInput::new("aapl", 1.0), TickerInput::new("AAPL", 2.0)])
            .await
            .unwrap();

        assert_eq!(repo.get_all().await.unwrap().len(), 2);
        assert_eq!(repo.get_by_symbol("aapl").await.unwrap().quantity, 1.0);
    }

    #[tokio::test]
    async fn test_zero_and_negative_quantities_are_stored() {
        let dir = tempfile::tempdir().unwrap();
        let repo = setup_repository(&dir).await;

        repo.save(&[TickerInput::new("ZERO", 0.0), TickerInput::new("SHORT", -5.0)])
            .await
            .unwrap();

        assert_eq!(repo.get_by_symbol("ZERO").await.unwrap().quantity, 0.0);
        assert_eq!(repo.get_by_symbol("SHORT").await.unwrap().quantity, -5.0);
    }

    #[tokio::test]
    async fn test_get_missing_symbol_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = setup_repository(&dir).await;

        let err = repo.get_by_symbol("NOPE").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_missing_symbol_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let repo = setup_repository(&dir).await;
        repo.save(&[TickerInput::new("AAPL", 1.0)]).await.unwrap();
        let before = repo.get_all().await.unwrap();

        let err = repo.delete_by_symbol("NOPE").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(repo.get_all().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_delete_present_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let repo = setup_repository(&dir).await;
        repo.save(&[TickerInput::new("AAPL", 1.0)]).await.unwrap();

        assert!(repo.delete_by_symbol("AAPL").await.unwrap());
        assert!(repo.get_by_symbol("AAPL").await.unwrap_err().is_not_found());
        assert!(repo.delete_by_symbol("AAPL").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_invalid_batch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = setup_repository(&dir).await;

        let err = repo
            .save(&[TickerInput::new("AAPL", 1.0), TickerInput::new("MSFT", f64::NAN)])
            .await
            .unwrap_err();

        assert!(matches!(err, StockError::InvalidInput(_)));
        assert!(repo.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let repo = setup_repository(&dir).await;
        repo.save(&[TickerInput::new("NVDA", 7.0)]).await.unwrap();
        repo.db().close().await;
        drop(repo);

        let reopened = setup_repository(&dir).await;
        assert_eq!(reopened.get_by_symbol("NVDA").await.unwrap().quantity, 7.0);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_keep_one_row_per_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(setup_repository(&dir).await);

        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.save(&[TickerInput::new("AMZN", i as f64), TickerInput::new("META", 1.0)])
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let all = repo.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        let amzn = repo.get_by_symbol("AMZN").await.unwrap();
        assert!((0.0..8.0).contains(&amzn.quantity));
    }
}
