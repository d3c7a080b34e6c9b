use anyhow::{anyhow, Result};
use std::str::FromStr;
use std::sync::Arc;
use stock_core::PortfolioRepository;

use crate::{PortfolioDb, SqlitePortfolioRepository};

/// Storage backends a portfolio repository can be built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryKind {
    Sqlite,
}

impl FromStr for RepositoryKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(RepositoryKind::Sqlite),
            other => Err(anyhow!("Unknown repository type: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub kind: RepositoryKind,
    pub db_path: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            kind: RepositoryKind::Sqlite,
            db_path: "portfolio.db".to_string(),
        }
    }
}

/// Build the configured repository behind the capability trait.
pub async fn create_portfolio_repository(
    config: &RepositoryConfig,
) -> Result<Arc<dyn PortfolioRepository>> {
    match config.kind {
        RepositoryKind::Sqlite => {
            let db = PortfolioDb::open(&config.db_path).await?;
            Ok(Arc::new(SqlitePortfolioRepository::new(db)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stock_core::TickerInput;

    #[test]
    fn test_parse_repository_kind() {
        assert_eq!("sqlite".parse::<RepositoryKind>().unwrap(), RepositoryKind::Sqlite);
        assert_eq!(" SQLite ".parse::<RepositoryKind>().unwrap(), RepositoryKind::Sqlite);
        assert!("postgres".parse::<RepositoryKind>().is_err());
    }

    #[tokio::test]
    async fn test_factory_builds_working_repository() {
        let config = RepositoryConfig {
            kind: RepositoryKind::Sqlite,
            db_path: crate::db::MEMORY_PATH.to_string(),
        };
        let repo = create_portfolio_repository(&config).await.unwrap();

        repo.save(&[TickerInput::new("IBM", 4.0)]).await.unwrap();
        assert_eq!(repo.get_by_symbol("IBM").await.unwrap().quantity, 4.0);
    }
}
