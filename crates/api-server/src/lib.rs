use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use index_listing::IndexListingService;
use serde::Serialize;
use std::sync::Arc;
use stock_core::{PortfolioRepository, StockError};
use stock_orchestrator::StockService;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use yahoo_client::YahooClient;

pub mod config;
pub mod index_routes;
pub mod mcp;
pub mod portfolio_routes;
pub mod stock_routes;

pub use config::ServerConfig;

/// Shared handles for both listeners.
#[derive(Clone)]
pub struct AppState {
    pub stocks: Arc<StockService>,
    pub portfolio: Arc<dyn PortfolioRepository>,
    pub indices: Arc<IndexListingService>,
}

/// Envelope every REST response is wrapped in.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    Stock(StockError),
    /// Body could not be read as the expected JSON shape.
    Rejected(StatusCode, String),
    Internal(anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Stock(StockError::NotFound(_)) | AppError::Stock(StockError::NoData(_)) => {
                StatusCode::NOT_FOUND
            }
            AppError::Stock(StockError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            AppError::Stock(StockError::Upstream(_)) => StatusCode::BAD_GATEWAY,
            AppError::Stock(StockError::Storage(_)) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Rejected(status, _) => *status,
        }
    }
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        AppError::Stock(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Stock(e) => e.to_string(),
            AppError::Rejected(_, msg) => msg.clone(),
            AppError::Internal(e) => e.to_string(),
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", message);
        } else {
            tracing::warn!("Request rejected: {}", message);
        }

        (status, Json(ApiResponse::error(message))).into_response()
    }
}

async fn health() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

/// REST API: stock extraction, index listing and portfolio routes.
pub fn rest_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(stock_routes::stock_routes())
        .merge(index_routes::index_routes())
        .merge(portfolio_routes::portfolio_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Tool-invocation endpoint.
pub fn mcp_router(state: AppState) -> Router {
    Router::new()
        .route("/mcp", axum::routing::post(mcp::handle))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json().with_current_span(false)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

/// Open the store once and wire the services both listeners share.
pub async fn build_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let portfolio = portfolio_manager::create_portfolio_repository(&config.repository).await?;
    tracing::info!(
        "Portfolio store ready ({:?} at {})",
        config.repository.kind,
        config.repository.db_path
    );

    let source = Arc::new(YahooClient::new(config.upstream_timeout));
    Ok(AppState {
        stocks: Arc::new(StockService::new(source)),
        portfolio,
        indices: Arc::new(IndexListingService::new(config.upstream_timeout)),
    })
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    let state = build_state(&config).await?;

    let api_addr = format!("{}:{}", config.host, config.api_port);
    let mcp_addr = format!("{}:{}", config.host, config.mcp_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    let mcp_listener = tokio::net::TcpListener::bind(&mcp_addr).await?;

    tracing::info!("🚀 REST API listening on {}", api_addr);
    tracing::info!("🚀 Tool server listening on {}/mcp", mcp_addr);

    let api = axum::serve(api_listener, rest_router(state.clone()));
    let tools = axum::serve(mcp_listener, mcp_router(state));

    tokio::try_join!(
        async { api.await.map_err(anyhow::Error::from) },
        async { tools.await.map_err(anyhow::Error::from) },
    )?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;
    use stock_core::{
        Cell, FinancialStatements, MarketDataSource, Record, ReportFrequency, SectorOverview,
        Table,
    };

    /// Knows only `AAPL`.
    pub struct FakeSource;

    #[async_trait]
    impl MarketDataSource for FakeSource {
        async fn ticker_info(&self, symbol: &str) -> Result<Record, StockError> {
            if symbol != "AAPL" {
                return Err(StockError::NotFound("Symbol not found".to_string()));
            }
            Ok(json!({
                "symbol": "AAPL",
                "shortName": "Apple Inc.",
                "currentPrice": 90.0,
                "targetMeanPrice": 100.0,
                "trailingPE": 30.0
            })
            .as_object()
            .cloned()
            .unwrap_or_default())
        }

        async fn financial_statements(
            &self,
            _: &str,
            _: ReportFrequency,
        ) -> Result<FinancialStatements, StockError> {
            Ok(FinancialStatements::default())
        }

        async fn price_history(&self, _: &str, _: &str, _: &str) -> Result<Table, StockError> {
            let mut table = Table::new(["Close"]).with_index_name("Date");
            table.push_row(Cell::Missing, vec![Cell::from(185.0)]);
            Ok(table)
        }

        async fn corporate_actions(&self, _: &str) -> Result<Table, StockError> {
            Ok(Table::new(["Dividends", "Stock Splits"]).with_index_name("Date"))
        }

        async fn recommendations(&self, _: &str) -> Result<Table, StockError> {
            Ok(Table::default())
        }

        async fn upgrades_downgrades(&self, _: &str) -> Result<Table, StockError> {
            Ok(Table::default())
        }

        async fn price_targets(&self, _: &str) -> Result<Record, StockError> {
            Ok(json!({"current": 90.0, "mean": 100.0}).as_object().cloned().unwrap_or_default())
        }

        async fn calendar(&self, _: &str) -> Result<Record, StockError> {
            Ok(Record::new())
        }

        async fn news(&self, _: &str) -> Result<Vec<Value>, StockError> {
            Ok(vec![json!({"title": "Apple ships"})])
        }

        async fn sector_overview(&self, _: &str) -> Result<SectorOverview, StockError> {
            Err(StockError::Upstream("sector endpoint down".to_string()))
        }
    }

    pub async fn test_state(dir: &tempfile::TempDir) -> AppState {
        let config = portfolio_manager::RepositoryConfig {
            db_path: dir.path().join("portfolio.db").to_string_lossy().to_string(),
            ..Default::default()
        };
        let portfolio = portfolio_manager::create_portfolio_repository(&config)
            .await
            .unwrap();

        AppState {
            stocks: Arc::new(StockService::new(Arc::new(FakeSource))),
            portfolio,
            indices: Arc::new(IndexListingService::new(Duration::from_secs(1))),
        }
    }

    pub async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
