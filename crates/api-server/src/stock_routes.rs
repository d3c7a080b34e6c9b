use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use stock_core::{Record, TickerSummary};
use stock_orchestrator::{DEFAULT_INTERVAL, DEFAULT_PERIOD};

use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct MarketQuery {
    pub period: Option<String>,
    pub interval: Option<String>,
}

pub fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/stock/info/:symbol", get(get_ticker_info))
        .route("/stock/quarterly-financials/:symbol", get(get_quarterly_financials))
        .route("/stock/yearly-financials/:symbol", get(get_yearly_financials))
        .route("/stock/market/:symbol", get(get_market_data))
        .route("/stock/corporate-actions/:symbol", get(get_corporate_actions))
        .route("/stock/recommendations/:symbol", get(get_recommendations))
        .route("/stock/revisions/:symbol", get(get_revisions))
        .route("/stock/price-targets/:symbol", get(get_price_targets))
        .route("/stock/calendar/:symbol", get(get_calendar))
        .route("/stock/news/:symbol", get(get_news))
        .route("/stock/top-companies", get(get_top_companies))
        .route("/stock/top-etfs", get(get_top_etfs))
        .route("/stock/top-funds", get(get_top_funds))
        .route("/stock/listing-summary", post(get_listing_summary))
}

async fn get_ticker_info(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<Record>>, AppError> {
    let info = state.stocks.ticker_info(&symbol).await?;
    Ok(Json(ApiResponse::success(info)))
}

async fn get_quarterly_financials(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<Vec<Record>>>, AppError> {
    let records = state.stocks.quarterly_financials(&symbol).await?;
    Ok(Json(ApiResponse::success(records)))
}

async fn get_yearly_financials(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<Vec<Record>>>, AppError> {
    let records = state.stocks.yearly_financials(&symbol).await?;
    Ok(Json(ApiResponse::success(records)))
}

async fn get_market_data(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<MarketQuery>,
) -> Result<Json<ApiResponse<Vec<Record>>>, AppError> {
    let period = query.period.as_deref().unwrap_or(DEFAULT_PERIOD);
    let interval = query.interval.as_deref().unwrap_or(DEFAULT_INTERVAL);

    let records = state.stocks.market_data(&symbol, period, interval).await?;
    Ok(Json(ApiResponse::success(records)))
}

async fn get_corporate_actions(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<Vec<Record>>>, AppError> {
    let records = state.stocks.corporate_actions(&symbol).await?;
    Ok(Json(ApiResponse::success(records)))
}

async fn get_recommendations(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<Vec<Record>>>, AppError> {
    let records = state.stocks.recommendations(&symbol).await?;
    Ok(Json(ApiResponse::success(records)))
}

async fn get_revisions(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<Vec<Record>>>, AppError> {
    let records = state.stocks.revisions(&symbol).await?;
    Ok(Json(ApiResponse::success(records)))
}

async fn get_price_targets(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<Record>>, AppError> {
    let targets = state.stocks.price_targets(&symbol).await?;
    Ok(Json(ApiResponse::success(targets)))
}

async fn get_calendar(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<Record>>, AppError> {
    let calendar = state.stocks.calendar(&symbol).await?;
    Ok(Json(ApiResponse::success(calendar)))
}

async fn get_news(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<Vec<Value>>>, AppError> {
    let news = state.stocks.news(&symbol).await?;
    Ok(Json(ApiResponse::success(news)))
}

async fn get_top_companies(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Record>>>, AppError> {
    let records = state.stocks.top_companies().await?;
    Ok(Json(ApiResponse::success(records)))
}

async fn get_top_etfs(State(state): State<AppState>) -> Result<Json<ApiResponse<Record>>, AppError> {
    let etfs = state.stocks.top_etfs().await?;
    Ok(Json(ApiResponse::success(etfs)))
}

async fn get_top_funds(State(state): State<AppState>) -> Result<Json<ApiResponse<Record>>, AppError> {
    let funds = state.stocks.top_funds().await?;
    Ok(Json(ApiResponse::success(funds)))
}

async fn get_listing_summary(
    State(state): State<AppState>,
    payload: Result<Json<Vec<String>>, JsonRejection>,
) -> Result<Json<ApiResponse<Vec<TickerSummary>>>, AppError> {
    let Json(symbols) = payload?;
    let summaries = state.stocks.listing_summary(&symbols).await?;
    Ok(Json(ApiResponse::success(summaries)))
}
