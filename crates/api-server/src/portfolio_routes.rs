use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::get,
    Json, Router,
};
use stock_core::{TickerInput, TrackedTicker};

use crate::{ApiResponse, AppError, AppState};

pub fn portfolio_routes() -> Router<AppState> {
    Router::new()
        .route("/portfolio/tickers", get(get_tracked_tickers).post(save_tracked_tickers))
        .route(
            "/portfolio/tickers/:symbol",
            get(get_tracked_ticker).delete(delete_tracked_ticker),
        )
}

async fn get_tracked_tickers(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TrackedTicker>>>, AppError> {
    let tickers = state.portfolio.get_all().await?;
    Ok(Json(ApiResponse::success(tickers)))
}

async fn get_tracked_ticker(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<TrackedTicker>>, AppError> {
    let ticker = state.portfolio.get_by_symbol(&symbol).await?;
    Ok(Json(ApiResponse::success(ticker)))
}

async fn save_tracked_tickers(
    State(state): State<AppState>,
    payload: Result<Json<Vec<TickerInput>>, JsonRejection>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let Json(tickers) = payload?;
    state.portfolio.save(&tickers).await?;
    tracing::info!("Saved {} tracked tickers", tickers.len());

    Ok(Json(ApiResponse::success(serde_json::json!({ "saved": tickers.len() }))))
}

async fn delete_tracked_ticker(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let deleted = state.portfolio.delete_by_symbol(&symbol).await?;
    tracing::info!("Removed {} from portfolio", symbol);

    Ok(Json(ApiResponse::success(serde_json::json!({ "deleted": deleted }))))
}
