//! Stateless JSON-RPC 2.0 endpoint exposing the stock and portfolio
//! operations as callable tools.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stock_core::{StockError, TickerInput};
use stock_orchestrator::{DEFAULT_INTERVAL, DEFAULT_PERIOD};

use crate::AppState;

pub const PROTOCOL_VERSION: &str = "2025-03-26";
pub const SERVER_NAME: &str = "stock-tool";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Why a tool call produced no value.
#[derive(Debug)]
enum ToolFailure {
    /// Arguments did not match the tool's schema.
    InvalidParams(String),
    /// The tool ran and the operation failed.
    Execution(StockError),
}

impl From<StockError> for ToolFailure {
    fn from(err: StockError) -> Self {
        ToolFailure::Execution(err)
    }
}

struct ToolDef {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
}

fn symbol_schema() -> Value {
    json!({
        "type": "object",
        "properties": {"symbol": {"type": "string", "description": "Ticker symbol, e.g. AAPL"}},
        "required": ["symbol"]
    })
}

fn no_args_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

fn symbol_tool(name: &'static str, description: &'static str) -> ToolDef {
    ToolDef {
        name,
        description,
        input_schema: symbol_schema(),
    }
}

fn tool_definitions() -> Vec<ToolDef> {
    vec![
        symbol_tool(
            "get_ticker_info",
            "Get comprehensive ticker information including company details, market cap, sector, and key financial metrics",
        ),
        symbol_tool(
            "get_quarterly_financials",
            "Retrieve quarterly financial statements including income statement, balance sheet, and cash flow data",
        ),
        symbol_tool(
            "get_yearly_financials",
            "Retrieve annual financial statements including income statement, balance sheet, and cash flow data",
        ),
        ToolDef {
            name: "get_market_data",
            description: "Get historical stock price data including open, high, low, close, and volume for market analysis",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string"},
                    "period": {"type": "string", "default": DEFAULT_PERIOD},
                    "interval": {"type": "string", "default": DEFAULT_INTERVAL}
                },
                "required": ["symbol"]
            }),
        },
        symbol_tool(
            "get_corporate_actions",
            "Retrieve corporate actions history including dividend payments and stock splits",
        ),
        symbol_tool(
            "get_recommendations",
            "Get current analyst recommendations and ratings (buy, hold, sell) from financial institutions",
        ),
        symbol_tool(
            "get_revisions",
            "Get recent analyst rating changes including upgrades, downgrades, and target price revisions",
        ),
        symbol_tool(
            "get_price_targets",
            "Get analyst price targets including mean, high, low, and current target prices",
        ),
        symbol_tool(
            "get_calendar",
            "Get upcoming earnings calendar with expected earnings dates and estimates",
        ),
        symbol_tool("get_news", "Get recent news articles and updates for a stock symbol"),
        ToolDef {
            name: "get_top_companies",
            description: "Get list of top companies organized by market sector",
            input_schema: no_args_schema(),
        },
        ToolDef {
            name: "get_top_etfs",
            description: "Get top Exchange Traded Funds (ETFs) categorized by sector",
            input_schema: no_args_schema(),
        },
        ToolDef {
            name: "get_top_funds",
            description: "Get top mutual funds organized by sector",
            input_schema: no_args_schema(),
        },
        ToolDef {
            name: "get_tracked_tickers",
            description: "Get all tracked tickers in portfolio",
            input_schema: no_args_schema(),
        },
        symbol_tool("get_tracked_ticker", "Get specific portfolio tracked ticker by symbol"),
        ToolDef {
            name: "add_tracked_ticker",
            description: "Add ticker to portfolio tracking",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string"},
                    "quantity": {"type": "number"}
                },
                "required": ["symbol", "quantity"]
            }),
        },
        symbol_tool("remove_tracked_ticker", "Remove ticker from portfolio tracking"),
        ToolDef {
            name: "get_index_listing",
            description: "Get stock symbols for a specific market index (SP500, IBEX35, FTSE100, DAX)",
            input_schema: json!({
                "type": "object",
                "properties": {"index_name": {"type": "string", "enum": ["SP500", "IBEX35", "FTSE100", "DAX"]}},
                "required": ["index_name"]
            }),
        },
        ToolDef {
            name: "get_listing_summary",
            description: "Get summary data for multiple stock symbols including price, PE ratios, EPS, growth, debt, dividends, analyst targets and an undervaluation score",
            input_schema: json!({
                "type": "object",
                "properties": {"symbols": {"type": "array", "items": {"type": "string"}}},
                "required": ["symbols"]
            }),
        },
    ]
}

fn list_tools() -> Value {
    let tools: Vec<Value> = tool_definitions()
        .into_iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "inputSchema": t.input_schema,
            })
        })
        .collect();
    json!({ "tools": tools })
}

fn str_arg(args: &Value, name: &str) -> Result<String, ToolFailure> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ToolFailure::InvalidParams(format!("Missing string argument '{}'", name)))
}

fn opt_str_arg(args: &Value, name: &str, default: &str) -> Result<String, ToolFailure> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default.to_string()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ToolFailure::InvalidParams(format!("Argument '{}' must be a string", name))),
    }
}

fn f64_arg(args: &Value, name: &str) -> Result<f64, ToolFailure> {
    args.get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolFailure::InvalidParams(format!("Missing numeric argument '{}'", name)))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, ToolFailure> {
    serde_json::to_value(value)
        .map_err(|e| ToolFailure::Execution(StockError::Upstream(format!("Unserializable result: {}", e))))
}

async fn call_tool(state: &AppState, name: &str, args: &Value) -> Result<Value, ToolFailure> {
    let stocks = &state.stocks;
    match name {
        "get_ticker_info" => to_value(stocks.ticker_info(&str_arg(args, "symbol")?).await?),
        "get_quarterly_financials" => {
            to_value(stocks.quarterly_financials(&str_arg(args, "symbol")?).await?)
        }
        "get_yearly_financials" => to_value(stocks.yearly_financials(&str_arg(args, "symbol")?).await?),
        "get_market_data" => {
            let symbol = str_arg(args, "symbol")?;
            let period = opt_str_arg(args, "period", DEFAULT_PERIOD)?;
            let interval = opt_str_arg(args, "interval", DEFAULT_INTERVAL)?;
            to_value(stocks.market_data(&symbol, &period, &interval).await?)
        }
        "get_corporate_actions" => to_value(stocks.corporate_actions(&str_arg(args, "symbol")?).await?),
        "get_recommendations" => to_value(stocks.recommendations(&str_arg(args, "symbol")?).await?),
        "get_revisions" => to_value(stocks.revisions(&str_arg(args, "symbol")?).await?),
        "get_price_targets" => to_value(stocks.price_targets(&str_arg(args, "symbol")?).await?),
        "get_calendar" => to_value(stocks.calendar(&str_arg(args, "symbol")?).await?),
        "get_news" => to_value(stocks.news(&str_arg(args, "symbol")?).await?),
        "get_top_companies" => to_value(stocks.top_companies().await?),
        "get_top_etfs" => to_value(stocks.top_etfs().await?),
        "get_top_funds" => to_value(stocks.top_funds().await?),
        "get_tracked_tickers" => to_value(state.portfolio.get_all().await?),
        "get_tracked_ticker" => to_value(state.portfolio.get_by_symbol(&str_arg(args, "symbol")?).await?),
        "add_tracked_ticker" => {
            let ticker = TickerInput::new(str_arg(args, "symbol")?, f64_arg(args, "quantity")?);
            state.portfolio.save(std::slice::from_ref(&ticker)).await?;
            Ok(json!({ "symbol": ticker.symbol, "quantity": ticker.quantity }))
        }
        "remove_tracked_ticker" => {
            let deleted = state.portfolio.delete_by_symbol(&str_arg(args, "symbol")?).await?;
            Ok(json!({ "deleted": deleted }))
        }
        "get_index_listing" => {
            to_value(state.indices.get_index_listing(&str_arg(args, "index_name")?).await?)
        }
        "get_listing_summary" => {
            let symbols: Vec<String> = args
                .get("symbols")
                .cloned()
                .and_then(|v| serde_json::from_value(v).ok())
                .ok_or_else(|| ToolFailure::InvalidParams("Argument 'symbols' must be a list of strings".to_string()))?;
            to_value(stocks.listing_summary(&symbols).await?)
        }
        other => Err(ToolFailure::InvalidParams(format!("Unknown tool: {}", other))),
    }
}

/// Tool result: JSON text content plus structured content, which must be an object.
fn tool_result(value: Value, is_error: bool) -> Value {
    let text = match &value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let structured = if value.is_object() {
        value
    } else {
        json!({ "result": value })
    };
    json!({
        "content": [{"type": "text", "text": text}],
        "structuredContent": structured,
        "isError": is_error,
    })
}

async fn dispatch(state: &AppState, request: RpcRequest) -> RpcResponse {
    let id = request.id.unwrap_or(Value::Null);
    match request.method.as_str() {
        "initialize" => {
            let version = request
                .params
                .get("protocolVersion")
                .and_then(Value::as_str)
                .unwrap_or(PROTOCOL_VERSION)
                .to_string();
            RpcResponse::result(
                id,
                json!({
                    "protocolVersion": version,
                    "capabilities": {"tools": {"listChanged": false}},
                    "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")},
                }),
            )
        }
        "ping" => RpcResponse::result(id, json!({})),
        "tools/list" => RpcResponse::result(id, list_tools()),
        "tools/call" => {
            let Some(name) = request.params.get("name").and_then(Value::as_str) else {
                return RpcResponse::error(id, INVALID_PARAMS, "Missing tool name");
            };
            let args = request.params.get("arguments").cloned().unwrap_or_else(|| json!({}));

            tracing::info!("Tool call: {}", name);
            match call_tool(state, name, &args).await {
                Ok(value) => RpcResponse::result(id, tool_result(value, false)),
                Err(ToolFailure::InvalidParams(msg)) => RpcResponse::error(id, INVALID_PARAMS, msg),
                Err(ToolFailure::Execution(err)) => {
                    tracing::warn!("Tool {} failed: {}", name, err);
                    RpcResponse::result(id, tool_result(Value::String(err.to_string()), true))
                }
            }
        }
        other => RpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
    }
}

pub async fn handle(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            let response = RpcResponse::error(Value::Null, PARSE_ERROR, rejection.body_text());
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    let request: RpcRequest = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(e) => {
            let response = RpcResponse::error(Value::Null, INVALID_REQUEST, e.to_string());
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    if request.jsonrpc != "2.0" {
        let id = request.id.unwrap_or(Value::Null);
        let response = RpcResponse::error(id, INVALID_REQUEST, "jsonrpc must be \"2.0\"");
        return (StatusCode::BAD_REQUEST, Json(response)).into_response();
    }

    // notifications expect no reply
    if request.method.starts_with("notifications/") {
        return StatusCode::ACCEPTED.into_response();
    }

    Json(dispatch(&state, request).await).into_response()
}
