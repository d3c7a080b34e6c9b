use serde_json::Value;
use stock_core::{Cell, Fundamentals, RecommendationBreakdown, Record, Table};

fn number(info: &Record, key: &str) -> Option<f64> {
    info.get(key).and_then(Value::as_f64).filter(|v| v.is_finite())
}

fn whole(info: &Record, key: &str) -> Option<i64> {
    info.get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)))
}

fn text(info: &Record, key: &str) -> Option<String> {
    info.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Counts from the current-month (`0m`) row of a recommendation trend table,
/// falling back to the first row.
pub fn recommendation_breakdown(trend: &Table) -> Option<RecommendationBreakdown> {
    let period = trend.column_position("period")?;
    let row = trend
        .rows()
        .iter()
        .position(|r| matches!(r.values.get(period), Some(Cell::Text(p)) if p == "0m"))
        .unwrap_or(0);
    if row >= trend.len() {
        return None;
    }

    let count = |column: &str| -> i64 {
        trend
            .get(row, column)
            .and_then(|c| match c {
                Cell::Integer(i) => Some(*i),
                other => other.as_f64().map(|f| f as i64),
            })
            .unwrap_or(0)
    };

    Some(RecommendationBreakdown {
        strong_buy: count("strongBuy"),
        buy: count("buy"),
        hold: count("hold"),
        sell: count("sell"),
        strong_sell: count("strongSell"),
    })
}

/// Pick the summary fields out of an upstream info map.
pub fn fundamentals_from_info(symbol: &str, info: &Record) -> Fundamentals {
    Fundamentals {
        symbol: text(info, "symbol").unwrap_or_else(|| symbol.to_string()),
        name: text(info, "shortName").or_else(|| text(info, "longName")),

        current_price: number(info, "currentPrice"),
        trailing_pe: number(info, "trailingPE"),
        forward_pe: number(info, "forwardPE"),
        price_to_book: number(info, "priceToBook"),
        enterprise_to_ebitda: number(info, "enterpriseToEbitda"),

        eps_trailing_twelve_months: number(info, "epsTrailingTwelveMonths")
            .or_else(|| number(info, "trailingEps")),
        eps_forward: number(info, "epsForward").or_else(|| number(info, "forwardEps")),
        revenue_growth: number(info, "revenueGrowth"),
        earnings_growth: number(info, "earningsGrowth"),

        return_on_equity: number(info, "returnOnEquity"),
        profit_margins: number(info, "profitMargins"),

        free_cashflow: whole(info, "freeCashflow"),
        total_debt: whole(info, "totalDebt"),
        total_cash: whole(info, "totalCash"),
        debt_to_equity: number(info, "debtToEquity"),

        dividend_rate: number(info, "dividendRate"),
        dividend_yield: number(info, "dividendYield"),
        payout_ratio: number(info, "payoutRatio"),
        dividend_growth_5y: None,

        target_mean_price: number(info, "targetMeanPrice"),
        recommendation_key: text(info, "recommendationKey"),
        recommendation_mean: number(info, "recommendationMean"),
        average_analyst_rating: text(info, "averageAnalystRating"),
        recommendation_breakdown: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_fields_read_from_info() {
        let info = info(json!({
            "symbol": "AAPL",
            "longName": "Apple Inc.",
            "currentPrice": 190.0,
            "trailingPE": 29.5,
            "trailingEps": 6.4,
            "freeCashflow": 99584000000.0,
            "totalDebt": 108040000000i64,
            "recommendationKey": "buy"
        }));

        let f = fundamentals_from_info("aapl", &info);
        assert_eq!(f.symbol, "AAPL");
        assert_eq!(f.name.as_deref(), Some("Apple Inc."));
        assert_eq!(f.trailing_pe, Some(29.5));
        assert_eq!(f.eps_trailing_twelve_months, Some(6.4));
        assert_eq!(f.free_cashflow, Some(99_584_000_000));
        assert_eq!(f.total_debt, Some(108_040_000_000));
        assert_eq!(f.recommendation_key.as_deref(), Some("buy"));
        assert_eq!(f.forward_pe, None);
    }

    #[test]
    fn test_short_name_preferred() {
        let info = info(json!({"shortName": "Apple", "longName": "Apple Inc."}));
        assert_eq!(fundamentals_from_info("AAPL", &info).name.as_deref(), Some("Apple"));
    }

    #[test]
    fn test_breakdown_uses_current_month() {
        let mut trend = Table::new(["period", "strongBuy", "buy", "hold", "sell", "strongSell"]);
        for (i, (period, buy)) in [("-1m", 20i64), ("0m", 23)].iter().enumerate() {
            trend.push_row(
                Cell::Integer(i as i64),
                vec![
                    Cell::from(*period),
                    Cell::Integer(5),
                    Cell::Integer(*buy),
                    Cell::Integer(14),
                    Cell::Integer(1),
                    Cell::Missing,
                ],
            );
        }

        let breakdown = recommendation_breakdown(&trend).unwrap();
        assert_eq!(breakdown.buy, 23);
        assert_eq!(breakdown.strong_sell, 0);
    }

    #[test]
    fn test_breakdown_absent_for_empty_trend() {
        let trend = Table::new(["period", "buy"]);
        assert_eq!(recommendation_breakdown(&trend), None);
        assert_eq!(recommendation_breakdown(&Table::default()), None);
    }
}
