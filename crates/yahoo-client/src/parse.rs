//! Conversions from Yahoo response bodies into provider-neutral tables.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use stock_core::{Cell, Record, ReportFrequency, SectorOverview, Table};

use crate::models::{ChartResult, QuoteIndicator};

const INTRADAY_INTERVALS: [&str; 8] = ["1m", "2m", "5m", "15m", "30m", "60m", "90m", "1h"];

/// Yahoo wraps most numbers as `{"raw": 1.5, "fmt": "1.50"}`. Returns the raw
/// value, or `None` for nulls and empty objects.
pub fn unwrap_raw(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) if map.contains_key("raw") => map.get("raw").cloned(),
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.clone()),
    }
}

fn raw_f64(value: Option<&Value>) -> Option<f64> {
    value.and_then(unwrap_raw).and_then(|v| v.as_f64())
}

fn raw_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(unwrap_raw)
        .and_then(|v| v.as_str().map(str::to_string))
}

fn json_to_cell(value: Option<&Value>) -> Cell {
    match value.and_then(unwrap_raw) {
        None => Cell::Missing,
        Some(Value::Bool(b)) => Cell::Bool(b),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => Cell::Integer(i),
            None => n.as_f64().map(Cell::Number).unwrap_or_default(),
        },
        Some(Value::String(s)) => Cell::Text(s),
        Some(other) => Cell::Text(other.to_string()),
    }
}

fn epoch_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

fn epoch_to_date_string(value: Option<&Value>) -> Value {
    value
        .and_then(unwrap_raw)
        .and_then(|v| v.as_i64())
        .and_then(epoch_to_utc)
        .map(|ts| Value::String(ts.format("%Y-%m-%d").to_string()))
        .unwrap_or(Value::Null)
}

pub fn is_intraday(interval: &str) -> bool {
    INTRADAY_INTERVALS.contains(&interval)
}

/// `TotalRevenue` -> `Total Revenue`, `NetPPE` -> `Net PPE`, `EBITDA` unchanged.
pub fn humanize(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

/// Flatten the modules of one quoteSummary result into a single map.
/// Later modules overwrite earlier ones; `maxAge` bookkeeping is dropped.
pub fn flatten_quote_summary(result: &Map<String, Value>) -> Record {
    let mut info = Record::new();
    for module in result.values() {
        let Value::Object(fields) = module else {
            continue;
        };
        for (key, value) in fields {
            if key == "maxAge" {
                continue;
            }
            if let Some(v) = unwrap_raw(value) {
                info.insert(key.clone(), v);
            }
        }
    }
    info
}

/// Fill in fields from the v7 quote endpoint that quoteSummary lacks.
pub fn merge_quote_fields(info: &mut Record, quote: &Map<String, Value>) {
    for (key, value) in quote {
        if !info.contains_key(key) && !value.is_null() {
            info.insert(key.clone(), value.clone());
        }
    }
}

/// Build one statement table from a fundamentals-timeseries body.
///
/// Rows are reporting periods (midnight UTC), most recent first. Columns
/// follow `keys` order, humanized, and only keys with at least one reported
/// value appear.
pub fn parse_timeseries(body: &Value, frequency: ReportFrequency, keys: &[&str]) -> Table {
    let prefix = frequency.as_str();
    let mut values: HashMap<&str, BTreeMap<NaiveDate, f64>> = HashMap::new();

    let results = body
        .pointer("/timeseries/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for item in &results {
        let Some(type_name) = item.pointer("/meta/type/0").and_then(Value::as_str) else {
            continue;
        };
        let Some(key) = type_name
            .strip_prefix(prefix)
            .and_then(|k| keys.iter().find(|candidate| **candidate == k))
        else {
            continue;
        };
        let Some(entries) = item.get(type_name).and_then(Value::as_array) else {
            continue;
        };

        for entry in entries {
            let date = entry
                .get("asOfDate")
                .and_then(Value::as_str)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
            let amount = raw_f64(entry.get("reportedValue"));
            if let (Some(date), Some(amount)) = (date, amount) {
                values.entry(*key).or_default().insert(date, amount);
            }
        }
    }

    let present: Vec<&str> = keys.iter().copied().filter(|k| values.contains_key(k)).collect();
    let periods: BTreeSet<NaiveDate> = values.values().flat_map(|m| m.keys().copied()).collect();

    let mut table = Table::new(present.iter().map(|k| humanize(k)));
    for period in periods.into_iter().rev() {
        let row = present
            .iter()
            .map(|k| values[k].get(&period).copied().into())
            .collect();
        let label = period.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        table.push_row(label, row);
    }
    table
}

/// Auto-adjusted OHLCV bars with dividend and split columns.
pub fn parse_history(result: &ChartResult, interval: &str) -> Table {
    let index_name = if is_intraday(interval) { "Datetime" } else { "Date" };
    let mut table = Table::new(["Open", "High", "Low", "Close", "Volume", "Dividends", "Stock Splits"])
        .with_index_name(index_name);

    let default_quote = QuoteIndicator::default();
    let quote = result.indicators.quote.first().unwrap_or(&default_quote);
    let adjclose = result.indicators.adjclose.first().map(|a| a.adjclose.as_slice()).unwrap_or(&[]);

    let mut dividends: HashMap<NaiveDate, f64> = result
        .events
        .dividends
        .values()
        .filter_map(|d| epoch_to_utc(d.date).map(|ts| (ts.date_naive(), d.amount)))
        .collect();
    let mut splits: HashMap<NaiveDate, f64> = result
        .events
        .splits
        .values()
        .filter(|s| s.denominator != 0.0)
        .filter_map(|s| epoch_to_utc(s.date).map(|ts| (ts.date_naive(), s.numerator / s.denominator)))
        .collect();

    let at = |series: &[Option<f64>], i: usize| series.get(i).copied().flatten();

    for (i, &secs) in result.timestamp.iter().enumerate() {
        let Some(ts) = epoch_to_utc(secs) else {
            continue;
        };
        let close = at(&quote.close, i);
        if close.is_none() {
            continue;
        }

        let adj = at(adjclose, i);
        let ratio = match (adj, close) {
            (Some(a), Some(c)) if c != 0.0 => a / c,
            _ => 1.0,
        };
        let adjust = |v: Option<f64>| v.map(|x| x * ratio);

        // events are keyed by day; claim each once so intraday bars don't repeat it
        let day = ts.date_naive();
        let dividend = dividends.remove(&day).unwrap_or(0.0);
        let split = splits.remove(&day).unwrap_or(0.0);

        table.push_row(
            ts,
            vec![
                adjust(at(&quote.open, i)).into(),
                adjust(at(&quote.high, i)).into(),
                adjust(at(&quote.low, i)).into(),
                adj.or(close).into(),
                at(&quote.volume, i).map(|v| v as i64).into(),
                Cell::from(dividend),
                Cell::from(split),
            ],
        );
    }
    table
}

/// Dividend and split events, oldest first; zero where a date has only the other kind.
pub fn parse_actions(result: &ChartResult) -> Table {
    let mut events: BTreeMap<i64, (f64, f64)> = BTreeMap::new();
    for d in result.events.dividends.values() {
        events.entry(d.date).or_default().0 += d.amount;
    }
    for s in result.events.splits.values() {
        if s.denominator != 0.0 {
            events.entry(s.date).or_default().1 = s.numerator / s.denominator;
        }
    }

    let mut table = Table::new(["Dividends", "Stock Splits"]).with_index_name("Date");
    for (secs, (dividend, split)) in events {
        if let Some(ts) = epoch_to_utc(secs) {
            table.push_row(ts, vec![Cell::from(dividend), Cell::from(split)]);
        }
    }
    table
}

/// `recommendationTrend` module: one row per relative month (`0m`, `-1m`, ...).
pub fn parse_recommendation_trend(module: Option<&Value>) -> Table {
    const COLUMNS: [&str; 6] = ["period", "strongBuy", "buy", "hold", "sell", "strongSell"];
    let mut table = Table::new(COLUMNS);

    let trend = module
        .and_then(|m| m.get("trend"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for (i, entry) in trend.iter().enumerate() {
        let row = COLUMNS.iter().map(|c| json_to_cell(entry.get(*c))).collect();
        table.push_row(Cell::Integer(i as i64), row);
    }
    table
}

/// `upgradeDowngradeHistory` module, indexed by grade date.
pub fn parse_upgrades_downgrades(module: Option<&Value>) -> Table {
    const FIELDS: [(&str, &str); 7] = [
        ("firm", "Firm"),
        ("toGrade", "ToGrade"),
        ("fromGrade", "FromGrade"),
        ("action", "Action"),
        ("priceTargetAction", "priceTargetAction"),
        ("currentPriceTarget", "currentPriceTarget"),
        ("priorPriceTarget", "priorPriceTarget"),
    ];
    let mut table = Table::new(FIELDS.iter().map(|(_, name)| *name)).with_index_name("GradeDate");

    let history = module
        .and_then(|m| m.get("history"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for entry in &history {
        let label = entry
            .get("epochGradeDate")
            .and_then(unwrap_raw)
            .and_then(|v| v.as_i64())
            .and_then(epoch_to_utc);
        let row = FIELDS.iter().map(|(key, _)| json_to_cell(entry.get(*key))).collect();
        table.push_row(label, row);
    }
    table
}

/// Analyst price targets from the `financialData` module.
pub fn parse_price_targets(financial_data: Option<&Value>) -> Record {
    const FIELDS: [(&str, &str); 5] = [
        ("current", "currentPrice"),
        ("high", "targetHighPrice"),
        ("low", "targetLowPrice"),
        ("mean", "targetMeanPrice"),
        ("median", "targetMedianPrice"),
    ];

    let Some(data) = financial_data else {
        return Record::new();
    };
    let targets: Record = FIELDS
        .iter()
        .map(|(name, key)| (name.to_string(), raw_f64(data.get(*key)).map(Value::from).unwrap_or(Value::Null)))
        .collect();

    if targets.values().all(Value::is_null) {
        Record::new()
    } else {
        targets
    }
}

/// `calendarEvents` module: dividend dates plus earnings dates and estimates.
pub fn parse_calendar(events: Option<&Value>) -> Record {
    let Some(events) = events else {
        return Record::new();
    };
    let mut calendar = Record::new();

    if events.get("dividendDate").is_some() {
        calendar.insert("Dividend Date".to_string(), epoch_to_date_string(events.get("dividendDate")));
    }
    if events.get("exDividendDate").is_some() {
        calendar.insert("Ex-Dividend Date".to_string(), epoch_to_date_string(events.get("exDividendDate")));
    }

    if let Some(earnings) = events.get("earnings") {
        let dates: Vec<Value> = earnings
            .get("earningsDate")
            .and_then(Value::as_array)
            .map(|ds| ds.iter().map(|d| epoch_to_date_string(Some(d))).filter(|d| !d.is_null()).collect())
            .unwrap_or_default();
        calendar.insert("Earnings Date".to_string(), Value::Array(dates));

        for (key, name) in [
            ("earningsHigh", "Earnings High"),
            ("earningsLow", "Earnings Low"),
            ("earningsAverage", "Earnings Average"),
            ("revenueHigh", "Revenue High"),
            ("revenueLow", "Revenue Low"),
            ("revenueAverage", "Revenue Average"),
        ] {
            if let Some(v) = raw_f64(earnings.get(key)) {
                calendar.insert(name.to_string(), Value::from(v));
            }
        }
    }

    calendar
}

/// Sector endpoint body: top companies as a table, ETFs and funds as symbol -> name.
pub fn parse_sector(body: &Value) -> SectorOverview {
    let data = body.get("data");
    let list = |key: &str| -> Vec<Value> {
        data.and_then(|d| d.get(key))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    };

    let mut top_companies = Table::new(["symbol", "name", "rating", "market weight"]);
    for (i, company) in list("topCompanies").iter().enumerate() {
        top_companies.push_row(
            Cell::Integer(i as i64),
            vec![
                json_to_cell(company.get("symbol")),
                json_to_cell(company.get("name")),
                json_to_cell(company.get("rating")),
                json_to_cell(company.get("marketWeight")),
            ],
        );
    }

    let to_map = |entries: Vec<Value>| -> Record {
        entries
            .iter()
            .filter_map(|e| {
                let symbol = raw_string(e.get("symbol"))?;
                let name = raw_string(e.get("name")).map(Value::String).unwrap_or(Value::Null);
                Some((symbol, name))
            })
            .collect()
    };

    SectorOverview {
        top_companies,
        top_etfs: to_map(list("topETFs")),
        top_mutual_funds: to_map(list("topMutualFunds")),
    }
}
