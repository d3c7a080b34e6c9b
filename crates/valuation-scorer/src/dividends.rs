use std::collections::BTreeMap;

use chrono::Datelike;
use stock_core::Table;

const DIVIDENDS_COLUMN: &str = "Dividends";

/// Compound annual growth of dividends paid between `current_year - 5` and
/// `current_year - 1`.
///
/// `actions` is the corporate-actions table: timestamp labels and a
/// `Dividends` column. Returns `None` when either end year paid nothing.
pub fn dividend_growth_5y(actions: &Table, current_year: i32) -> Option<f64> {
    let col = actions.column_position(DIVIDENDS_COLUMN)?;

    let mut per_year: BTreeMap<i32, f64> = BTreeMap::new();
    for row in actions.rows() {
        let (Some(ts), Some(amount)) = (
            row.label.as_timestamp(),
            row.values.get(col).and_then(|c| c.as_f64()),
        ) else {
            continue;
        };
        if amount > 0.0 {
            *per_year.entry(ts.year()).or_insert(0.0) += amount;
        }
    }

    let first_year = current_year - 5;
    let last_year = current_year - 1;
    let first = *per_year.get(&first_year)?;
    let last = *per_year.get(&last_year)?;
    if first <= 0.0 {
        return None;
    }

    let years = (last_year - first_year) as f64;
    Some((last / first).powf(1.0 / years) - 1.0)
}
