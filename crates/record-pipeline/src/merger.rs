use std::collections::HashMap;

use stock_core::{Cell, Table};

/// Column that carries the reporting period in a merged statement table.
pub const PERIOD_COLUMN: &str = "period";

const INCOME_SUFFIX: &str = "_income";
const BALANCE_SUFFIX: &str = "_balance";
const CASH_FLOW_SUFFIX: &str = "_cashflow";

/// Outer-join income, balance-sheet and cash-flow tables on their row labels.
///
/// Rows: one per distinct period, in first-appearance order scanning the
/// income labels, then balance-sheet labels, then cash-flow labels. A period
/// missing from a source leaves that source's cells `Missing`. If a source
/// repeats a label, its first row wins. Periods are never re-sorted: statements
/// that arrive newest first stay newest first, and callers wanting ascending
/// periods sort the result themselves.
///
/// Columns: `period` first, then income, balance-sheet and cash-flow columns.
/// Names shared by income and balance sheet get `_income` / `_balance` on both
/// sides; cash-flow names colliding with either get `_cashflow` on the cash-flow
/// side only.
pub fn merge_statements(income: &Table, balance: &Table, cash_flow: &Table) -> Table {
    let (income_cols, balance_cols) = suffix_overlap(
        income.columns(),
        balance.columns(),
        INCOME_SUFFIX,
        BALANCE_SUFFIX,
    );

    let left_cols: Vec<String> = income_cols.iter().chain(balance_cols.iter()).cloned().collect();
    let cash_cols: Vec<String> = cash_flow
        .columns()
        .iter()
        .map(|c| {
            if left_cols.contains(c) {
                format!("{}{}", c, CASH_FLOW_SUFFIX)
            } else {
                c.clone()
            }
        })
        .collect();

    let mut columns = Vec::with_capacity(1 + left_cols.len() + cash_cols.len());
    columns.push(PERIOD_COLUMN.to_string());
    columns.extend(left_cols);
    columns.extend(cash_cols);

    let sources = [income, balance, cash_flow];
    let lookups: Vec<HashMap<String, usize>> = sources.iter().map(|t| label_lookup(t)).collect();

    let mut merged = Table::new(columns);
    for (i, period) in union_labels(&sources).into_iter().enumerate() {
        let key = period.label_key();
        let mut values = vec![period];
        for (source, lookup) in sources.iter().zip(lookups.iter()) {
            match lookup.get(&key) {
                Some(&row) => values.extend(source.rows()[row].values.iter().cloned()),
                None => values.extend(std::iter::repeat(Cell::Missing).take(source.columns().len())),
            }
        }
        merged.push_row(Cell::Integer(i as i64), values);
    }

    merged
}

fn suffix_overlap(
    left: &[String],
    right: &[String],
    left_suffix: &str,
    right_suffix: &str,
) -> (Vec<String>, Vec<String>) {
    let rename = |cols: &[String], other: &[String], suffix: &str| -> Vec<String> {
        cols.iter()
            .map(|c| {
                if other.contains(c) {
                    format!("{}{}", c, suffix)
                } else {
                    c.clone()
                }
            })
            .collect()
    };
    (
        rename(left, right, left_suffix),
        rename(right, left, right_suffix),
    )
}

fn label_lookup(table: &Table) -> HashMap<String, usize> {
    let mut lookup = HashMap::with_capacity(table.len());
    for (i, row) in table.rows().iter().enumerate() {
        lookup.entry(row.label.label_key()).or_insert(i);
    }
    lookup
}

fn union_labels(tables: &[&Table]) -> Vec<Cell> {
    let mut seen = std::collections::HashSet::new();
    let mut labels = Vec::new();
    for table in tables {
        for row in table.rows() {
            if seen.insert(row.label.label_key()) {
                labels.push(row.label.clone());
            }
        }
    }
    labels
}
