use serde_json::{Number, Value};
use stock_core::{Cell, Record, Table};

/// Convert one cell to its JSON form. Missing and non-finite numbers become
/// null, timestamps become ISO-8601 strings.
pub fn cell_to_json(cell: &Cell) -> Value {
    match cell {
        Cell::Missing => Value::Null,
        Cell::Number(v) => Number::from_f64(*v).map(Value::Number).unwrap_or(Value::Null),
        Cell::Integer(v) => Value::from(*v),
        Cell::Text(s) => Value::String(s.clone()),
        Cell::Bool(b) => Value::Bool(*b),
        Cell::Timestamp(ts) => Value::String(ts.to_rfc3339()),
    }
}

/// One record per row, in row order. Row labels are not emitted; call
/// `Table::reset_index` first to keep them.
pub fn to_records(table: &Table) -> Vec<Record> {
    table
        .rows()
        .iter()
        .map(|row| {
            table
                .columns()
                .iter()
                .zip(row.values.iter())
                .map(|(col, cell)| (col.clone(), cell_to_json(cell)))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_missing_and_timestamp_cells() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
        let mut table = Table::new(["X", "Y", "Z"]);
        table.push_row(0i64, vec![Cell::Missing, Cell::Timestamp(ts), Cell::from(4.5)]);

        let records = to_records(&table);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["X"], Value::Null);
        assert_eq!(records[0]["Y"], Value::String("2024-03-31T00:00:00+00:00".to_string()));
        assert_eq!(records[0]["Z"], 4.5);
    }

    #[test]
    fn test_nan_and_infinity_become_null() {
        let mut table = Table::new(["a", "b"]);
        table.push_row(0i64, vec![Cell::Number(f64::NAN), Cell::Number(f64::INFINITY)]);

        let records = to_records(&table);
        assert!(records[0]["a"].is_null());
        assert!(records[0]["b"].is_null());
    }

    #[test]
    fn test_other_values_pass_through() {
        let mut table = Table::new(["name", "volume", "flag"]);
        table.push_row(0i64, vec!["Apple".into(), Cell::Integer(1200), Cell::Bool(true)]);

        let record = &to_records(&table)[0];
        assert_eq!(record["name"], "Apple");
        assert_eq!(record["volume"], 1200);
        assert_eq!(record["flag"], true);
    }

    #[test]
    fn test_row_and_column_order_preserved() {
        let mut table = Table::new(["b", "a"]);
        table.push_row(0i64, vec![Cell::Integer(1), Cell::Integer(2)]);
        table.push_row(1i64, vec![Cell::Integer(3), Cell::Integer(4)]);

        let records = to_records(&table);
        assert_eq!(records[0]["b"], 1);
        assert_eq!(records[1]["b"], 3);
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_empty_table_yields_no_records() {
        assert!(to_records(&Table::default()).is_empty());
        assert!(to_records(&Table::new(["a"])).is_empty());
    }
}
