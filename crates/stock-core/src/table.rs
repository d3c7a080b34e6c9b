use chrono::{DateTime, Utc};

/// A JSON-ready row: column name to value, in column order.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A single value in an upstream table.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Missing,
    Number(f64),
    Integer(i64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl Cell {
    /// `Missing` and NaN numbers both count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Number(v) => v.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) if !v.is_nan() => Some(*v),
            Cell::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Cell::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Key used to match row labels across tables. Tagged by variant so that
    /// `Text("1")` and `Integer(1)` never collide.
    pub fn label_key(&self) -> String {
        match self {
            Cell::Missing => "m:".to_string(),
            Cell::Number(v) if v.is_nan() => "m:".to_string(),
            Cell::Number(v) => format!("n:{}", v),
            Cell::Integer(v) => format!("n:{}", v),
            Cell::Text(s) => format!("s:{}", s),
            Cell::Bool(b) => format!("b:{}", b),
            Cell::Timestamp(ts) => format!("t:{}", ts.timestamp_micros()),
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Integer(v)
    }
}

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Cell::Bool(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl From<DateTime<Utc>> for Cell {
    fn from(v: DateTime<Utc>) -> Self {
        Cell::Timestamp(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Missing)
    }
}

/// One labelled row. `values` lines up with the owning table's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub label: Cell,
    pub values: Vec<Cell>,
}

/// Row-labelled tabular data as returned by the market-data provider.
///
/// Rows keep insertion order. The row label plays the role of an index
/// (reporting period, bar date, grade date); use [`Table::reset_index`] to turn
/// it into an ordinary column before normalization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    index_name: Option<String>,
    columns: Vec<String>,
    rows: Vec<TableRow>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index_name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a row. Short rows are padded with `Missing`, long rows truncated.
    pub fn push_row(&mut self, label: impl Into<Cell>, mut values: Vec<Cell>) {
        values.resize(self.columns.len(), Cell::Missing);
        self.rows.push(TableRow {
            label: label.into(),
            values,
        });
    }

    /// Append a column holding `value` in every row.
    pub fn push_column(&mut self, name: impl Into<String>, value: Cell) {
        self.columns.push(name.into());
        for row in &mut self.rows {
            row.values.push(value.clone());
        }
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_position(column)?;
        self.rows.get(row).and_then(|r| r.values.get(col))
    }

    /// Move the row label into a leading column. The column takes the table's
    /// index name, or `default_name` when the index is unnamed.
    pub fn reset_index(self, default_name: &str) -> Table {
        let name = self
            .index_name
            .unwrap_or_else(|| default_name.to_string());

        let mut columns = Vec::with_capacity(self.columns.len() + 1);
        columns.push(name);
        columns.extend(self.columns);

        let rows = self
            .rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let mut values = Vec::with_capacity(row.values.len() + 1);
                values.push(row.label);
                values.extend(row.values);
                TableRow {
                    label: Cell::Integer(i as i64),
                    values,
                }
            })
            .collect();

        Table {
            index_name: None,
            columns,
            rows,
        }
    }

    /// Stack tables vertically. Columns are the union in first-seen order;
    /// cells a source table lacks are `Missing`. Labels are renumbered.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            for col in &table.columns {
                if !columns.contains(col) {
                    columns.push(col.clone());
                }
            }
        }

        let mut out = Table::new(columns);
        let mut next_label = 0i64;
        for table in tables {
            let positions: Vec<Option<usize>> = out
                .columns
                .iter()
                .map(|c| table.column_position(c))
                .collect();
            for row in table.rows {
                let values = positions
                    .iter()
                    .map(|p| p.and_then(|i| row.values.get(i).cloned()).unwrap_or_default())
                    .collect();
                out.push_row(Cell::Integer(next_label), values);
                next_label += 1;
            }
        }
        out
    }
}
