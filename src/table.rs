//! In-memory tables
//!
//! A [`Table`] wraps a polars `DataFrame` that is never mutated after construction. Every
//! derivation (filtering, projection, computed columns) produces a new `Table`, so a loaded
//! dataset can be shared between evaluations without copies or locks.

use crate::error::{DashboardError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Stable positional identifier attached to every table at construction time.
pub const ROW_INDEX_COLUMN: &str = "__row_index";

/// A single typed cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Flag(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn from_any(value: &AnyValue) -> Self {
        match value {
            AnyValue::Null => CellValue::Null,
            AnyValue::Boolean(b) => CellValue::Flag(*b),
            AnyValue::String(s) => CellValue::Text(s.to_string()),
            AnyValue::StringOwned(s) => CellValue::Text(s.to_string()),
            other => match other.extract::<f64>() {
                Some(n) => CellValue::Number(n),
                None => CellValue::Text(other.to_string()),
            },
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Null | CellValue::Text(_) => None,
        }
    }

    /// Numeric 1 or boolean true.
    pub fn is_truthy(&self) -> bool {
        match self {
            CellValue::Number(n) => *n == 1.0,
            CellValue::Flag(b) => *b,
            CellValue::Null | CellValue::Text(_) => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Total order used for "natural" category ordering: nulls, flags, numbers, then text.
    pub fn natural_cmp(&self, other: &CellValue) -> Ordering {
        fn rank(value: &CellValue) -> u8 {
            match value {
                CellValue::Null => 0,
                CellValue::Flag(_) => 1,
                CellValue::Number(_) => 2,
                CellValue::Text(_) => 3,
            }
        }
        match (self, other) {
            (CellValue::Flag(a), CellValue::Flag(b)) => a.cmp(b),
            (CellValue::Number(a), CellValue::Number(b)) => a.total_cmp(b),
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, ""),
            CellValue::Flag(b) => write!(f, "{}", b),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{:.0}", n),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Flag(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

/// One row of a table, with its fields in column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    fields: Vec<(String, CellValue)>,
}

impl Record {
    pub fn new(fields: Vec<(String, CellValue)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(CellValue::as_f64)
    }

    pub fn row_index(&self) -> Option<usize> {
        self.number(ROW_INDEX_COLUMN).map(|n| n as usize)
    }

    /// Fields without the row index column.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.fields
            .iter()
            .filter(|(name, _)| name != ROW_INDEX_COLUMN)
            .map(|(name, value)| (name.as_str(), value))
    }
}

/// Immutable table over a polars `DataFrame`.
#[derive(Debug, Clone)]
pub struct Table {
    frame: DataFrame,
}

impl Table {
    /// Wrap a frame, attaching the row index column when it is not there yet.
    pub fn new(frame: DataFrame) -> Result<Self> {
        if frame.get_column_names().contains(&ROW_INDEX_COLUMN) {
            return Ok(Self { frame });
        }
        let frame = frame.with_row_index(ROW_INDEX_COLUMN, None)?;
        Ok(Self { frame })
    }

    /// Wrap a frame derived from another table; the row index is carried over as-is.
    pub(crate) fn derived(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Data columns, row index excluded.
    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .filter(|name| *name != ROW_INDEX_COLUMN)
            .map(|name| name.to_string())
            .collect()
    }

    pub fn width(&self) -> usize {
        self.column_names().len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_names().contains(&name)
    }

    /// Columns whose names start with `prefix`, in table order.
    pub fn columns_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.column_names()
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .collect()
    }

    pub fn require_column(&self, name: &str) -> Result<&Series> {
        self.frame
            .column(name)
            .map_err(|_| self.unknown_column(name))
    }

    pub(crate) fn unknown_column(&self, name: &str) -> DashboardError {
        let closest = self
            .column_names()
            .into_iter()
            .map(|candidate| (strsim::jaro_winkler(name, &candidate), candidate))
            .filter(|(score, _)| *score > 0.8)
            .max_by(|a, b| a.0.total_cmp(&b.0));

        match closest {
            Some((_, candidate)) => DashboardError::Configuration(format!(
                "unknown column '{}' (did you mean '{}'?)",
                name, candidate
            )),
            None => DashboardError::Configuration(format!("unknown column '{}'", name)),
        }
    }

    /// The column, provided it holds numbers or booleans.
    pub fn require_numeric(&self, name: &str) -> Result<&Series> {
        let series = self.require_column(name)?;
        match series.dtype() {
            dtype if dtype.is_numeric() => Ok(series),
            DataType::Boolean | DataType::Null => Ok(series),
            dtype => Err(DashboardError::Configuration(format!(
                "column '{}' is not numeric ({})",
                name, dtype
            ))),
        }
    }

    /// Column values as floats; booleans become 0/1 and unparsable values become `None`.
    pub fn numeric_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let series = self.require_column(name)?.cast(&DataType::Float64)?;
        let values = series.f64()?;
        Ok(values.into_iter().collect())
    }

    pub fn record(&self, row: usize) -> Result<Record> {
        if row >= self.height() {
            return Err(DashboardError::NotFound(format!(
                "row {} out of range ({} rows)",
                row,
                self.height()
            )));
        }
        let mut fields = Vec::with_capacity(self.frame.width());
        for series in self.frame.get_columns() {
            let value = series.get(row)?;
            fields.push((series.name().to_string(), CellValue::from_any(&value)));
        }
        Ok(Record::new(fields))
    }

    pub fn head(&self, rows: usize) -> Table {
        Table::derived(self.frame.head(Some(rows)))
    }

    /// New table with only `columns` (plus the row index), e.g. the inputs of a scatter chart.
    pub fn project<S: AsRef<str>>(&self, columns: &[S]) -> Result<Table> {
        let mut selection = vec![col(ROW_INDEX_COLUMN)];
        for column in columns {
            self.require_column(column.as_ref())?;
            selection.push(col(column.as_ref()));
        }
        let frame = self
            .frame
            .clone()
            .lazy()
            .select(selection)
            .collect()
            .map_err(|e| DashboardError::Polars(format!("Select failed: {}", e)))?;
        Ok(Table::derived(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let frame = df![
            "Deal Score" => [10.0, 40.0],
            "Deal Stage" => ["Won", "Lost"],
            "Deal Type_New" => [1i64, 0],
        ]
        .unwrap();
        Table::new(frame).unwrap()
    }

    #[test]
    fn test_row_index_is_attached_once() {
        let table = sample();
        assert!(table.has_column(ROW_INDEX_COLUMN));
        assert_eq!(table.width(), 3);

        let again = Table::new(table.frame().clone()).unwrap();
        assert_eq!(again.frame().width(), table.frame().width());
    }

    #[test]
    fn test_unknown_column_suggests_closest() {
        let table = sample();
        let err = table.require_column("Deal Scor").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Deal Score"));
    }

    #[test]
    fn test_record_exposes_typed_fields() {
        let table = sample();
        let record = table.record(1).unwrap();
        assert_eq!(record.number("Deal Score"), Some(40.0));
        assert_eq!(record.get("Deal Stage"), Some(&CellValue::from("Lost")));
        assert_eq!(record.row_index(), Some(1));
        assert_eq!(record.fields().count(), 3);
    }

    #[test]
    fn test_require_numeric_rejects_text() {
        let table = sample();
        assert!(table.require_numeric("Deal Score").is_ok());
        assert!(table.require_numeric("Deal Type_New").is_ok());
        let err = table.require_numeric("Deal Stage").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("not numeric"));
    }

    #[test]
    fn test_record_out_of_range() {
        let table = sample();
        assert!(table.record(2).unwrap_err().is_not_found());
    }

    #[test]
    fn test_project_keeps_row_index() {
        let table = sample();
        let projected = table.project(&["Deal Stage"]).unwrap();
        assert_eq!(projected.column_names(), vec!["Deal Stage".to_string()]);
        assert!(projected.has_column(ROW_INDEX_COLUMN));
        assert!(table.project(&["Deal"]).unwrap_err().is_configuration());
    }

    #[test]
    fn test_natural_order() {
        let mut values = vec![
            CellValue::from("b"),
            CellValue::from(3.0),
            CellValue::Null,
            CellValue::from(1.0),
            CellValue::from("a"),
        ];
        values.sort_by(|a, b| a.natural_cmp(b));
        assert_eq!(
            values,
            vec![
                CellValue::Null,
                CellValue::from(1.0),
                CellValue::from(3.0),
                CellValue::from("a"),
                CellValue::from("b"),
            ]
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(CellValue::from(1.0).is_truthy());
        assert!(CellValue::from(true).is_truthy());
        assert!(!CellValue::from(0.0).is_truthy());
        assert!(!CellValue::from("1").is_truthy());
        assert!(!CellValue::Null.is_truthy());
    }
}
