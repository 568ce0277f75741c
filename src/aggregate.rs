//! Grouped aggregates
//!
//! Everything a chart needs from a filtered table: sums or counts per category (or per pair of
//! categories), per-flag totals and histograms. Results are plain data.

use crate::error::{DashboardError, Result};
use crate::table::{CellValue, Table};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const VALUE_COLUMN: &str = "__value";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "column", rename_all = "snake_case")]
pub enum AggregateOp {
    /// Rows per group.
    Count,
    Sum(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOrder {
    /// Descending by value; ties keep the order in which groups first appear in the table.
    TopN { limit: Option<usize> },
    /// Ascending by the group keys.
    Natural,
}

impl GroupOrder {
    pub fn all_descending() -> Self {
        GroupOrder::TopN { limit: None }
    }

    pub fn top(limit: usize) -> Self {
        GroupOrder::TopN { limit: Some(limit) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub keys: Vec<CellValue>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateTable {
    pub group_columns: Vec<String>,
    pub value_column: String,
    pub rows: Vec<AggregateRow>,
}

impl AggregateTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.rows.iter().map(|row| row.value).sum()
    }

    pub fn get(&self, keys: &[CellValue]) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| row.keys.as_slice() == keys)
            .map(|row| row.value)
    }

    fn order(&mut self, order: GroupOrder) {
        match order {
            GroupOrder::TopN { limit } => {
                // `sort_by` is stable, so equal values keep their first-seen order.
                self.rows.sort_by(|a, b| b.value.total_cmp(&a.value));
                if let Some(limit) = limit {
                    self.rows.truncate(limit);
                }
            }
            GroupOrder::Natural => self.rows.sort_by(|a, b| compare_keys(&a.keys, &b.keys)),
        }
    }
}

fn compare_keys(a: &[CellValue], b: &[CellValue]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.natural_cmp(y))
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Group `table` by `group_columns` and aggregate each group with `op`.
///
/// Groups with a null key are dropped. An empty table gives an empty aggregate.
pub fn compute_aggregate<S: AsRef<str>>(
    table: &Table,
    group_columns: &[S],
    op: &AggregateOp,
    order: GroupOrder,
) -> Result<AggregateTable> {
    if group_columns.is_empty() {
        return Err(DashboardError::Configuration(
            "aggregation requires at least one group column".to_string(),
        ));
    }
    for column in group_columns {
        table.require_column(column.as_ref())?;
    }

    let (value_expr, value_column) = match op {
        AggregateOp::Count => (len(), "Count".to_string()),
        AggregateOp::Sum(column) => {
            table.require_numeric(column)?;
            (col(column).cast(DataType::Float64).sum(), column.clone())
        }
    };

    let by: Vec<Expr> = group_columns.iter().map(|c| col(c.as_ref())).collect();
    let grouped = table
        .frame()
        .clone()
        .lazy()
        .group_by_stable(by)
        .agg([value_expr.alias(VALUE_COLUMN)])
        .collect()
        .map_err(|e| DashboardError::Polars(format!("Group failed: {}", e)))?;

    let key_series = group_columns
        .iter()
        .map(|c| grouped.column(c.as_ref()))
        .collect::<PolarsResult<Vec<_>>>()?;
    let values = grouped.column(VALUE_COLUMN)?.cast(&DataType::Float64)?;
    let values = values.f64()?;

    let mut rows = Vec::with_capacity(grouped.height());
    for (i, value) in values.into_iter().enumerate() {
        let mut keys = Vec::with_capacity(key_series.len());
        for series in &key_series {
            keys.push(CellValue::from_any(&series.get(i)?));
        }
        if keys.iter().any(CellValue::is_null) {
            continue;
        }
        rows.push(AggregateRow {
            keys,
            value: value.unwrap_or(0.0),
        });
    }

    let mut aggregate = AggregateTable {
        group_columns: group_columns.iter().map(|c| c.as_ref().to_string()).collect(),
        value_column,
        rows,
    };
    aggregate.order(order);
    Ok(aggregate)
}

/// One row per flag column, valued with the number of rows where that flag is set.
pub fn flag_totals(
    table: &Table,
    label: &str,
    flag_columns: &[String],
    order: GroupOrder,
) -> Result<AggregateTable> {
    let mut rows = Vec::with_capacity(flag_columns.len());
    for column in flag_columns {
        let count = table
            .numeric_values(column)?
            .into_iter()
            .filter(|value| *value == Some(1.0))
            .count();
        rows.push(AggregateRow {
            keys: vec![CellValue::from(column.as_str())],
            value: count as f64,
        });
    }

    let mut aggregate = AggregateTable {
        group_columns: vec![label.to_string()],
        value_column: "Count".to_string(),
        rows,
    };
    aggregate.order(order);
    Ok(aggregate)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub column: String,
    pub bins: Vec<Bin>,
}

impl Histogram {
    pub fn total(&self) -> usize {
        self.bins.iter().map(|bin| bin.count).sum()
    }
}

/// Equal-width histogram of a numeric column between its observed min and max.
pub fn histogram(table: &Table, column: &str, max_bins: usize) -> Result<Histogram> {
    if max_bins == 0 {
        return Err(DashboardError::Configuration(format!(
            "histogram on '{}' needs at least one bin",
            column
        )));
    }

    let values: Vec<f64> = table
        .numeric_values(column)?
        .into_iter()
        .flatten()
        .filter(|value| value.is_finite())
        .collect();

    let mut histogram = Histogram {
        column: column.to_string(),
        bins: Vec::new(),
    };
    let (Some(min), Some(max)) = (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) else {
        return Ok(histogram);
    };

    if min == max {
        histogram.bins.push(Bin {
            start: min,
            end: max,
            count: values.len(),
        });
        return Ok(histogram);
    }

    let width = (max - min) / max_bins as f64;
    histogram.bins = (0..max_bins)
        .map(|i| Bin {
            start: min + width * i as f64,
            end: if i + 1 == max_bins {
                max
            } else {
                min + width * (i + 1) as f64
            },
            count: 0,
        })
        .collect();
    for value in values {
        let index = (((value - min) / width).floor() as usize).min(max_bins - 1);
        histogram.bins[index].count += 1;
    }
    Ok(histogram)
}
