//! Scalar metrics
//!
//! KPIs computed over a (filtered) table. Metrics never fail on an empty table: sums and
//! counts are zero, means have no value.

use crate::error::{DashboardError, Result};
use crate::filter::truthy;
use crate::filter_spec::RangeBounds;
use crate::table::{CellValue, Table};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "column", rename_all = "snake_case")]
pub enum MetricKind {
    Sum(String),
    Mean(String),
    /// Number of rows.
    Count,
    /// Number of distinct non-null values.
    DistinctCount(String),
    /// Number of rows whose flag column equals 1.
    FlagCount(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    pub kind: MetricKind,
}

impl MetricSpec {
    pub fn new(name: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn sum(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(name, MetricKind::Sum(column.into()))
    }

    pub fn mean(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(name, MetricKind::Mean(column.into()))
    }

    pub fn count(name: impl Into<String>) -> Self {
        Self::new(name, MetricKind::Count)
    }

    pub fn distinct_count(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(name, MetricKind::DistinctCount(column.into()))
    }

    pub fn flag_count(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(name, MetricKind::FlagCount(column.into()))
    }
}

/// A computed metric; `None` means "no value" (mean over zero rows).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub values: Vec<Metric>,
}

impl Metrics {
    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.values.iter().find(|m| m.name == name)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|m| m.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Metric> {
        self.values.iter()
    }
}

pub fn compute_metrics(table: &Table, specs: &[MetricSpec]) -> Result<Metrics> {
    let mut values = Vec::with_capacity(specs.len());
    for spec in specs {
        let value = compute_metric(table, &spec.kind)?;
        values.push(Metric {
            name: spec.name.clone(),
            value,
        });
    }
    Ok(Metrics { values })
}

fn compute_metric(table: &Table, kind: &MetricKind) -> Result<Option<f64>> {
    let value = match kind {
        MetricKind::Sum(column) => {
            table.require_numeric(column)?;
            // `Sum` over no f64 values is -0.0.
            let sum = table
                .numeric_values(column)?
                .into_iter()
                .flatten()
                .fold(0.0, |acc, value| acc + value);
            Some(sum)
        }
        MetricKind::Mean(column) => {
            table.require_numeric(column)?;
            let present: Vec<f64> = table.numeric_values(column)?.into_iter().flatten().collect();
            if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            }
        }
        MetricKind::Count => Some(table.height() as f64),
        MetricKind::DistinctCount(column) => {
            let distinct = table.require_column(column)?.drop_nulls().n_unique()?;
            Some(distinct as f64)
        }
        MetricKind::FlagCount(column) => {
            table.require_numeric(column)?;
            let count = table
                .numeric_values(column)?
                .into_iter()
                .filter(|value| *value == Some(1.0))
                .count();
            Some(count as f64)
        }
    };
    Ok(value)
}

/// New table with an extra `name` column counting, per row, the truthy `flag_columns`.
pub fn with_flag_count(table: &Table, flag_columns: &[String], name: &str) -> Result<Table> {
    for column in flag_columns {
        table.require_numeric(column)?;
    }

    let count = flag_columns
        .iter()
        .map(|column| truthy(column).cast(DataType::UInt32))
        .reduce(|acc, expr| acc + expr)
        .unwrap_or_else(|| lit(0u32));

    let frame = table
        .frame()
        .clone()
        .lazy()
        .with_columns([count.alias(name)])
        .collect()
        .map_err(|e| DashboardError::Polars(format!("Derive '{}' failed: {}", name, e)))?;

    Ok(Table::derived(frame))
}

/// Observed numeric bounds of a column, `None` when it holds no numeric value.
pub fn column_bounds(table: &Table, column: &str) -> Result<Option<RangeBounds>> {
    let bounds = table
        .numeric_values(column)?
        .into_iter()
        .flatten()
        .filter(|value| !value.is_nan())
        .fold(None, |acc: Option<RangeBounds>, value| match acc {
            None => Some(RangeBounds::new(value, value)),
            Some(b) => Some(RangeBounds::new(b.min.min(value), b.max.max(value))),
        });
    Ok(bounds)
}

/// Distinct non-null values of a column, in first-seen order or sorted naturally.
pub fn distinct_values(table: &Table, column: &str, sorted: bool) -> Result<Vec<CellValue>> {
    let unique = table.require_column(column)?.drop_nulls().unique_stable()?;
    let mut values = Vec::with_capacity(unique.len());
    for i in 0..unique.len() {
        values.push(CellValue::from_any(&unique.get(i)?));
    }
    if sorted {
        values.sort_by(|a, b| a.natural_cmp(b));
    }
    Ok(values)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MetricFormat {
    /// `$1,234`, negatives as `$-1,234`
    Currency,
    Decimal(usize),
    Integer,
}

impl MetricFormat {
    pub fn render(&self, value: Option<f64>) -> String {
        let Some(value) = value.filter(|v| v.is_finite()) else {
            return "N/A".to_string();
        };
        match self {
            MetricFormat::Currency => {
                let sign = if value.round() < 0.0 { "-" } else { "" };
                format!("${}{}", sign, group_thousands(value.abs().round() as u64))
            }
            MetricFormat::Decimal(places) => format!("{:.*}", places, value),
            MetricFormat::Integer => format!("{:.0}", value),
        }
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
