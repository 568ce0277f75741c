//! Filter specifications
//!
//! A [`FilterSpec`] is the declarative description of the constraints a user selected in a
//! filter panel. Constraints are ANDed together; their order never changes the result set.

use crate::error::{DashboardError, Result};
use crate::table::CellValue;
use serde::{Deserialize, Serialize};

/// Inclusive numeric bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeBounds {
    pub min: f64,
    pub max: f64,
}

impl RangeBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp user bounds into the observed column range.
    ///
    /// `None` when the two ranges do not overlap: clamping would then admit values the user
    /// range excludes.
    pub fn clamp_to(&self, observed: RangeBounds) -> Option<RangeBounds> {
        if self.max < observed.min || self.min > observed.max {
            return None;
        }
        Some(RangeBounds {
            min: self.min.max(observed.min),
            max: self.max.min(observed.max),
        })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub(crate) fn validate(&self, column: &str) -> Result<()> {
        if self.min.is_nan() || self.max.is_nan() {
            return Err(DashboardError::Configuration(format!(
                "range on '{}' has a NaN bound",
                column
            )));
        }
        if self.min > self.max {
            return Err(DashboardError::Configuration(format!(
                "range on '{}' has min {} greater than max {}",
                column, self.min, self.max
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Keep rows whose value lies in `[bounds.min, bounds.max]`.
    Range { column: String, bounds: RangeBounds },
    /// Keep rows whose value is one of `allowed`. An empty set does not filter.
    Include { column: String, allowed: Vec<CellValue> },
    /// Keep rows where at least one of `columns` is truthy. An empty list does not filter.
    AnyFlag { columns: Vec<String> },
    /// Keep rows whose `column` equals 1.
    FlagSet { column: String },
}

impl Constraint {
    /// Columns this constraint reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Constraint::Range { column, .. }
            | Constraint::Include { column, .. }
            | Constraint::FlagSet { column } => vec![column.as_str()],
            Constraint::AnyFlag { columns } => columns.iter().map(String::as_str).collect(),
        }
    }

    /// Whether the constraint can exclude anything at all.
    pub fn is_restrictive(&self) -> bool {
        match self {
            Constraint::Include { allowed, .. } => !allowed.is_empty(),
            Constraint::AnyFlag { columns } => !columns.is_empty(),
            Constraint::Range { .. } | Constraint::FlagSet { .. } => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub constraints: Vec<Constraint>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(mut self, column: impl Into<String>, min: f64, max: f64) -> Self {
        self.constraints.push(Constraint::Range {
            column: column.into(),
            bounds: RangeBounds::new(min, max),
        });
        self
    }

    pub fn include<I, V>(mut self, column: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        self.constraints.push(Constraint::Include {
            column: column.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn any_flag<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints.push(Constraint::AnyFlag {
            columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn flag_set(mut self, column: impl Into<String>) -> Self {
        self.constraints.push(Constraint::FlagSet {
            column: column.into(),
        });
        self
    }

    pub fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Replace the constraint on `column` of the same shape, or append it.
    pub fn replace(&mut self, constraint: Constraint) {
        let position = self.constraints.iter().position(|existing| {
            std::mem::discriminant(existing) == std::mem::discriminant(&constraint)
                && existing.columns() == constraint.columns()
        });
        match position {
            Some(index) => self.constraints[index] = constraint,
            None => self.constraints.push(constraint),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
