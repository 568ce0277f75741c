//! First-match-wins rule ladders
//!
//! A [`RuleLadder`] is an ordered list of (condition, outcome) pairs plus a default outcome.
//! Rules are tried in order and the first condition that holds decides the outcome, so
//! overlapping conditions are resolved by priority.

use crate::error::{DashboardError, Result};
use crate::table::{CellValue, Record};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum Condition {
    LessThan { column: String, threshold: f64 },
    GreaterThan { column: String, threshold: f64 },
    /// Field equals 1. A record without the field does not have the flag set.
    FlagSet { column: String },
}

impl Condition {
    pub fn less_than(column: impl Into<String>, threshold: f64) -> Self {
        Condition::LessThan {
            column: column.into(),
            threshold,
        }
    }

    pub fn greater_than(column: impl Into<String>, threshold: f64) -> Self {
        Condition::GreaterThan {
            column: column.into(),
            threshold,
        }
    }

    pub fn flag_set(column: impl Into<String>) -> Self {
        Condition::FlagSet {
            column: column.into(),
        }
    }

    pub fn holds(&self, record: &Record) -> Result<bool> {
        match self {
            Condition::LessThan { column, threshold } => {
                Ok(numeric_field(record, column)?.map_or(false, |v| v < *threshold))
            }
            Condition::GreaterThan { column, threshold } => {
                Ok(numeric_field(record, column)?.map_or(false, |v| v > *threshold))
            }
            Condition::FlagSet { column } => {
                Ok(record.get(column).map_or(false, CellValue::is_truthy))
            }
        }
    }
}

/// Numeric value of a field; `None` for a null cell, which satisfies no comparison.
fn numeric_field(record: &Record, column: &str) -> Result<Option<f64>> {
    match record.get(column) {
        None => Err(DashboardError::Configuration(format!(
            "record has no field '{}'",
            column
        ))),
        Some(CellValue::Null) => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| {
            DashboardError::Configuration(format!(
                "field '{}' is not numeric: {:?}",
                column, value
            ))
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule<O> {
    pub condition: Condition,
    pub outcome: O,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleLadder<O> {
    rules: Vec<Rule<O>>,
    default: O,
}

impl<O> RuleLadder<O> {
    pub fn new(default: O) -> Self {
        Self {
            rules: Vec::new(),
            default,
        }
    }

    /// Append a rule with lower priority than every rule added before it.
    pub fn when(mut self, condition: Condition, outcome: O) -> Self {
        self.rules.push(Rule { condition, outcome });
        self
    }

    pub fn rules(&self) -> &[Rule<O>] {
        &self.rules
    }

    pub fn default_outcome(&self) -> &O {
        &self.default
    }

    pub fn evaluate(&self, record: &Record) -> Result<&O> {
        for rule in &self.rules {
            if rule.condition.holds(record)? {
                return Ok(&rule.outcome);
            }
        }
        Ok(&self.default)
    }
}
